//! Static address analysis of a manifest.
//!
//! Answers two questions without executing anything: which accounts does
//! this manifest touch, and which of those must sign it. Both answers
//! preserve first-seen order and contain no duplicates.
//!
//! Raw (unparsed) manifests yield empty lists. Callers convert first.

use std::collections::HashSet;

use super::types::{EntityAddress, EntityKind, Instruction, TransactionManifest};

/// Which instructions count when collecting addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFilter {
    /// Every address-bearing instruction.
    All,
    /// Only instructions that need the target's owner signature.
    RequiresAuth,
}

/// Accounts targeted by any address-bearing instruction.
pub fn involved_addresses(manifest: &TransactionManifest) -> Vec<EntityAddress> {
    collect_addresses(manifest, EntityKind::Account, AddressFilter::All)
}

/// Accounts whose owner must sign the manifest.
pub fn addresses_requiring_auth(manifest: &TransactionManifest) -> Vec<EntityAddress> {
    collect_addresses(manifest, EntityKind::Account, AddressFilter::RequiresAuth)
}

/// Personas whose owner must sign the manifest (metadata updates on an
/// identity, proofs created from one).
pub fn identities_requiring_auth(manifest: &TransactionManifest) -> Vec<EntityAddress> {
    collect_addresses(manifest, EntityKind::Identity, AddressFilter::RequiresAuth)
}

/// Distinct addresses of `kind` targeted by instructions passing `filter`,
/// in manifest order.
pub fn collect_addresses(
    manifest: &TransactionManifest,
    kind: EntityKind,
    filter: AddressFilter,
) -> Vec<EntityAddress> {
    let Some(instructions) = manifest.parsed_instructions() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    instructions
        .iter()
        .filter(|instruction| passes(instruction, filter))
        .filter_map(Instruction::target_address)
        .filter(|address| address.kind() == kind)
        .filter(|address| seen.insert((*address).clone()))
        .cloned()
        .collect()
}

fn passes(instruction: &Instruction, filter: AddressFilter) -> bool {
    match filter {
        AddressFilter::All => true,
        AddressFilter::RequiresAuth => instruction.requires_auth(),
    }
}
