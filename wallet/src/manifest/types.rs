//! Core type definitions for transaction manifests.
//!
//! A manifest is the program a transaction runs: an ordered list of
//! instructions plus any binary blobs they reference. The pipeline never
//! executes one; it only reads the address-bearing instructions and, once,
//! prepends a `lock_fee` call.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::FEE_DECIMALS;
use crate::crypto::{Hash, PublicKeyHash};

/// Method that locks the network fee on an account.
pub const LOCK_FEE_METHOD: &str = "lock_fee";

/// Account methods whose call is gated by the account's owner role.
/// Everything else on an account (deposits, for one) is public.
pub const METHODS_REQUIRING_AUTH: &[&str] = &[
    "lock_fee",
    "lock_contingent_fee",
    "withdraw",
    "withdraw_non_fungibles",
    "lock_fee_and_withdraw",
    "lock_fee_and_withdraw_non_fungibles",
    "create_proof",
    "create_proof_of_amount",
    "create_proof_of_non_fungibles",
    "create_proof_by_amount",
    "create_proof_by_ids",
];

/// Metadata key holding an entity's owner public key hashes.
pub const OWNER_KEYS_METADATA_KEY: &str = "owner_keys";

/// Errors raised while manipulating or encoding a manifest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// The instructions are still raw text; convert them to parsed form first.
    #[error("manifest instructions are not in parsed form")]
    NotParsed,

    #[error("manifest encoding failed: {0}")]
    Encoding(String),
}

// ---------------------------------------------------------------------------
// EntityAddress
// ---------------------------------------------------------------------------

/// The kind of on-ledger entity an address points at, read off its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    /// A persona.
    Identity,
    Component,
    Resource,
    Package,
    Other,
}

/// A bech32-style entity address, e.g. `account_tdx_2_1c8...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityAddress(String);

impl EntityAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> EntityKind {
        let prefix = self.0.split('_').next().unwrap_or_default();
        match prefix {
            "account" => EntityKind::Account,
            "identity" => EntityKind::Identity,
            "component" => EntityKind::Component,
            "resource" => EntityKind::Resource,
            "package" => EntityKind::Package,
            _ => EntityKind::Other,
        }
    }

    pub fn is_account(&self) -> bool {
        self.kind() == EntityKind::Account
    }

    pub fn is_identity(&self) -> bool {
        self.kind() == EntityKind::Identity
    }
}

impl fmt::Display for EntityAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A fee-currency amount in the smallest indivisible unit (10^-18).
///
/// Serialized as a decimal string because TOML and JSON consumers can't be
/// trusted with 128-bit integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_units(units: u128) -> Self {
        Self(units)
    }

    /// `whole` tokens, i.e. `whole * 10^18` units. Saturates on overflow.
    pub const fn from_whole(whole: u128) -> Self {
        Self(whole.saturating_mul(10u128.pow(FEE_DECIMALS)))
    }

    pub fn units(&self) -> u128 {
        self.0
    }

    /// Human-readable form with all decimals, e.g. `"25.000000000000000000"`.
    pub fn display_decimal(&self) -> String {
        let divisor = 10u128.pow(FEE_DECIMALS);
        format!(
            "{}.{:0>width$}",
            self.0 / divisor,
            self.0 % divisor,
            width = FEE_DECIMALS as usize
        )
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.0.to_string()
    }
}

impl TryFrom<String> for Amount {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse::<u128>().map(Amount)
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// An argument value inside an instruction. Only the shapes this crate
/// produces or inspects are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    String(String),
    Decimal(Amount),
    Address(EntityAddress),
    Bucket(String),
    Proof(String),
    Blob(Hash),
    Bytes(Vec<u8>),
    PublicKeyHash(PublicKeyHash),
    Array(Vec<ManifestValue>),
}

/// A single manifest instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    CallMethod {
        address: EntityAddress,
        method_name: String,
        args: Vec<ManifestValue>,
    },
    SetMetadata {
        entity_address: EntityAddress,
        key: String,
        value: ManifestValue,
    },
    SetMethodAccessRule {
        entity_address: EntityAddress,
        method_key: String,
        rule: String,
    },
    SetComponentRoyaltyConfig {
        component_address: EntityAddress,
        config: Vec<(String, Amount)>,
    },
    ClaimComponentRoyalty {
        component_address: EntityAddress,
    },
    /// Anything that doesn't target an entity by address (worktop moves,
    /// bucket/proof juggling, package publishing, ...).
    Other {
        name: String,
        args: Vec<ManifestValue>,
    },
}

impl Instruction {
    /// The entity this instruction targets, if it is one of the
    /// address-bearing kinds.
    pub fn target_address(&self) -> Option<&EntityAddress> {
        match self {
            Self::CallMethod { address, .. } => Some(address),
            Self::SetMetadata { entity_address, .. }
            | Self::SetMethodAccessRule { entity_address, .. } => Some(entity_address),
            Self::SetComponentRoyaltyConfig {
                component_address, ..
            }
            | Self::ClaimComponentRoyalty { component_address } => Some(component_address),
            Self::Other { .. } => None,
        }
    }

    /// Whether touching the target requires the owner's signature.
    ///
    /// Method calls only do for the methods in [`METHODS_REQUIRING_AUTH`];
    /// metadata, access-rule and royalty changes are always owner-gated.
    pub fn requires_auth(&self) -> bool {
        match self {
            Self::CallMethod { method_name, .. } => {
                METHODS_REQUIRING_AUTH.contains(&method_name.as_str())
            }
            Self::Other { .. } => false,
            _ => true,
        }
    }
}

/// The instruction list of a manifest, either parsed or still raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestInstructions {
    Parsed(Vec<Instruction>),
    Raw(String),
}

// ---------------------------------------------------------------------------
// TransactionManifest
// ---------------------------------------------------------------------------

/// An immutable transaction manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionManifest {
    instructions: ManifestInstructions,
    blobs: Vec<Bytes>,
}

impl TransactionManifest {
    pub fn new(instructions: Vec<Instruction>, blobs: Vec<Bytes>) -> Self {
        Self {
            instructions: ManifestInstructions::Parsed(instructions),
            blobs,
        }
    }

    /// A manifest whose instructions have not been parsed yet.
    pub fn raw(text: impl Into<String>, blobs: Vec<Bytes>) -> Self {
        Self {
            instructions: ManifestInstructions::Raw(text.into()),
            blobs,
        }
    }

    pub fn instructions(&self) -> &ManifestInstructions {
        &self.instructions
    }

    /// The parsed instructions, or `None` for raw manifests.
    pub fn parsed_instructions(&self) -> Option<&[Instruction]> {
        match &self.instructions {
            ManifestInstructions::Parsed(list) => Some(list),
            ManifestInstructions::Raw(_) => None,
        }
    }

    pub fn blobs(&self) -> &[Bytes] {
        &self.blobs
    }

    /// Returns a copy with `instruction` placed first.
    pub fn with_prepended(&self, instruction: Instruction) -> Result<Self, ManifestError> {
        let existing = self.parsed_instructions().ok_or(ManifestError::NotParsed)?;
        let mut instructions = Vec::with_capacity(existing.len() + 1);
        instructions.push(instruction);
        instructions.extend_from_slice(existing);
        Ok(Self::new(instructions, self.blobs.clone()))
    }

    /// Returns a copy that starts by locking `fee` on `fee_payer`.
    pub fn with_lock_fee(
        &self,
        fee_payer: &EntityAddress,
        fee: Amount,
    ) -> Result<Self, ManifestError> {
        self.with_prepended(Instruction::CallMethod {
            address: fee_payer.clone(),
            method_name: LOCK_FEE_METHOD.to_string(),
            args: vec![ManifestValue::Decimal(fee)],
        })
    }

    /// Canonical binary encoding, used when compiling an intent.
    pub fn encode(&self) -> Result<Vec<u8>, ManifestError> {
        if self.parsed_instructions().is_none() {
            return Err(ManifestError::NotParsed);
        }
        bincode::serialize(self).map_err(|e| ManifestError::Encoding(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
