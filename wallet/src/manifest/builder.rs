//! Fluent construction of [`TransactionManifest`]s.
//!
//! The wallet only authors a handful of manifests itself (owner-key
//! registration, test fixtures, fee locking); everything else arrives from a
//! dApp already built. The builder covers exactly those shapes.

use bytes::Bytes;

use super::types::{
    Amount, EntityAddress, Instruction, ManifestValue, TransactionManifest, LOCK_FEE_METHOD,
    OWNER_KEYS_METADATA_KEY,
};
use crate::crypto::PublicKeyHash;

/// Builder for [`TransactionManifest`].
///
/// # Example
///
/// ```
/// use vela_wallet::manifest::{Amount, EntityAddress, ManifestBuilder};
///
/// let account = EntityAddress::new("account_tdx_2_1alice");
/// let resource = EntityAddress::new("resource_tdx_2_1xrd");
/// let manifest = ManifestBuilder::new()
///     .lock_fee(&account, Amount::from_whole(10))
///     .withdraw(&account, &resource, Amount::from_whole(1))
///     .deposit_batch(&EntityAddress::new("account_tdx_2_1bob"))
///     .build();
///
/// assert_eq!(manifest.parsed_instructions().unwrap().len(), 3);
/// ```
#[derive(Debug, Default, Clone)]
pub struct ManifestBuilder {
    instructions: Vec<Instruction>,
    blobs: Vec<Bytes>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an arbitrary instruction.
    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn call_method(
        self,
        address: &EntityAddress,
        method_name: &str,
        args: Vec<ManifestValue>,
    ) -> Self {
        self.instruction(Instruction::CallMethod {
            address: address.clone(),
            method_name: method_name.to_string(),
            args,
        })
    }

    pub fn lock_fee(self, account: &EntityAddress, amount: Amount) -> Self {
        self.call_method(account, LOCK_FEE_METHOD, vec![ManifestValue::Decimal(amount)])
    }

    pub fn withdraw(self, account: &EntityAddress, resource: &EntityAddress, amount: Amount) -> Self {
        self.call_method(
            account,
            "withdraw",
            vec![
                ManifestValue::Address(resource.clone()),
                ManifestValue::Decimal(amount),
            ],
        )
    }

    /// Deposits the whole worktop into `account`. Public; needs no signature.
    pub fn deposit_batch(self, account: &EntityAddress) -> Self {
        self.call_method(
            account,
            "try_deposit_batch_or_abort",
            vec![ManifestValue::Bucket("worktop".to_string())],
        )
    }

    pub fn set_metadata(self, entity: &EntityAddress, key: &str, value: ManifestValue) -> Self {
        self.instruction(Instruction::SetMetadata {
            entity_address: entity.clone(),
            key: key.to_string(),
            value,
        })
    }

    /// Overwrites the entity's `owner_keys` metadata with `hashes`.
    pub fn set_owner_keys(self, entity: &EntityAddress, hashes: &[PublicKeyHash]) -> Self {
        let value = ManifestValue::Array(
            hashes
                .iter()
                .copied()
                .map(ManifestValue::PublicKeyHash)
                .collect(),
        );
        self.set_metadata(entity, OWNER_KEYS_METADATA_KEY, value)
    }

    /// Attaches a blob referenced by one of the instructions.
    pub fn blob(mut self, blob: impl Into<Bytes>) -> Self {
        self.blobs.push(blob.into());
        self
    }

    pub fn build(self) -> TransactionManifest {
        TransactionManifest::new(self.instructions, self.blobs)
    }
}
