//! Signer handles: who signs, and with which key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::PublicKey;
use crate::manifest::EntityAddress;

/// Where a private key lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FactorSourceKind {
    /// A key held by this device's keystore.
    Device,
    /// A key behind an external hardware wallet.
    Hardware,
}

/// Opaque identifier of a factor source (a device mnemonic, a specific
/// hardware wallet).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactorSourceId(String);

impl FactorSourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactorSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One derived key of a factor source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactorInstance {
    pub factor_source_id: FactorSourceId,
    pub kind: FactorSourceKind,
    pub public_key: PublicKey,
    /// Derivation path, e.g. `m/44H/1022H/2H/525H/1460H/0H`.
    pub derivation_path: String,
}

/// What a signature is for. Hardware wallets render these differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningPurpose {
    SignTransaction,
    AuthChallenge,
}

/// A profile entity (account or persona) that has to sign, with its keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerHandle {
    pub address: EntityAddress,
    pub transaction_signing: FactorInstance,
    /// Dedicated ROLA key, once one has been created for the entity.
    pub auth_signing: Option<FactorInstance>,
}

impl SignerHandle {
    pub fn new(address: EntityAddress, transaction_signing: FactorInstance) -> Self {
        Self {
            address,
            transaction_signing,
            auth_signing: None,
        }
    }

    pub fn with_auth_signing(mut self, instance: FactorInstance) -> Self {
        self.auth_signing = Some(instance);
        self
    }

    /// The key to sign with for `purpose`. Auth challenges prefer the
    /// dedicated auth-signing key when the entity has one.
    pub fn instance_for(&self, purpose: SigningPurpose) -> &FactorInstance {
        match (purpose, &self.auth_signing) {
            (SigningPurpose::AuthChallenge, Some(auth)) => auth,
            _ => &self.transaction_signing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn instance(seed: u8) -> FactorInstance {
        FactorInstance {
            factor_source_id: FactorSourceId::new("device"),
            kind: FactorSourceKind::Device,
            public_key: Keypair::from_seed(&[seed; 32]).public_key(),
            derivation_path: format!("m/44H/1022H/2H/525H/1460H/{seed}H"),
        }
    }

    #[test]
    fn auth_challenges_prefer_auth_signing_key() {
        let handle = SignerHandle::new(EntityAddress::new("account_tdx_2_1a"), instance(1));
        assert_eq!(handle.instance_for(SigningPurpose::AuthChallenge), &instance(1));

        let handle = handle.with_auth_signing(instance(2));
        assert_eq!(handle.instance_for(SigningPurpose::AuthChallenge), &instance(2));
        assert_eq!(handle.instance_for(SigningPurpose::SignTransaction), &instance(1));
    }
}
