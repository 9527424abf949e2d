//! On-device key custody.
//!
//! Device signing is synchronous: by the time the coordinator asks, the user
//! has already authorized the transaction, so there is nothing to wait on.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::state::SigningFailure;
use super::types::FactorInstance;
use crate::crypto::{Keypair, PublicKey, SignatureWithPublicKey};

/// Signs with keys held on this device.
pub trait DeviceKeystore: Send + Sync {
    fn sign(
        &self,
        instance: &FactorInstance,
        message: &[u8],
    ) -> Result<SignatureWithPublicKey, SigningFailure>;
}

/// A keystore backed by a map of keypairs.
///
/// Can be locked, which models the user declining the device unlock prompt.
#[derive(Debug, Default)]
pub struct InMemoryKeystore {
    keys: RwLock<HashMap<PublicKey, Keypair>>,
    locked: AtomicBool,
}

impl InMemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `keypair` and returns its public key.
    pub fn insert(&self, keypair: Keypair) -> PublicKey {
        let public_key = keypair.public_key();
        self.keys.write().insert(public_key, keypair);
        public_key
    }

    pub fn contains(&self, public_key: &PublicKey) -> bool {
        self.keys.read().contains_key(public_key)
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }
}

impl DeviceKeystore for InMemoryKeystore {
    fn sign(
        &self,
        instance: &FactorInstance,
        message: &[u8],
    ) -> Result<SignatureWithPublicKey, SigningFailure> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(SigningFailure::UserRejected);
        }
        let keys = self.keys.read();
        let keypair = keys.get(&instance.public_key).ok_or_else(|| {
            SigningFailure::Keystore(format!("no key for {}", instance.derivation_path))
        })?;
        Ok(keypair.sign_with_public_key(message))
    }
}
