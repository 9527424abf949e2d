//! # Wallet Profile
//!
//! The pipeline never stores accounts itself. It asks a [`ProfileSource`]
//! which network the wallet is on and which entities it controls, and a
//! [`SignerResolver`] which keys sign for a given address.
//!
//! [`Profile`] is a plain in-memory implementation of both, used by hosts
//! that already have the profile loaded and by the test suite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::manifest::EntityAddress;
use crate::signing::{FactorInstance, SignerHandle};

/// An account or persona the wallet controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntity {
    pub address: EntityAddress,
    pub display_name: String,
    pub transaction_signing: FactorInstance,
    pub auth_signing: Option<FactorInstance>,
}

impl ProfileEntity {
    pub fn signer_handle(&self) -> SignerHandle {
        SignerHandle {
            address: self.address.clone(),
            transaction_signing: self.transaction_signing.clone(),
            auth_signing: self.auth_signing.clone(),
        }
    }
}

/// Read access to the wallet profile.
pub trait ProfileSource: Send + Sync {
    fn current_network_id(&self) -> u8;

    /// Accounts on the current network, in profile order.
    fn accounts_on_current_network(&self) -> Vec<ProfileEntity>;

    fn personas_on_current_network(&self) -> Vec<ProfileEntity>;
}

/// Maps entity addresses to signer handles.
#[async_trait]
pub trait SignerResolver: Send + Sync {
    /// Handles for the addresses the wallet controls on `network_id`, in
    /// input order. Addresses it does not control are skipped.
    async fn signers_for_addresses(
        &self,
        network_id: u8,
        addresses: &[EntityAddress],
    ) -> Vec<SignerHandle>;
}

/// In-memory profile for a single network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub network_id: u8,
    pub accounts: Vec<ProfileEntity>,
    pub personas: Vec<ProfileEntity>,
}

impl Profile {
    pub fn new(network_id: u8) -> Self {
        Self {
            network_id,
            ..Self::default()
        }
    }

    pub fn with_account(mut self, account: ProfileEntity) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn with_persona(mut self, persona: ProfileEntity) -> Self {
        self.personas.push(persona);
        self
    }

    /// Looks an address up among both accounts and personas.
    pub fn entity(&self, address: &EntityAddress) -> Option<&ProfileEntity> {
        self.accounts
            .iter()
            .chain(self.personas.iter())
            .find(|entity| &entity.address == address)
    }
}

impl ProfileSource for Profile {
    fn current_network_id(&self) -> u8 {
        self.network_id
    }

    fn accounts_on_current_network(&self) -> Vec<ProfileEntity> {
        self.accounts.clone()
    }

    fn personas_on_current_network(&self) -> Vec<ProfileEntity> {
        self.personas.clone()
    }
}

#[async_trait]
impl SignerResolver for Profile {
    async fn signers_for_addresses(
        &self,
        network_id: u8,
        addresses: &[EntityAddress],
    ) -> Vec<SignerHandle> {
        if network_id != self.network_id {
            return Vec::new();
        }
        addresses
            .iter()
            .filter_map(|address| self.entity(address))
            .map(ProfileEntity::signer_handle)
            .collect()
    }
}
