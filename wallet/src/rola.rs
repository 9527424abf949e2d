//! # ROLA: Off-Ledger Authentication
//!
//! Proves control of accounts and personas to a dApp without a transaction.
//! The dApp sends a random 32-byte challenge; each entity signs a digest of
//! that challenge bound to the dApp's definition address and origin:
//!
//! ```text
//! payload = 0x52 || challenge (32) || len(dapp_definition) as u8
//!                || dapp_definition || origin
//! signed  = BLAKE3(payload)
//! ```
//!
//! The binding stops a proof obtained by one dApp from being replayed to
//! another.
//!
//! Verifiers check the signing key against the entity's `owner_keys`
//! metadata, so the client can also build the manifest that registers the
//! entity's keys there.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::crypto::{Hash, PublicKeyHash, SignatureWithPublicKey};
use crate::error::DappRequestFailure;
use crate::gateway::{GatewayError, OwnerKeysSource};
use crate::manifest::{EntityAddress, ManifestBuilder, TransactionManifest};
use crate::profile::{ProfileSource, SignerResolver};
use crate::signing::{FactorInstance, SigningAttempt, SigningCoordinator, SigningPurpose};

/// First byte of every ROLA payload.
pub const ROLA_PAYLOAD_PREFIX: u8 = 0x52;

/// Required challenge length in bytes.
pub const CHALLENGE_LENGTH: usize = 32;

/// Errors building an owner-key registration manifest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RolaError {
    #[error("entity {0} is not in the profile")]
    UnknownEntity(EntityAddress),

    #[error("failed to read owner keys: {0}")]
    OwnerKeys(#[from] GatewayError),
}

impl From<RolaError> for DappRequestFailure {
    fn from(_: RolaError) -> Self {
        DappRequestFailure::InvalidRequest
    }
}

/// A dApp's login challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallengeRequest {
    pub challenge: [u8; CHALLENGE_LENGTH],
    pub dapp_definition_address: EntityAddress,
    pub origin: String,
}

impl AuthChallengeRequest {
    /// Parses a hex challenge as received from the dApp.
    pub fn from_hex(
        challenge_hex: &str,
        dapp_definition_address: EntityAddress,
        origin: impl Into<String>,
    ) -> Result<Self, DappRequestFailure> {
        let bytes = hex::decode(challenge_hex).map_err(|_| DappRequestFailure::InvalidRequest)?;
        let challenge: [u8; CHALLENGE_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DappRequestFailure::InvalidRequest)?;
        Ok(Self {
            challenge,
            dapp_definition_address,
            origin: origin.into(),
        })
    }

    /// The bytes whose hash gets signed.
    pub fn payload(&self) -> Result<Vec<u8>, DappRequestFailure> {
        let dapp_definition = self.dapp_definition_address.as_str().as_bytes();
        let length =
            u8::try_from(dapp_definition.len()).map_err(|_| DappRequestFailure::InvalidRequest)?;

        let mut payload =
            Vec::with_capacity(2 + CHALLENGE_LENGTH + dapp_definition.len() + self.origin.len());
        payload.push(ROLA_PAYLOAD_PREFIX);
        payload.extend_from_slice(&self.challenge);
        payload.push(length);
        payload.extend_from_slice(dapp_definition);
        payload.extend_from_slice(self.origin.as_bytes());
        Ok(payload)
    }

    pub fn payload_hash(&self) -> Result<Hash, DappRequestFailure> {
        Ok(Hash::of(&self.payload()?))
    }
}

/// Manifest registering an entity's keys as owner keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthKeyManifest {
    pub manifest: TransactionManifest,
    /// Hashes the manifest adds. Empty means nothing changes on ledger.
    pub additions: Vec<PublicKeyHash>,
}

impl AuthKeyManifest {
    pub fn is_noop(&self) -> bool {
        self.additions.is_empty()
    }
}

pub struct RolaClient {
    profile: Arc<dyn ProfileSource>,
    resolver: Arc<dyn SignerResolver>,
    owner_keys: Arc<dyn OwnerKeysSource>,
    coordinator: Arc<SigningCoordinator>,
}

impl RolaClient {
    pub fn new(
        profile: Arc<dyn ProfileSource>,
        resolver: Arc<dyn SignerResolver>,
        owner_keys: Arc<dyn OwnerKeysSource>,
        coordinator: Arc<SigningCoordinator>,
    ) -> Self {
        Self {
            profile,
            resolver,
            owner_keys,
            coordinator,
        }
    }

    /// Signs `request` once per entity under a fresh attempt. The first
    /// failing signer fails the whole batch.
    pub async fn sign_auth_challenge(
        &self,
        request: &AuthChallengeRequest,
        entities: &[EntityAddress],
    ) -> Result<BTreeMap<EntityAddress, SignatureWithPublicKey>, DappRequestFailure> {
        self.sign_auth_challenge_with(request, entities, &SigningAttempt::new())
            .await
    }

    /// Like [`sign_auth_challenge`](Self::sign_auth_challenge), under a
    /// caller-held attempt. Every entity gets an entry, including entities
    /// that share a key.
    pub async fn sign_auth_challenge_with(
        &self,
        request: &AuthChallengeRequest,
        entities: &[EntityAddress],
        attempt: &SigningAttempt,
    ) -> Result<BTreeMap<EntityAddress, SignatureWithPublicKey>, DappRequestFailure> {
        if entities.is_empty() {
            return Err(DappRequestFailure::InvalidRequest);
        }
        let hash = request.payload_hash()?;

        let network_id = self.profile.current_network_id();
        let signers = self
            .resolver
            .signers_for_addresses(network_id, entities)
            .await;
        if let Some(missing) = entities
            .iter()
            .find(|entity| !signers.iter().any(|s| &s.address == *entity))
        {
            return Err(DappRequestFailure::FailedToSignAuthChallenge(format!(
                "no signer for {missing}"
            )));
        }

        info!(
            entities = entities.len(),
            dapp = %request.dapp_definition_address,
            origin = %request.origin,
            "signing auth challenge"
        );
        let signatures = self
            .coordinator
            .sign(&signers, hash.as_bytes(), SigningPurpose::AuthChallenge, attempt)
            .await
            .map_err(DappRequestFailure::from_auth_signing)?;

        Ok(signatures
            .into_iter()
            .map(|entry| (entry.address, entry.signature))
            .collect())
    }

    /// Builds the manifest that adds the entity's transaction-signing key
    /// and `auth_signing` to its owner keys, keeping the existing ones.
    ///
    /// Only missing keys are added, so once the result has been executed,
    /// calling this again yields no additions.
    pub async fn create_auth_key_manifest(
        &self,
        entity: &EntityAddress,
        auth_signing: &FactorInstance,
    ) -> Result<AuthKeyManifest, RolaError> {
        let profile_entity = self
            .profile
            .accounts_on_current_network()
            .into_iter()
            .chain(self.profile.personas_on_current_network())
            .find(|candidate| &candidate.address == entity)
            .ok_or_else(|| RolaError::UnknownEntity(entity.clone()))?;

        let mut owner_keys = self.owner_keys.owner_key_hashes(entity).await?;
        let mut additions = Vec::new();
        for hash in [
            profile_entity.transaction_signing.public_key.hash(),
            auth_signing.public_key.hash(),
        ] {
            if !owner_keys.contains(&hash) {
                owner_keys.push(hash);
                additions.push(hash);
            }
        }

        debug!(entity = %entity, additions = additions.len(), "auth key manifest built");
        let manifest = ManifestBuilder::new()
            .set_owner_keys(entity, &owner_keys)
            .build();
        Ok(AuthKeyManifest {
            manifest,
            additions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AuthChallengeRequest {
        AuthChallengeRequest {
            challenge: [0xAB; CHALLENGE_LENGTH],
            dapp_definition_address: EntityAddress::new("account_tdx_2_1dapp"),
            origin: "https://dashboard.example".into(),
        }
    }

    #[test]
    fn payload_layout() {
        let payload = request().payload().unwrap();
        let dapp = b"account_tdx_2_1dapp";

        assert_eq!(payload[0], ROLA_PAYLOAD_PREFIX);
        assert_eq!(&payload[1..33], &[0xAB; 32]);
        assert_eq!(payload[33] as usize, dapp.len());
        assert_eq!(&payload[34..34 + dapp.len()], dapp);
        assert_eq!(&payload[34 + dapp.len()..], b"https://dashboard.example");
    }

    #[test]
    fn origin_and_dapp_change_the_hash() {
        let base = request().payload_hash().unwrap();

        let mut other_origin = request();
        other_origin.origin = "https://evil.example".into();
        assert_ne!(other_origin.payload_hash().unwrap(), base);

        let mut other_dapp = request();
        other_dapp.dapp_definition_address = EntityAddress::new("account_tdx_2_1other");
        assert_ne!(other_dapp.payload_hash().unwrap(), base);
    }

    #[test]
    fn challenge_must_be_32_bytes() {
        let dapp = EntityAddress::new("account_tdx_2_1dapp");
        assert!(AuthChallengeRequest::from_hex(&"ab".repeat(32), dapp.clone(), "o").is_ok());
        assert_eq!(
            AuthChallengeRequest::from_hex(&"ab".repeat(31), dapp.clone(), "o"),
            Err(DappRequestFailure::InvalidRequest)
        );
        assert_eq!(
            AuthChallengeRequest::from_hex("zz", dapp, "o"),
            Err(DappRequestFailure::InvalidRequest)
        );
    }

    #[test]
    fn oversized_dapp_address_is_invalid() {
        let mut request = request();
        request.dapp_definition_address = EntityAddress::new("a".repeat(256));
        assert_eq!(request.payload(), Err(DappRequestFailure::InvalidRequest));
    }
}
