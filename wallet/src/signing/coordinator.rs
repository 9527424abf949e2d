//! # Signing Coordinator
//!
//! Collects one signature per required signer, from whichever factor
//! sources hold their keys.
//!
//! ## Flow
//!
//! 1. De-duplicate the signers by address.
//! 2. Sign each distinct key once. Addresses sharing a key all receive that
//!    one signature.
//! 3. Group the keys by factor source, in first-seen order. A hardware
//!    wallet signs for all of its keys in a single request.
//! 4. For each group: publish `Pending`, sign, publish `Success` or
//!    `Failure`.
//! 5. Stop at the first failure. A partial signature set is never returned.
//!
//! The coordinator holds no per-round state. Progress and cancellation live
//! in the [`SigningAttempt`] passed to [`SigningCoordinator::sign`], so any
//! number of rounds may run on one coordinator at once.
//!
//! There is no automatic retry. The caller restarts the whole flow.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::attempt::SigningAttempt;
use super::hardware::{verify_response, HardwareLink, HardwareRequest};
use super::keystore::DeviceKeystore;
use super::state::SigningFailure;
use super::types::{FactorInstance, FactorSourceId, FactorSourceKind, SignerHandle, SigningPurpose};
use crate::config::HARDWARE_RESPONSE_TIMEOUT;
use crate::crypto::{PublicKey, SignatureWithPublicKey};
use crate::manifest::EntityAddress;

/// A signature attributed to the entity it signs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySignature {
    pub address: EntityAddress,
    pub signature: SignatureWithPublicKey,
}

/// Distinct keys sharing one factor source.
struct SignerGroup<'a> {
    factor_source_id: FactorSourceId,
    kind: FactorSourceKind,
    keys: Vec<&'a FactorInstance>,
}

/// Drives signing across device and hardware factor sources.
pub struct SigningCoordinator {
    keystore: Arc<dyn DeviceKeystore>,
    hardware: Option<HardwareLink>,
    hardware_timeout: Duration,
}

impl SigningCoordinator {
    pub fn new(keystore: Arc<dyn DeviceKeystore>) -> Self {
        Self {
            keystore,
            hardware: None,
            hardware_timeout: HARDWARE_RESPONSE_TIMEOUT,
        }
    }

    pub fn with_hardware_link(mut self, link: HardwareLink) -> Self {
        self.hardware = Some(link);
        self
    }

    pub fn with_hardware_timeout(mut self, timeout: Duration) -> Self {
        self.hardware_timeout = timeout;
        self
    }

    /// Signs `message` once for every distinct signer, publishing progress
    /// to `attempt`.
    ///
    /// Signatures come back in signer order. A cancelled attempt fails with
    /// [`SigningFailure::Cancelled`] before the next factor source is asked.
    pub async fn sign(
        &self,
        signers: &[SignerHandle],
        message: &[u8],
        purpose: SigningPurpose,
        attempt: &SigningAttempt,
    ) -> Result<Vec<EntitySignature>, SigningFailure> {
        let mut cancel = attempt.cancel_receiver();
        let progress = attempt.progress();

        let signers = dedup_signers(signers, purpose);
        let keys = distinct_keys(&signers);
        let groups = group_by_factor_source(&keys);
        info!(
            attempt = %attempt.id(),
            signers = signers.len(),
            keys = keys.len(),
            factor_sources = groups.len(),
            ?purpose,
            "signing round started"
        );

        let mut by_key: HashMap<PublicKey, SignatureWithPublicKey> = HashMap::with_capacity(keys.len());
        for group in &groups {
            progress.mark_pending(&group.factor_source_id, group.kind, purpose);

            let outcome = match attempt.ensure_active() {
                Err(cancelled) => Err(cancelled),
                Ok(()) => match group.kind {
                    FactorSourceKind::Device => self.sign_with_device(group, message),
                    FactorSourceKind::Hardware => {
                        self.sign_with_hardware(group, message, purpose, &mut cancel)
                            .await
                    }
                },
            };

            match outcome {
                Ok(signatures) => {
                    progress.mark_success(&group.factor_source_id);
                    by_key.extend(signatures.into_iter().map(|s| (s.public_key, s)));
                }
                Err(failure) => {
                    warn!(
                        attempt = %attempt.id(),
                        factor_source = %group.factor_source_id,
                        error = %failure,
                        "signing round aborted"
                    );
                    progress.mark_failure(&group.factor_source_id, failure.clone());
                    return Err(failure);
                }
            }
        }

        let collected = signers
            .iter()
            .map(|(address, instance)| {
                let signature = by_key.get(&instance.public_key).cloned().ok_or_else(|| {
                    SigningFailure::InvalidResponse(format!("no signature for {address}"))
                })?;
                Ok(EntitySignature {
                    address: (*address).clone(),
                    signature,
                })
            })
            .collect::<Result<Vec<_>, SigningFailure>>()?;

        info!(attempt = %attempt.id(), signatures = collected.len(), "signing round complete");
        Ok(collected)
    }

    fn sign_with_device(
        &self,
        group: &SignerGroup<'_>,
        message: &[u8],
    ) -> Result<Vec<SignatureWithPublicKey>, SigningFailure> {
        debug!(factor_source = %group.factor_source_id, keys = group.keys.len(), "device signing");
        group
            .keys
            .iter()
            .map(|instance| {
                let signature = self.keystore.sign(instance, message)?;
                if signature.public_key != instance.public_key || !signature.verify(message) {
                    return Err(SigningFailure::InvalidResponse(format!(
                        "keystore returned a bad signature for {}",
                        instance.public_key
                    )));
                }
                Ok(signature)
            })
            .collect()
    }

    async fn sign_with_hardware(
        &self,
        group: &SignerGroup<'_>,
        message: &[u8],
        purpose: SigningPurpose,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Vec<SignatureWithPublicKey>, SigningFailure> {
        let link = self.hardware.as_ref().ok_or_else(|| {
            SigningFailure::DeviceCommunication("no hardware wallet link configured".into())
        })?;

        let instances: Vec<FactorInstance> = group.keys.iter().map(|i| (*i).clone()).collect();
        let request =
            HardwareRequest::new(purpose, group.factor_source_id.clone(), &instances, message);
        let interaction_id = request.interaction_id();
        info!(
            factor_source = %group.factor_source_id,
            %interaction_id,
            keys = instances.len(),
            "awaiting hardware wallet"
        );

        let response = link.exchange(request, self.hardware_timeout, cancel).await?;
        verify_response(interaction_id, &instances, message, response)
    }
}

/// Drops repeated addresses, keeping the first occurrence.
fn dedup_signers(
    signers: &[SignerHandle],
    purpose: SigningPurpose,
) -> Vec<(&EntityAddress, &FactorInstance)> {
    let mut seen = HashSet::new();
    signers
        .iter()
        .filter(|signer| seen.insert(&signer.address))
        .map(|signer| (&signer.address, signer.instance_for(purpose)))
        .collect()
}

/// Each public key once, in first-seen order.
fn distinct_keys<'a>(signers: &[(&'a EntityAddress, &'a FactorInstance)]) -> Vec<&'a FactorInstance> {
    let mut seen = HashSet::new();
    signers
        .iter()
        .map(|(_, instance)| *instance)
        .filter(|instance| seen.insert(instance.public_key))
        .collect()
}

fn group_by_factor_source<'a>(keys: &[&'a FactorInstance]) -> Vec<SignerGroup<'a>> {
    let mut groups: Vec<SignerGroup<'a>> = Vec::new();
    for &instance in keys {
        match groups
            .iter_mut()
            .find(|g| g.factor_source_id == instance.factor_source_id)
        {
            Some(group) => group.keys.push(instance),
            None => groups.push(SignerGroup {
                factor_source_id: instance.factor_source_id.clone(),
                kind: instance.kind,
                keys: vec![instance],
            }),
        }
    }
    groups
}
