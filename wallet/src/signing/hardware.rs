//! # Hardware Wallet Link
//!
//! A hardware wallet is reached through whatever companion transport the
//! host provides. We only see a request/response exchange: the coordinator
//! pushes a [`HardwareEnvelope`] into an `mpsc` queue and awaits the
//! `oneshot` reply it carries. The host's transport task owns the receiving
//! end, forwards [`HardwareRequest`] (JSON) to the device, and answers.
//!
//! ```text
//! coordinator --HardwareEnvelope--> mpsc --> host transport --> device
//!      ^                                          |
//!      +------------- oneshot HardwareResponse ---+
//! ```
//!
//! Every request carries a fresh interaction id; a response echoing a
//! different id is rejected.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use super::state::SigningFailure;
use super::types::{FactorInstance, FactorSourceId, SigningPurpose};
use crate::crypto::{PublicKey, Signature, SignatureWithPublicKey};

/// Error codes a hardware wallet can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerErrorCode {
    Generic,
    BlindSigningNotEnabledButRequired,
    UserRejectedSigningOfTransaction,
}

/// A key the device is asked to sign with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareKey {
    /// Hex-encoded public key.
    pub public_key: String,
    pub derivation_path: String,
}

impl From<&FactorInstance> for HardwareKey {
    fn from(instance: &FactorInstance) -> Self {
        Self {
            public_key: instance.public_key.to_hex(),
            derivation_path: instance.derivation_path.clone(),
        }
    }
}

/// Request sent to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "discriminator", rename_all = "camelCase")]
pub enum HardwareRequest {
    #[serde(rename_all = "camelCase")]
    SignTransaction {
        interaction_id: Uuid,
        factor_source_id: FactorSourceId,
        keys: Vec<HardwareKey>,
        /// Hex of the intent hash to sign.
        message_hex: String,
    },
    #[serde(rename_all = "camelCase")]
    SignChallenge {
        interaction_id: Uuid,
        factor_source_id: FactorSourceId,
        keys: Vec<HardwareKey>,
        /// Hex of the ROLA payload hash to sign.
        message_hex: String,
    },
}

impl HardwareRequest {
    pub fn new(
        purpose: SigningPurpose,
        factor_source_id: FactorSourceId,
        instances: &[FactorInstance],
        message: &[u8],
    ) -> Self {
        let interaction_id = Uuid::new_v4();
        let keys = instances.iter().map(HardwareKey::from).collect();
        let message_hex = hex::encode(message);
        match purpose {
            SigningPurpose::SignTransaction => Self::SignTransaction {
                interaction_id,
                factor_source_id,
                keys,
                message_hex,
            },
            SigningPurpose::AuthChallenge => Self::SignChallenge {
                interaction_id,
                factor_source_id,
                keys,
                message_hex,
            },
        }
    }

    pub fn interaction_id(&self) -> Uuid {
        match self {
            Self::SignTransaction { interaction_id, .. }
            | Self::SignChallenge { interaction_id, .. } => *interaction_id,
        }
    }

    pub fn keys(&self) -> &[HardwareKey] {
        match self {
            Self::SignTransaction { keys, .. } | Self::SignChallenge { keys, .. } => keys,
        }
    }

    /// JSON as carried by the companion transport.
    pub fn to_json(&self) -> Result<String, SigningFailure> {
        serde_json::to_string(self).map_err(|e| SigningFailure::DeviceCommunication(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SigningFailure> {
        serde_json::from_str(json).map_err(|e| SigningFailure::DeviceCommunication(e.to_string()))
    }

    /// The bytes to sign.
    pub fn message(&self) -> Result<Vec<u8>, hex::FromHexError> {
        match self {
            Self::SignTransaction { message_hex, .. } | Self::SignChallenge { message_hex, .. } => {
                hex::decode(message_hex)
            }
        }
    }
}

/// One signature returned by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSignature {
    pub public_key: String,
    pub derivation_path: String,
    pub signature: String,
}

/// Response from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "discriminator", rename_all = "camelCase")]
pub enum HardwareResponse {
    #[serde(rename_all = "camelCase")]
    Signatures {
        interaction_id: Uuid,
        signatures: Vec<HardwareSignature>,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        interaction_id: Uuid,
        code: LedgerErrorCode,
        message: Option<String>,
    },
}

impl HardwareResponse {
    pub fn to_json(&self) -> Result<String, SigningFailure> {
        serde_json::to_string(self).map_err(|e| SigningFailure::DeviceCommunication(e.to_string()))
    }

    /// Parses a device answer. Malformed JSON is an invalid response.
    pub fn from_json(json: &str) -> Result<Self, SigningFailure> {
        serde_json::from_str(json).map_err(|e| SigningFailure::InvalidResponse(e.to_string()))
    }
}

/// A request in flight, with the channel to answer it on.
#[derive(Debug)]
pub struct HardwareEnvelope {
    pub request: HardwareRequest,
    pub reply: oneshot::Sender<HardwareResponse>,
}

/// Sending half of the hardware request queue.
#[derive(Debug, Clone)]
pub struct HardwareLink {
    sender: mpsc::Sender<HardwareEnvelope>,
}

impl HardwareLink {
    /// Creates a link and the receiver the host transport drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<HardwareEnvelope>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Sends `request` and waits for the device, for at most `timeout`.
    /// Returns early with [`SigningFailure::Cancelled`] when `cancel` flips
    /// to `true`. Dropping the pending future drops the reply channel, which
    /// the host transport observes as an abandoned interaction.
    pub async fn exchange(
        &self,
        request: HardwareRequest,
        timeout: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<HardwareResponse, SigningFailure> {
        let interaction_id = request.interaction_id();
        let (reply, response) = oneshot::channel();

        let round_trip = async {
            self.sender
                .send(HardwareEnvelope { request, reply })
                .await
                .map_err(|_| SigningFailure::DeviceCommunication("hardware link closed".into()))?;
            response.await.map_err(|_| {
                SigningFailure::DeviceCommunication("hardware transport dropped the request".into())
            })
        };

        debug!(%interaction_id, "hardware request sent");
        tokio::select! {
            biased;
            _ = cancelled(cancel) => {
                warn!(%interaction_id, "hardware request cancelled");
                Err(SigningFailure::Cancelled)
            }
            result = tokio::time::timeout(timeout, round_trip) => match result {
                Ok(answer) => answer,
                Err(_) => {
                    warn!(%interaction_id, timeout_secs = timeout.as_secs(), "hardware request timed out");
                    Err(SigningFailure::Timeout)
                }
            },
        }
    }
}

/// Resolves once `cancel` reads `true`. Never resolves if the sender is gone.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Checks a device response against what was asked: same interaction, one
/// valid signature per requested key, nothing extra. Signatures come back in
/// the order of `requested`.
pub fn verify_response(
    interaction_id: Uuid,
    requested: &[FactorInstance],
    message: &[u8],
    response: HardwareResponse,
) -> Result<Vec<SignatureWithPublicKey>, SigningFailure> {
    let signatures = match response {
        HardwareResponse::Failure {
            interaction_id: id,
            code,
            ..
        } if id == interaction_id => return Err(SigningFailure::Hardware(code)),
        HardwareResponse::Signatures {
            interaction_id: id,
            signatures,
        } if id == interaction_id => signatures,
        _ => {
            return Err(SigningFailure::InvalidResponse(
                "interaction id mismatch".into(),
            ))
        }
    };

    if signatures.len() != requested.len() {
        return Err(SigningFailure::InvalidResponse(format!(
            "expected {} signatures, got {}",
            requested.len(),
            signatures.len()
        )));
    }

    let mut parsed = Vec::with_capacity(signatures.len());
    let mut seen = HashSet::new();
    for entry in &signatures {
        let public_key = PublicKey::from_hex(&entry.public_key)
            .map_err(|e| SigningFailure::InvalidResponse(e.to_string()))?;
        let signature = Signature::from_hex(&entry.signature)
            .map_err(|e| SigningFailure::InvalidResponse(e.to_string()))?;
        if !seen.insert(public_key) {
            return Err(SigningFailure::InvalidResponse(format!(
                "duplicate signature for {public_key}"
            )));
        }
        parsed.push(SignatureWithPublicKey {
            public_key,
            signature,
        });
    }

    requested
        .iter()
        .map(|instance| {
            let found = parsed
                .iter()
                .find(|s| s.public_key == instance.public_key)
                .ok_or_else(|| {
                    SigningFailure::InvalidResponse(format!(
                        "missing signature for {}",
                        instance.public_key
                    ))
                })?;
            if !found.verify(message) {
                return Err(SigningFailure::InvalidResponse(format!(
                    "signature for {} does not verify",
                    instance.public_key
                )));
            }
            Ok(found.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::signing::FactorSourceKind;

    fn hardware_instance(keypair: &Keypair) -> FactorInstance {
        FactorInstance {
            factor_source_id: FactorSourceId::new("ledger-1"),
            kind: FactorSourceKind::Hardware,
            public_key: keypair.public_key(),
            derivation_path: "m/44H/1022H/2H/525H/1460H/0H".into(),
        }
    }

    fn signed_by(keypair: &Keypair, message: &[u8]) -> HardwareSignature {
        HardwareSignature {
            public_key: keypair.public_key().to_hex(),
            derivation_path: "m/44H/1022H/2H/525H/1460H/0H".into(),
            signature: keypair.sign(message).to_hex(),
        }
    }

    #[test]
    fn request_json_uses_discriminator() {
        let keypair = Keypair::from_seed(&[1u8; 32]);
        let request = HardwareRequest::new(
            SigningPurpose::SignTransaction,
            FactorSourceId::new("ledger-1"),
            &[hardware_instance(&keypair)],
            b"hash",
        );
        let encoded = request.to_json().unwrap();
        let json: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(json["discriminator"], "signTransaction");
        assert_eq!(json["messageHex"], hex::encode(b"hash"));
        assert_eq!(json["keys"][0]["publicKey"], keypair.public_key().to_hex());

        assert_eq!(HardwareRequest::from_json(&encoded).unwrap(), request);
    }

    #[test]
    fn response_json_from_device() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"discriminator":"failure","interactionId":"{id}","code":"userRejectedSigningOfTransaction","message":null}}"#
        );
        assert_eq!(
            HardwareResponse::from_json(&json).unwrap(),
            HardwareResponse::Failure {
                interaction_id: id,
                code: LedgerErrorCode::UserRejectedSigningOfTransaction,
                message: None,
            }
        );
        assert!(matches!(
            HardwareResponse::from_json("{\"discriminator\":\"signatures\"}"),
            Err(SigningFailure::InvalidResponse(_))
        ));
    }

    #[test]
    fn valid_response_is_accepted() {
        let keypair = Keypair::from_seed(&[2u8; 32]);
        let id = Uuid::new_v4();
        let response = HardwareResponse::Signatures {
            interaction_id: id,
            signatures: vec![signed_by(&keypair, b"msg")],
        };
        let signatures =
            verify_response(id, &[hardware_instance(&keypair)], b"msg", response).unwrap();
        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[0].public_key, keypair.public_key());
    }

    #[test]
    fn device_failure_carries_code() {
        let keypair = Keypair::from_seed(&[2u8; 32]);
        let id = Uuid::new_v4();
        let response = HardwareResponse::Failure {
            interaction_id: id,
            code: LedgerErrorCode::BlindSigningNotEnabledButRequired,
            message: None,
        };
        assert_eq!(
            verify_response(id, &[hardware_instance(&keypair)], b"msg", response),
            Err(SigningFailure::Hardware(
                LedgerErrorCode::BlindSigningNotEnabledButRequired
            ))
        );
    }

    #[test]
    fn wrong_interaction_or_signature_is_invalid() {
        let keypair = Keypair::from_seed(&[2u8; 32]);
        let other = Keypair::from_seed(&[3u8; 32]);
        let requested = [hardware_instance(&keypair)];
        let id = Uuid::new_v4();

        let stale = HardwareResponse::Signatures {
            interaction_id: Uuid::new_v4(),
            signatures: vec![signed_by(&keypair, b"msg")],
        };
        assert!(matches!(
            verify_response(id, &requested, b"msg", stale),
            Err(SigningFailure::InvalidResponse(_))
        ));

        let wrong_message = HardwareResponse::Signatures {
            interaction_id: id,
            signatures: vec![signed_by(&keypair, b"not the message")],
        };
        assert!(matches!(
            verify_response(id, &requested, b"msg", wrong_message),
            Err(SigningFailure::InvalidResponse(_))
        ));

        let wrong_key = HardwareResponse::Signatures {
            interaction_id: id,
            signatures: vec![signed_by(&other, b"msg")],
        };
        assert!(matches!(
            verify_response(id, &requested, b"msg", wrong_key),
            Err(SigningFailure::InvalidResponse(_))
        ));

        let too_many = HardwareResponse::Signatures {
            interaction_id: id,
            signatures: vec![signed_by(&keypair, b"msg"), signed_by(&keypair, b"msg")],
        };
        assert!(matches!(
            verify_response(id, &requested, b"msg", too_many),
            Err(SigningFailure::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn exchange_round_trip() {
        let (link, mut device) = HardwareLink::channel(1);
        let keypair = Keypair::from_seed(&[6u8; 32]);
        let instance = hardware_instance(&keypair);
        let signer = keypair.clone();

        tokio::spawn(async move {
            while let Some(envelope) = device.recv().await {
                let message = envelope.request.message().unwrap();
                let _ = envelope.reply.send(HardwareResponse::Signatures {
                    interaction_id: envelope.request.interaction_id(),
                    signatures: vec![signed_by(&signer, &message)],
                });
            }
        });

        let request = HardwareRequest::new(
            SigningPurpose::AuthChallenge,
            FactorSourceId::new("ledger-1"),
            &[instance.clone()],
            b"challenge",
        );
        let id = request.interaction_id();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let response = link
            .exchange(request, Duration::from_secs(5), &mut cancel_rx)
            .await
            .unwrap();
        assert!(verify_response(id, &[instance], b"challenge", response).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_device_times_out() {
        let (link, _device) = HardwareLink::channel(1);
        let keypair = Keypair::generate();
        let request = HardwareRequest::new(
            SigningPurpose::SignTransaction,
            FactorSourceId::new("ledger-1"),
            &[hardware_instance(&keypair)],
            b"hash",
        );
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let result = link
            .exchange(request, Duration::from_secs(30), &mut cancel_rx)
            .await;
        assert_eq!(result, Err(SigningFailure::Timeout));
    }

    #[tokio::test]
    async fn cancel_aborts_in_flight_request() {
        let (link, _device) = HardwareLink::channel(1);
        let keypair = Keypair::generate();
        let request = HardwareRequest::new(
            SigningPurpose::SignTransaction,
            FactorSourceId::new("ledger-1"),
            &[hardware_instance(&keypair)],
            b"hash",
        );
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = cancel_tx.send(true);
        });
        let result = link
            .exchange(request, Duration::from_secs(60), &mut cancel_rx)
            .await;
        assert_eq!(result, Err(SigningFailure::Cancelled));
    }

    #[tokio::test]
    async fn closed_link_is_a_communication_failure() {
        let (link, device) = HardwareLink::channel(1);
        drop(device);
        let request = HardwareRequest::new(
            SigningPurpose::SignTransaction,
            FactorSourceId::new("ledger-1"),
            &[hardware_instance(&Keypair::generate())],
            b"hash",
        );
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let result = link
            .exchange(request, Duration::from_secs(1), &mut cancel_rx)
            .await;
        assert!(matches!(result, Err(SigningFailure::DeviceCommunication(_))));
    }
}
