//! # Intent Compilation & Notarization
//!
//! ```text
//! TransactionIntent  = header + manifest + message
//!   intent_hash      = BLAKE3(bincode(intent))            <- signers sign this
//! SignedIntent       = intent + signer signatures
//!   signed_hash      = BLAKE3(bincode(signed intent))     <- notary signs this
//! NotarizedTransaction = signed intent + notary signature
//!   payload          = bincode(notarized transaction)
//!   transaction id   = BLAKE3(payload)
//! ```
//!
//! Everything here is deterministic: the same inputs (including the notary
//! key, Ed25519 being deterministic) give the same payload and id.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::header::TransactionHeader;
use super::types::TransactionId;
use crate::crypto::{Hash, Keypair, Signature, SignatureWithPublicKey};
use crate::error::TransactionApprovalFailure;
use crate::manifest::TransactionManifest;
use crate::signing::SignerHandle;

/// The notary for one signing attempt and the signers it notarizes for.
///
/// The notary key is ephemeral: generated per attempt and never a signatory,
/// so its signature is always present even when no entity signs.
#[derive(Debug)]
pub struct NotaryAndSigners {
    notary: Keypair,
    signers: Vec<SignerHandle>,
}

impl NotaryAndSigners {
    /// A fresh notary for `signers`. Repeated addresses are dropped.
    pub fn new(signers: Vec<SignerHandle>) -> Self {
        Self::with_notary(Keypair::generate(), signers)
    }

    pub fn with_notary(notary: Keypair, signers: Vec<SignerHandle>) -> Self {
        let mut seen = HashSet::new();
        let signers = signers
            .into_iter()
            .filter(|signer| seen.insert(signer.address.clone()))
            .collect();
        Self { notary, signers }
    }

    pub fn notary(&self) -> &Keypair {
        &self.notary
    }

    pub fn signers(&self) -> &[SignerHandle] {
        &self.signers
    }
}

/// What the signers sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    pub header: TransactionHeader,
    pub manifest: TransactionManifest,
    pub message: Option<String>,
}

impl TransactionIntent {
    pub fn new(header: TransactionHeader, manifest: TransactionManifest, message: Option<String>) -> Self {
        Self {
            header,
            manifest,
            message,
        }
    }

    /// Canonical encoding. Raw manifests can't be compiled.
    pub fn compile(&self) -> Result<Vec<u8>, TransactionApprovalFailure> {
        if self.manifest.parsed_instructions().is_none() {
            return Err(TransactionApprovalFailure::ConvertManifest);
        }
        bincode::serialize(self).map_err(|e| {
            warn!(error = %e, "intent compilation failed");
            TransactionApprovalFailure::CompileTransactionIntent
        })
    }

    pub fn hash(&self) -> Result<Hash, TransactionApprovalFailure> {
        Ok(Hash::of(&self.compile()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedIntent {
    pub intent: TransactionIntent,
    pub intent_signatures: Vec<SignatureWithPublicKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizedTransaction {
    pub signed_intent: SignedIntent,
    pub notary_signature: Signature,
}

/// A notarized transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTransaction {
    pub payload: Vec<u8>,
    pub id: TransactionId,
    pub intent_hash: Hash,
}

impl CompiledTransaction {
    pub fn payload_hex(&self) -> String {
        hex::encode(&self.payload)
    }
}

/// Applies signer and notary signatures and compiles the result.
///
/// Every signer signature must verify against the intent hash and no key
/// may sign twice. Any failure is a [`TransactionApprovalFailure::PrepareNotarizedTransaction`].
pub fn notarize(
    intent: TransactionIntent,
    intent_signatures: Vec<SignatureWithPublicKey>,
    notary: &Keypair,
) -> Result<CompiledTransaction, TransactionApprovalFailure> {
    use TransactionApprovalFailure::PrepareNotarizedTransaction;

    if intent.header.notary_public_key != notary.public_key() {
        warn!("notary key does not match the header");
        return Err(PrepareNotarizedTransaction);
    }

    let intent_hash = intent.hash().map_err(|_| PrepareNotarizedTransaction)?;

    let mut keys = HashSet::new();
    for signature in &intent_signatures {
        if !keys.insert(signature.public_key) || !signature.verify(intent_hash.as_bytes()) {
            warn!(public_key = %signature.public_key, "rejecting intent signature");
            return Err(PrepareNotarizedTransaction);
        }
    }

    let signed_intent = SignedIntent {
        intent,
        intent_signatures,
    };
    let signed_bytes = bincode::serialize(&signed_intent).map_err(|_| PrepareNotarizedTransaction)?;
    let notary_signature = notary.sign(Hash::of(&signed_bytes).as_bytes());

    let notarized = NotarizedTransaction {
        signed_intent,
        notary_signature,
    };
    let payload = bincode::serialize(&notarized).map_err(|_| PrepareNotarizedTransaction)?;
    let id = TransactionId::of_payload(&payload);

    debug!(tx_id = %id, payload_bytes = payload.len(), "transaction notarized");
    Ok(CompiledTransaction {
        payload,
        id,
        intent_hash,
    })
}

/// Decodes a compiled payload. Used to inspect what was submitted.
pub fn decompile(payload: &[u8]) -> Result<NotarizedTransaction, TransactionApprovalFailure> {
    bincode::deserialize(payload).map_err(|_| TransactionApprovalFailure::PrepareNotarizedTransaction)
}
