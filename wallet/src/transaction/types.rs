//! Value types shared by the transaction-side pipeline steps.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Hash;

/// A ledger epoch number.
pub type Epoch = u64;

/// Identifier of a notarized transaction: the BLAKE3 hash of its compiled
/// payload. Displayed as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(Hash);

impl TransactionId {
    pub fn of_payload(payload: &[u8]) -> Self {
        Self(Hash::of(payload))
    }

    pub fn from_hash(hash: Hash) -> Self {
        Self(hash)
    }

    pub fn as_hash(&self) -> &Hash {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.to_hex())
    }
}

/// Status of a submitted transaction as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// The gateway has not seen the transaction (yet).
    Unknown,
    Pending,
    CommittedSuccess,
    CommittedFailure,
    Rejected,
}

impl TransactionStatus {
    /// Whether polling can stop on this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CommittedSuccess | Self::CommittedFailure | Self::Rejected
        )
    }
}

/// Gateway answer to a submission. `duplicate` means the network had
/// already accepted an identical payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub duplicate: bool,
}
