//! # Observable Signing Progress
//!
//! One [`SigningState`] per factor source taking part in a signing round.
//! Each moves `Pending -> Success` or `Pending -> Failure` and never back.
//!
//! The collection lives in a `tokio::sync::watch` channel owned by one
//! signing attempt. The coordinator is the only writer and replaces the
//! vector on every transition, so a UI holding a receiver always sees a
//! consistent snapshot.

use thiserror::Error;
use tokio::sync::watch;

use super::hardware::LedgerErrorCode;
use super::types::{FactorSourceId, FactorSourceKind, SigningPurpose};

/// Why a signer failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningFailure {
    /// The user declined on this device.
    #[error("signing rejected by user")]
    UserRejected,

    /// The signing round was cancelled by the caller.
    #[error("signing cancelled")]
    Cancelled,

    /// The hardware wallet did not answer in time.
    #[error("hardware wallet did not respond in time")]
    Timeout,

    /// The channel to the hardware wallet broke.
    #[error("hardware wallet communication failed: {0}")]
    DeviceCommunication(String),

    /// The hardware wallet reported an error.
    #[error("hardware wallet error: {0:?}")]
    Hardware(LedgerErrorCode),

    /// Wrong number of signatures, unknown keys, signatures that don't verify.
    #[error("invalid signing response: {0}")]
    InvalidResponse(String),

    #[error("keystore failure: {0}")]
    Keystore(String),
}

/// Lifecycle of one signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningPhase {
    Pending,
    Success,
    Failure(SigningFailure),
}

/// Progress of one factor source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningState {
    pub factor_source_id: FactorSourceId,
    pub kind: FactorSourceKind,
    pub phase: SigningPhase,
    pub purpose: Option<SigningPurpose>,
}

impl SigningState {
    pub fn is_pending(&self) -> bool {
        self.phase == SigningPhase::Pending
    }
}

/// Writer side of the progress channel.
#[derive(Debug)]
pub struct SigningProgress {
    sender: watch::Sender<Vec<SigningState>>,
}

impl Default for SigningProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningProgress {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Vec::new());
        Self { sender }
    }

    /// A new observer. Sees the current snapshot immediately.
    pub fn subscribe(&self) -> watch::Receiver<Vec<SigningState>> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> Vec<SigningState> {
        self.sender.borrow().clone()
    }

    /// Adds (or re-arms) the entry for `factor_source_id` as pending.
    pub fn mark_pending(
        &self,
        factor_source_id: &FactorSourceId,
        kind: FactorSourceKind,
        purpose: SigningPurpose,
    ) {
        self.sender.send_modify(|states| {
            let entry = SigningState {
                factor_source_id: factor_source_id.clone(),
                kind,
                phase: SigningPhase::Pending,
                purpose: Some(purpose),
            };
            match states
                .iter_mut()
                .find(|s| &s.factor_source_id == factor_source_id)
            {
                Some(existing) => *existing = entry,
                None => states.push(entry),
            }
        });
    }

    pub fn mark_success(&self, factor_source_id: &FactorSourceId) {
        self.finish(factor_source_id, SigningPhase::Success);
    }

    pub fn mark_failure(&self, factor_source_id: &FactorSourceId, failure: SigningFailure) {
        self.finish(factor_source_id, SigningPhase::Failure(failure));
    }

    /// Only pending entries move. Finished ones are left alone.
    fn finish(&self, factor_source_id: &FactorSourceId, phase: SigningPhase) {
        self.sender.send_modify(|states| {
            if let Some(state) = states
                .iter_mut()
                .find(|s| &s.factor_source_id == factor_source_id && s.is_pending())
            {
                state.phase = phase;
            }
        });
    }
}
