//! Per-attempt signing context.
//!
//! A [`SigningAttempt`] owns the cancel flag and the [`SigningProgress`] of a
//! single signing attempt. Attempts running side by side on one coordinator
//! never see each other's states, and cancelling one leaves the others alone.
//! A cancelled attempt stays cancelled.

use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::hardware::cancelled;
use super::state::{SigningFailure, SigningProgress, SigningState};

#[derive(Debug)]
struct AttemptInner {
    id: Uuid,
    progress: SigningProgress,
    cancel: watch::Sender<bool>,
}

/// Handle on one signing attempt. Clones share the same attempt.
#[derive(Debug, Clone)]
pub struct SigningAttempt {
    inner: Arc<AttemptInner>,
}

impl Default for SigningAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningAttempt {
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            inner: Arc::new(AttemptInner {
                id: Uuid::new_v4(),
                progress: SigningProgress::new(),
                cancel,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Live view of this attempt's per-factor-source states.
    pub fn subscribe(&self) -> watch::Receiver<Vec<SigningState>> {
        self.inner.progress.subscribe()
    }

    pub fn signing_states(&self) -> Vec<SigningState> {
        self.inner.progress.snapshot()
    }

    /// Abandons the attempt. Pending hardware requests resolve to
    /// [`SigningFailure::Cancelled`] and no later step runs.
    pub fn cancel(&self) {
        self.inner.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel.borrow()
    }

    /// `Err(Cancelled)` once the attempt has been cancelled.
    pub fn ensure_active(&self) -> Result<(), SigningFailure> {
        if self.is_cancelled() {
            Err(SigningFailure::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the attempt is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.inner.cancel.subscribe();
        cancelled(&mut receiver).await;
    }

    pub(crate) fn cancel_receiver(&self) -> watch::Receiver<bool> {
        self.inner.cancel.subscribe()
    }

    pub(crate) fn progress(&self) -> &SigningProgress {
        &self.inner.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{FactorSourceId, FactorSourceKind, SigningPurpose};
    use std::time::Duration;

    #[test]
    fn attempts_do_not_share_state() {
        let first = SigningAttempt::new();
        let second = SigningAttempt::new();

        first.progress().mark_pending(
            &FactorSourceId::new("ledger-1"),
            FactorSourceKind::Hardware,
            SigningPurpose::SignTransaction,
        );
        second.cancel();

        assert_eq!(first.signing_states().len(), 1);
        assert!(second.signing_states().is_empty());
        assert!(!first.is_cancelled());
        assert_eq!(second.ensure_active(), Err(SigningFailure::Cancelled));
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn clones_share_the_attempt() {
        let attempt = SigningAttempt::new();
        let handle = attempt.clone();
        handle.cancel();
        assert!(attempt.is_cancelled());
        assert_eq!(attempt.id(), handle.id());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let attempt = SigningAttempt::new();
        let canceller = attempt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        tokio::time::timeout(Duration::from_secs(5), attempt.cancelled())
            .await
            .unwrap();
    }
}
