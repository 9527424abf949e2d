//! Submission of notarized transactions.

use std::sync::Arc;
use tracing::{info, warn};

use super::notarize::CompiledTransaction;
use super::types::TransactionId;
use crate::error::TransactionApprovalFailure;
use crate::gateway::{CacheInvalidator, LedgerGateway};

/// Posts compiled transactions and tells the cache when ledger state may
/// have moved.
pub struct Submitter {
    gateway: Arc<dyn LedgerGateway>,
    cache: Arc<dyn CacheInvalidator>,
}

impl Submitter {
    pub fn new(gateway: Arc<dyn LedgerGateway>, cache: Arc<dyn CacheInvalidator>) -> Self {
        Self { gateway, cache }
    }

    /// Submits `compiled`.
    ///
    /// A duplicate is reported as [`TransactionApprovalFailure::InvalidTXDuplicate`],
    /// not as success. Any answer from the network, duplicate or not,
    /// invalidates the cache. A transport failure does not.
    pub async fn submit(
        &self,
        compiled: &CompiledTransaction,
    ) -> Result<TransactionId, TransactionApprovalFailure> {
        let response = self
            .gateway
            .submit_transaction(&compiled.payload_hex())
            .await
            .map_err(|e| {
                warn!(tx_id = %compiled.id, error = %e, "submission failed");
                TransactionApprovalFailure::SubmitNotarizedTransaction
            })?;

        self.cache.invalidate_all();

        if response.duplicate {
            warn!(tx_id = %compiled.id, "network reports duplicate transaction");
            return Err(TransactionApprovalFailure::InvalidTXDuplicate(compiled.id));
        }

        info!(tx_id = %compiled.id, "transaction submitted");
        Ok(compiled.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Hash;
    use crate::gateway::GatewayError;
    use crate::transaction::{Epoch, SubmitResponse, TransactionStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Gateway {
        answer: Result<SubmitResponse, GatewayError>,
    }

    #[async_trait]
    impl LedgerGateway for Gateway {
        async fn ledger_epoch(&self) -> Result<Epoch, GatewayError> {
            Ok(1)
        }

        async fn submit_transaction(&self, _payload_hex: &str) -> Result<SubmitResponse, GatewayError> {
            self.answer.clone()
        }

        async fn transaction_status(
            &self,
            _id: &TransactionId,
        ) -> Result<TransactionStatus, GatewayError> {
            Ok(TransactionStatus::Pending)
        }
    }

    fn compiled() -> CompiledTransaction {
        let payload = b"notarized".to_vec();
        CompiledTransaction {
            id: TransactionId::of_payload(&payload),
            payload,
            intent_hash: Hash::of(b"intent"),
        }
    }

    fn submitter(answer: Result<SubmitResponse, GatewayError>) -> (Submitter, Arc<AtomicUsize>) {
        let invalidations = Arc::new(AtomicUsize::new(0));
        let counter = invalidations.clone();
        let cache = move || {
            counter.fetch_add(1, Ordering::SeqCst);
        };
        (
            Submitter::new(Arc::new(Gateway { answer }), Arc::new(cache)),
            invalidations,
        )
    }

    #[tokio::test]
    async fn accepted_submission_returns_id_and_invalidates() {
        let (submitter, invalidations) = submitter(Ok(SubmitResponse { duplicate: false }));
        let tx = compiled();
        assert_eq!(submitter.submit(&tx).await, Ok(tx.id));
        assert_eq!(invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_is_a_failure_that_still_invalidates() {
        let (submitter, invalidations) = submitter(Ok(SubmitResponse { duplicate: true }));
        let tx = compiled();
        assert_eq!(
            submitter.submit(&tx).await,
            Err(TransactionApprovalFailure::InvalidTXDuplicate(tx.id))
        );
        assert_eq!(invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_failure_does_not_invalidate() {
        let (submitter, invalidations) =
            submitter(Err(GatewayError::Transport("connection reset".into())));
        assert_eq!(
            submitter.submit(&compiled()).await,
            Err(TransactionApprovalFailure::SubmitNotarizedTransaction)
        );
        assert_eq!(invalidations.load(Ordering::SeqCst), 0);
    }
}
