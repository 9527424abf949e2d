//! Bounded status polling.
//!
//! Fixed interval, fixed number of attempts, no backoff. A failed fetch
//! counts as an attempt. Running out of attempts means "unknown outcome":
//! the transaction may still commit afterwards.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{TransactionId, TransactionStatus};
use crate::config::PipelineConfig;
use crate::error::TransactionApprovalFailure;
use crate::gateway::LedgerGateway;

pub struct StatusPoller {
    gateway: Arc<dyn LedgerGateway>,
    interval: Duration,
    max_tries: u32,
}

impl StatusPoller {
    pub fn new(gateway: Arc<dyn LedgerGateway>, interval: Duration, max_tries: u32) -> Self {
        Self {
            gateway,
            interval,
            max_tries,
        }
    }

    pub fn from_config(gateway: Arc<dyn LedgerGateway>, config: &PipelineConfig) -> Self {
        Self::new(gateway, config.poll_interval(), config.max_poll_tries)
    }

    /// Polls until a terminal status or `max_tries` fetches, whichever comes
    /// first. Sleeps `interval` between fetches, not after the last one.
    pub async fn poll(&self, id: TransactionId) -> Result<TransactionId, TransactionApprovalFailure> {
        for attempt in 1..=self.max_tries {
            match self.gateway.transaction_status(&id).await {
                Ok(TransactionStatus::CommittedSuccess) => {
                    info!(tx_id = %id, attempt, "transaction committed");
                    return Ok(id);
                }
                Ok(TransactionStatus::CommittedFailure) => {
                    warn!(tx_id = %id, attempt, "transaction committed with failure");
                    return Err(TransactionApprovalFailure::GatewayCommittedFailure(id));
                }
                Ok(TransactionStatus::Rejected) => {
                    warn!(tx_id = %id, attempt, "transaction rejected");
                    return Err(TransactionApprovalFailure::GatewayRejected(id));
                }
                Ok(status) => debug!(tx_id = %id, attempt, ?status, "transaction not final yet"),
                Err(e) => warn!(tx_id = %id, attempt, error = %e, "status poll failed"),
            }

            if attempt < self.max_tries {
                tokio::time::sleep(self.interval).await;
            }
        }

        warn!(tx_id = %id, tries = self.max_tries, "giving up on transaction status");
        Err(TransactionApprovalFailure::FailedToPollTXStatus(id))
    }
}
