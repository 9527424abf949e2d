//! Transaction header construction.
//!
//! A header pins an intent to a short epoch window and a random nonce, so a
//! signed transaction can't be replayed later or twice.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::Epoch;
use crate::config::{PipelineConfig, TRANSACTION_VERSION};
use crate::crypto::PublicKey;
use crate::error::{DappRequestFailure, TransactionApprovalFailure};
use crate::gateway::LedgerGateway;

/// Header of a transaction intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    pub version: u8,
    pub network_id: u8,
    /// First epoch the transaction may execute in.
    pub start_epoch_inclusive: Epoch,
    /// First epoch the transaction may no longer execute in.
    pub end_epoch_exclusive: Epoch,
    pub nonce: u64,
    pub notary_public_key: PublicKey,
    pub notary_is_signatory: bool,
    pub cost_unit_limit: u32,
    pub tip_percentage: u16,
}

impl TransactionHeader {
    /// Whether a ledger at `epoch` would still accept this header.
    pub fn is_valid_at(&self, epoch: Epoch) -> bool {
        self.start_epoch_inclusive <= epoch && epoch < self.end_epoch_exclusive
    }
}

/// Builds headers for one network with fixed execution parameters.
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    network_id: u8,
    epoch_window: u64,
    cost_unit_limit: u32,
    tip_percentage: u16,
}

impl HeaderBuilder {
    pub fn new(network_id: u8, config: &PipelineConfig) -> Self {
        Self {
            network_id,
            epoch_window: config.epoch_window,
            cost_unit_limit: config.cost_unit_limit,
            tip_percentage: config.tip_percentage,
        }
    }

    pub fn tip_percentage(mut self, tip_percentage: u16) -> Self {
        self.tip_percentage = tip_percentage;
        self
    }

    /// Fetches the current epoch and builds a header starting there.
    pub async fn build_for_current_epoch(
        &self,
        gateway: &dyn LedgerGateway,
        notary_public_key: PublicKey,
    ) -> Result<TransactionHeader, DappRequestFailure> {
        let epoch = gateway.ledger_epoch().await.map_err(|e| {
            warn!(error = %e, "failed to fetch ledger epoch");
            DappRequestFailure::GetEpoch
        })?;
        Ok(self.build(epoch, notary_public_key)?)
    }

    /// Builds a header starting at `epoch` with a fresh CSPRNG nonce.
    pub fn build(
        &self,
        epoch: Epoch,
        notary_public_key: PublicKey,
    ) -> Result<TransactionHeader, TransactionApprovalFailure> {
        self.build_with_nonce(epoch, OsRng.next_u64(), notary_public_key)
    }

    pub fn build_with_nonce(
        &self,
        epoch: Epoch,
        nonce: u64,
        notary_public_key: PublicKey,
    ) -> Result<TransactionHeader, TransactionApprovalFailure> {
        if self.epoch_window == 0 {
            return Err(TransactionApprovalFailure::BuildTransactionHeader);
        }
        let end = epoch
            .checked_add(self.epoch_window)
            .ok_or(TransactionApprovalFailure::BuildTransactionHeader)?;

        debug!(start_epoch = epoch, end_epoch = end, "transaction header built");
        Ok(TransactionHeader {
            version: TRANSACTION_VERSION,
            network_id: self.network_id,
            start_epoch_inclusive: epoch,
            end_epoch_exclusive: end,
            nonce,
            notary_public_key,
            notary_is_signatory: false,
            cost_unit_limit: self.cost_unit_limit,
            tip_percentage: self.tip_percentage,
        })
    }
}
