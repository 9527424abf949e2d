//! # Outside-World Interfaces
//!
//! The narrow contracts the pipeline consumes from the ledger gateway and
//! from the host's caches. HTTP framing, retries and JSON shapes belong to
//! the implementor; we only see typed answers and [`GatewayError`].

use async_trait::async_trait;
use thiserror::Error;

use crate::crypto::PublicKeyHash;
use crate::manifest::{Amount, EntityAddress};
use crate::transaction::{Epoch, SubmitResponse, TransactionId, TransactionStatus};

/// Failures reported by a gateway implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never got an answer (timeout, DNS, connection reset).
    #[error("gateway unreachable: {0}")]
    Transport(String),

    /// The gateway answered with an error status.
    #[error("gateway returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("malformed gateway response: {0}")]
    Decode(String),
}

/// Calls the pipeline makes against the ledger.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn ledger_epoch(&self) -> Result<Epoch, GatewayError>;

    /// Submits a compiled notarized transaction, hex encoded.
    async fn submit_transaction(&self, payload_hex: &str) -> Result<SubmitResponse, GatewayError>;

    async fn transaction_status(&self, id: &TransactionId)
        -> Result<TransactionStatus, GatewayError>;
}

/// Fungible balance lookups.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance_of(
        &self,
        account: &EntityAddress,
        resource: &EntityAddress,
    ) -> Result<Amount, GatewayError>;
}

/// Reads an entity's `owner_keys` metadata.
#[async_trait]
pub trait OwnerKeysSource: Send + Sync {
    async fn owner_key_hashes(&self, entity: &EntityAddress)
        -> Result<Vec<PublicKeyHash>, GatewayError>;
}

/// Signal to drop any read-through cache of ledger state. Fire and forget.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_all(&self);
}

/// For hosts without a cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheInvalidator;

impl CacheInvalidator for NoopCacheInvalidator {
    fn invalidate_all(&self) {}
}

impl<F> CacheInvalidator for F
where
    F: Fn() + Send + Sync,
{
    fn invalidate_all(&self) {
        self()
    }
}
