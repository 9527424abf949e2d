//! # Transaction Client
//!
//! The `sign_and_submit` entry point. Runs the pipeline steps strictly in
//! order and stops at the first failure:
//!
//! ```text
//! network check -> address analysis -> fee payer -> lock_fee injection
//!   -> signer resolution -> header -> intent hash -> signing
//!   -> notarization -> submission -> status polling
//! ```
//!
//! Every run belongs to a [`SigningAttempt`]. Cancelling it (or calling
//! [`TransactionClient::cancel`], which cancels every running attempt)
//! interrupts the step in progress and fails with `RejectedByUser`, up to
//! submission. Nothing reaches the network before that point. Cancelling
//! while polling stops the poll with `FailedToPollTXStatus`.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{DappRequestFailure, TransactionApprovalFailure};
use crate::gateway::{BalanceSource, CacheInvalidator, LedgerGateway, NoopCacheInvalidator};
use crate::manifest::{
    addresses_requiring_auth, identities_requiring_auth, involved_addresses, Amount,
    EntityAddress, TransactionManifest,
};
use crate::profile::{ProfileSource, SignerResolver};
use crate::signing::{SigningAttempt, SigningCoordinator, SigningPurpose};
use crate::transaction::{
    notarize, CompiledTransaction, FeePayerSearchResult, FeePayerSelector, HeaderBuilder,
    NotaryAndSigners, StatusPoller, Submitter, TransactionId, TransactionIntent,
};

/// A transaction a dApp (or the wallet itself) asks the user to approve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionApprovalRequest {
    pub manifest: TransactionManifest,
    /// Network the request was made for.
    pub network_id: u8,
    pub message: Option<String>,
    /// Fee payer chosen by the user. Searched for when `None`.
    pub fee_payer: Option<EntityAddress>,
    /// Overrides the configured lock-fee amount.
    pub lock_fee: Option<Amount>,
    /// Overrides the configured tip.
    pub tip_percentage: Option<u16>,
}

impl TransactionApprovalRequest {
    pub fn new(manifest: TransactionManifest, network_id: u8) -> Self {
        Self {
            manifest,
            network_id,
            message: None,
            fee_payer: None,
            lock_fee: None,
            tip_percentage: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn fee_payer(mut self, account: EntityAddress) -> Self {
        self.fee_payer = Some(account);
        self
    }

    pub fn lock_fee(mut self, amount: Amount) -> Self {
        self.lock_fee = Some(amount);
        self
    }

    pub fn tip_percentage(mut self, tip_percentage: u16) -> Self {
        self.tip_percentage = Some(tip_percentage);
        self
    }
}

/// Keeps an attempt reachable from [`TransactionClient::cancel`] while it
/// runs.
struct Registration<'a> {
    active: &'a Mutex<Vec<SigningAttempt>>,
    id: Uuid,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.active.lock().retain(|attempt| attempt.id() != self.id);
    }
}

/// Signs, notarizes, submits and tracks transactions.
pub struct TransactionClient {
    config: PipelineConfig,
    gateway: Arc<dyn LedgerGateway>,
    profile: Arc<dyn ProfileSource>,
    resolver: Arc<dyn SignerResolver>,
    coordinator: Arc<SigningCoordinator>,
    fee_payers: FeePayerSelector,
    submitter: Submitter,
    poller: StatusPoller,
    active: Mutex<Vec<SigningAttempt>>,
}

impl TransactionClient {
    pub fn new(
        config: PipelineConfig,
        gateway: Arc<dyn LedgerGateway>,
        balances: Arc<dyn BalanceSource>,
        profile: Arc<dyn ProfileSource>,
        resolver: Arc<dyn SignerResolver>,
        coordinator: Arc<SigningCoordinator>,
    ) -> Self {
        let fee_payers = FeePayerSelector::new(
            balances,
            config.fee_resource.clone(),
            config.min_fee_reserve,
        );
        let submitter = Submitter::new(gateway.clone(), Arc::new(NoopCacheInvalidator));
        let poller = StatusPoller::from_config(gateway.clone(), &config);
        Self {
            config,
            gateway,
            profile,
            resolver,
            coordinator,
            fee_payers,
            submitter,
            poller,
            active: Mutex::new(Vec::new()),
        }
    }

    /// Cache to invalidate after every answered submission.
    pub fn with_cache_invalidator(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.submitter = Submitter::new(self.gateway.clone(), cache);
        self
    }

    /// Cancels every attempt currently running on this client.
    pub fn cancel(&self) {
        let active = self.active.lock();
        info!(attempts = active.len(), "cancelling running attempts");
        for attempt in active.iter() {
            attempt.cancel();
        }
    }

    /// Fee payer the pipeline would pick for `manifest`, plus every profile
    /// account with its balance.
    pub async fn search_fee_payers(&self, manifest: &TransactionManifest) -> FeePayerSearchResult {
        let involved = involved_addresses(manifest);
        self.fee_payers
            .select(&involved, &self.profile_account_addresses())
            .await
    }

    /// Runs the whole pipeline under a fresh attempt and returns the id once
    /// the transaction has committed successfully.
    pub async fn sign_and_submit(
        &self,
        request: TransactionApprovalRequest,
    ) -> Result<TransactionId, DappRequestFailure> {
        self.sign_and_submit_with(request, &SigningAttempt::new())
            .await
    }

    /// Like [`sign_and_submit`](Self::sign_and_submit), under a caller-held
    /// attempt that can be observed and cancelled.
    pub async fn sign_and_submit_with(
        &self,
        request: TransactionApprovalRequest,
        attempt: &SigningAttempt,
    ) -> Result<TransactionId, DappRequestFailure> {
        let _registration = self.register(attempt);
        let id = self.sign_and_send(request, attempt).await?;

        tokio::select! {
            biased;
            _ = attempt.cancelled() => {
                info!(attempt = %attempt.id(), tx_id = %id, "status polling abandoned");
                Err(DappRequestFailure::from(TransactionApprovalFailure::FailedToPollTXStatus(id)))
            }
            result = self.poller.poll(id) => Ok(result?),
        }
    }

    /// Signs and submits without waiting for the outcome.
    pub async fn submit(
        &self,
        request: TransactionApprovalRequest,
        attempt: &SigningAttempt,
    ) -> Result<TransactionId, DappRequestFailure> {
        let _registration = self.register(attempt);
        self.sign_and_send(request, attempt).await
    }

    /// Waits for a submitted transaction to reach a terminal status.
    pub async fn poll_status(&self, id: TransactionId) -> Result<TransactionId, DappRequestFailure> {
        Ok(self.poller.poll(id).await?)
    }

    /// Everything up to and including notarization. Nothing is sent.
    pub async fn sign_transaction(
        &self,
        request: TransactionApprovalRequest,
        attempt: &SigningAttempt,
    ) -> Result<CompiledTransaction, DappRequestFailure> {
        let _registration = self.register(attempt);
        self.prepare(request, attempt).await
    }

    async fn sign_and_send(
        &self,
        request: TransactionApprovalRequest,
        attempt: &SigningAttempt,
    ) -> Result<TransactionId, DappRequestFailure> {
        let compiled = self.prepare(request, attempt).await?;
        ensure_active(attempt)?;
        Ok(self.submitter.submit(&compiled).await?)
    }

    async fn prepare(
        &self,
        request: TransactionApprovalRequest,
        attempt: &SigningAttempt,
    ) -> Result<CompiledTransaction, DappRequestFailure> {
        ensure_active(attempt)?;
        let network_id = self.profile.current_network_id();
        if network_id != request.network_id {
            warn!(
                current = network_id,
                requested = request.network_id,
                "request targets another network"
            );
            return Err(DappRequestFailure::WrongNetwork {
                current: network_id,
                requested: request.network_id,
            });
        }
        if request.manifest.parsed_instructions().is_none() {
            return Err(TransactionApprovalFailure::ConvertManifest.into());
        }

        let fee_payer = match request.fee_payer.clone() {
            Some(account) => account,
            None => {
                unless_cancelled(attempt, async {
                    self.search_fee_payers(&request.manifest)
                        .await
                        .fee_payer
                        .ok_or_else(|| {
                            DappRequestFailure::from(
                                TransactionApprovalFailure::FailedToFindAccountWithEnoughFundsToLockFee,
                            )
                        })
                })
                .await?
            }
        };
        info!(attempt = %attempt.id(), fee_payer = %fee_payer, "fee payer selected");

        let lock_fee = request.lock_fee.unwrap_or(self.config.lock_fee);
        let manifest = request
            .manifest
            .with_lock_fee(&fee_payer, lock_fee)
            .map_err(|_| TransactionApprovalFailure::ConvertManifest)?;

        let required = required_signers(&manifest, &fee_payer);
        let signers = unless_cancelled(attempt, async {
            Ok(self
                .resolver
                .signers_for_addresses(network_id, &required)
                .await)
        })
        .await?;
        if signers.is_empty() {
            warn!(required = required.len(), "no required signer could be resolved");
            return Err(TransactionApprovalFailure::PrepareNotarizedTransaction.into());
        }
        let notary_and_signers = NotaryAndSigners::new(signers);
        info!(
            required = required.len(),
            resolved = notary_and_signers.signers().len(),
            "signers resolved"
        );

        let mut header_builder = HeaderBuilder::new(network_id, &self.config);
        if let Some(tip) = request.tip_percentage {
            header_builder = header_builder.tip_percentage(tip);
        }
        let header = unless_cancelled(
            attempt,
            header_builder.build_for_current_epoch(
                self.gateway.as_ref(),
                notary_and_signers.notary().public_key(),
            ),
        )
        .await?;

        let intent = TransactionIntent::new(header, manifest, request.message);
        let intent_hash = intent.hash()?;

        let signatures = self
            .coordinator
            .sign(
                notary_and_signers.signers(),
                intent_hash.as_bytes(),
                SigningPurpose::SignTransaction,
                attempt,
            )
            .await
            .map_err(DappRequestFailure::from_transaction_signing)?;

        // Entities sharing a key carry the same signature; the intent takes it once.
        let mut intent_signatures = Vec::with_capacity(signatures.len());
        for entry in signatures {
            if !intent_signatures.contains(&entry.signature) {
                intent_signatures.push(entry.signature);
            }
        }

        let compiled = notarize(intent, intent_signatures, notary_and_signers.notary())?;
        ensure_active(attempt)?;
        info!(attempt = %attempt.id(), tx_id = %compiled.id, "transaction signed and notarized");
        Ok(compiled)
    }

    fn register(&self, attempt: &SigningAttempt) -> Registration<'_> {
        let mut active = self.active.lock();
        if !active.iter().any(|a| a.id() == attempt.id()) {
            active.push(attempt.clone());
        }
        Registration {
            active: &self.active,
            id: attempt.id(),
        }
    }

    fn profile_account_addresses(&self) -> Vec<EntityAddress> {
        self.profile
            .accounts_on_current_network()
            .into_iter()
            .map(|account| account.address)
            .collect()
    }
}

fn ensure_active(attempt: &SigningAttempt) -> Result<(), DappRequestFailure> {
    attempt
        .ensure_active()
        .map_err(DappRequestFailure::from_transaction_signing)
}

/// Runs `step` unless the attempt is cancelled first.
async fn unless_cancelled<T>(
    attempt: &SigningAttempt,
    step: impl Future<Output = Result<T, DappRequestFailure>>,
) -> Result<T, DappRequestFailure> {
    tokio::select! {
        biased;
        _ = attempt.cancelled() => {
            info!(attempt = %attempt.id(), "attempt cancelled");
            Err(DappRequestFailure::RejectedByUser)
        }
        result = step => result,
    }
}

/// Accounts and personas that must sign `manifest`, plus the fee payer,
/// without repeats.
pub fn required_signers(manifest: &TransactionManifest, fee_payer: &EntityAddress) -> Vec<EntityAddress> {
    let mut required = addresses_requiring_auth(manifest);
    if !required.contains(fee_payer) {
        required.push(fee_payer.clone());
    }
    for identity in identities_requiring_auth(manifest) {
        if !required.contains(&identity) {
            required.push(identity);
        }
    }
    required
}
