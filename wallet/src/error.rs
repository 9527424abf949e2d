//! # Failure Taxonomy
//!
//! Every way a signing request can fail, as reported to the UI and to the
//! requesting dApp. The set is closed: module-level errors (`ManifestError`,
//! `GatewayError`, `SigningFailure`, ...) are mapped into it where the
//! pipeline hands a result back to its caller.
//!
//! Each variant carries only what is needed to render a message. Failures
//! tied to a submitted transaction always carry its id.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signing::{LedgerErrorCode, SigningFailure};
use crate::transaction::TransactionId;

/// Top-level failure of a dApp request (transaction or login).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DappRequestFailure {
    /// The current ledger epoch could not be fetched.
    #[error("failed to get the current ledger epoch")]
    GetEpoch,

    #[error("request rejected by the user")]
    RejectedByUser,

    /// The request was malformed (bad challenge, oversized address, ...).
    #[error("invalid request")]
    InvalidRequest,

    /// Pre-flight check: the request targets another network.
    #[error("wrong network: wallet is on {current}, request is for {requested}")]
    WrongNetwork { current: u8, requested: u8 },

    #[error("failed to sign auth challenge: {0}")]
    FailedToSignAuthChallenge(String),

    #[error(transparent)]
    TransactionApproval(#[from] TransactionApprovalFailure),

    #[error(transparent)]
    LedgerCommunication(#[from] LedgerCommunicationFailure),
}

/// Failures of the transaction approval pipeline proper.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionApprovalFailure {
    /// The manifest could not be converted or encoded.
    #[error("failed to convert manifest")]
    ConvertManifest,

    #[error("failed to build transaction header")]
    BuildTransactionHeader,

    #[error("no account has enough funds to lock the fee")]
    FailedToFindAccountWithEnoughFundsToLockFee,

    #[error("failed to compile transaction intent")]
    CompileTransactionIntent,

    #[error("failed to sign compiled transaction intent")]
    SignCompiledTransactionIntent,

    /// Signing, compilation or id derivation failed. Also raised when no
    /// required signer could be resolved.
    #[error("failed to prepare notarized transaction")]
    PrepareNotarizedTransaction,

    /// Transport failure while submitting. The user may retry the flow.
    #[error("failed to submit notarized transaction")]
    SubmitNotarizedTransaction,

    /// The network had already accepted this exact transaction.
    #[error("transaction {0} is a duplicate")]
    InvalidTXDuplicate(TransactionId),

    /// Poll budget exhausted. The outcome is unknown, not failed.
    #[error("gave up polling status of transaction {0}")]
    FailedToPollTXStatus(TransactionId),

    #[error("transaction {0} was rejected")]
    GatewayRejected(TransactionId),

    #[error("transaction {0} was committed with a failure")]
    GatewayCommittedFailure(TransactionId),
}

/// Failures talking to a hardware wallet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerCommunicationFailure {
    #[error("failed to get hardware device id")]
    FailedToGetDeviceId,

    #[error("failed to derive public keys on hardware device")]
    FailedToDerivePublicKeys,

    #[error("hardware device failed to sign: {0:?}")]
    FailedToSignTransaction(LedgerErrorCode),
}

/// Error type reported back to the dApp, in its wire spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WalletErrorType {
    RejectedByUser,
    WrongNetwork,
    InvalidRequest,
    FailedToPrepareTransaction,
    FailedToCompileTransaction,
    FailedToSignTransaction,
    FailedToSubmitTransaction,
    FailedToPollSubmittedTransaction,
    FailedToFindAccountWithEnoughFundsToLockFee,
    SubmittedTransactionWasDuplicate,
    SubmittedTransactionHasFailedTransactionStatus,
    SubmittedTransactionHasRejectedTransactionStatus,
    FailedToSignAuthChallenge,
}

impl DappRequestFailure {
    /// Maps a signer failure from a transaction signing round.
    pub fn from_transaction_signing(failure: SigningFailure) -> Self {
        match failure {
            SigningFailure::UserRejected | SigningFailure::Cancelled => Self::RejectedByUser,
            SigningFailure::Hardware(code) => {
                LedgerCommunicationFailure::FailedToSignTransaction(code).into()
            }
            SigningFailure::Timeout | SigningFailure::DeviceCommunication(_) => {
                LedgerCommunicationFailure::FailedToSignTransaction(LedgerErrorCode::Generic).into()
            }
            SigningFailure::InvalidResponse(_) | SigningFailure::Keystore(_) => {
                TransactionApprovalFailure::SignCompiledTransactionIntent.into()
            }
        }
    }

    /// Maps a signer failure from an auth challenge signing round.
    pub fn from_auth_signing(failure: SigningFailure) -> Self {
        match failure {
            SigningFailure::UserRejected | SigningFailure::Cancelled => Self::RejectedByUser,
            SigningFailure::Hardware(code) => {
                LedgerCommunicationFailure::FailedToSignTransaction(code).into()
            }
            other => Self::FailedToSignAuthChallenge(other.to_string()),
        }
    }

    pub fn wallet_error_type(&self) -> WalletErrorType {
        use TransactionApprovalFailure as Tx;
        match self {
            Self::GetEpoch => WalletErrorType::FailedToPrepareTransaction,
            Self::RejectedByUser => WalletErrorType::RejectedByUser,
            Self::InvalidRequest => WalletErrorType::InvalidRequest,
            Self::WrongNetwork { .. } => WalletErrorType::WrongNetwork,
            Self::FailedToSignAuthChallenge(_) => WalletErrorType::FailedToSignAuthChallenge,
            Self::LedgerCommunication(_) => WalletErrorType::InvalidRequest,
            Self::TransactionApproval(failure) => match failure {
                Tx::ConvertManifest | Tx::BuildTransactionHeader => {
                    WalletErrorType::FailedToPrepareTransaction
                }
                Tx::FailedToFindAccountWithEnoughFundsToLockFee => {
                    WalletErrorType::FailedToFindAccountWithEnoughFundsToLockFee
                }
                Tx::CompileTransactionIntent => WalletErrorType::FailedToCompileTransaction,
                Tx::SignCompiledTransactionIntent | Tx::PrepareNotarizedTransaction => {
                    WalletErrorType::FailedToSignTransaction
                }
                Tx::SubmitNotarizedTransaction => WalletErrorType::FailedToSubmitTransaction,
                Tx::InvalidTXDuplicate(_) => WalletErrorType::SubmittedTransactionWasDuplicate,
                Tx::FailedToPollTXStatus(_) => WalletErrorType::FailedToPollSubmittedTransaction,
                Tx::GatewayRejected(_) => {
                    WalletErrorType::SubmittedTransactionHasRejectedTransactionStatus
                }
                Tx::GatewayCommittedFailure(_) => {
                    WalletErrorType::SubmittedTransactionHasFailedTransactionStatus
                }
            },
        }
    }

    /// Fixed user-facing message for this failure kind.
    pub fn description(&self) -> &'static str {
        use TransactionApprovalFailure as Tx;
        match self {
            Self::GetEpoch => "Failed to get the current epoch from the network.",
            Self::RejectedByUser => "Transaction rejected.",
            Self::InvalidRequest => "Invalid request.",
            Self::WrongNetwork { .. } => "The request is for a different network.",
            Self::FailedToSignAuthChallenge(_) => "Something went wrong.",
            Self::LedgerCommunication(failure) => match failure {
                LedgerCommunicationFailure::FailedToSignTransaction(
                    LedgerErrorCode::BlindSigningNotEnabledButRequired,
                ) => "Blind signing must be enabled on the hardware wallet for this transaction.",
                LedgerCommunicationFailure::FailedToSignTransaction(
                    LedgerErrorCode::UserRejectedSigningOfTransaction,
                ) => "Transaction rejected on the hardware wallet.",
                _ => "Something went wrong.",
            },
            Self::TransactionApproval(failure) => match failure {
                Tx::ConvertManifest => "Failed to convert the transaction manifest.",
                Tx::BuildTransactionHeader => "Failed to build the transaction header.",
                Tx::FailedToFindAccountWithEnoughFundsToLockFee => {
                    "No account has enough funds to pay the transaction fee."
                }
                Tx::CompileTransactionIntent
                | Tx::SignCompiledTransactionIntent
                | Tx::PrepareNotarizedTransaction => "Failed to prepare the transaction.",
                Tx::SubmitNotarizedTransaction => "Failed to submit the transaction.",
                Tx::InvalidTXDuplicate(_) => "This transaction was already submitted.",
                Tx::FailedToPollTXStatus(_) => {
                    "Could not confirm the transaction status. It may still be committed."
                }
                Tx::GatewayRejected(_) => "The network rejected the transaction.",
                Tx::GatewayCommittedFailure(_) => "The transaction was committed but failed.",
            },
        }
    }

    /// Extra detail sent to the dApp alongside [`Self::wallet_error_type`].
    pub fn dapp_message(&self) -> Option<String> {
        use TransactionApprovalFailure as Tx;
        match self {
            Self::TransactionApproval(
                Tx::InvalidTXDuplicate(id)
                | Tx::FailedToPollTXStatus(id)
                | Tx::GatewayRejected(id)
                | Tx::GatewayCommittedFailure(id),
            ) => Some(format!("TXID: {id}")),
            Self::WrongNetwork { current, requested } => Some(format!(
                "Wallet is using network ID: {current}, request sent specified network ID: {requested}"
            )),
            _ => None,
        }
    }

    /// The transaction id, for failures that happened after submission.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        use TransactionApprovalFailure as Tx;
        match self {
            Self::TransactionApproval(
                Tx::InvalidTXDuplicate(id)
                | Tx::FailedToPollTXStatus(id)
                | Tx::GatewayRejected(id)
                | Tx::GatewayCommittedFailure(id),
            ) => Some(*id),
            _ => None,
        }
    }

    /// Whether a generic failure dialog should show this. Hardware failures
    /// are already reported by the hardware interaction UI.
    pub fn is_presented_in_dialog(&self) -> bool {
        !matches!(self, Self::LedgerCommunication(_))
    }
}
