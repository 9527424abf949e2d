// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vela Wallet: Transaction Signing Pipeline
//!
//! Everything between "the user pressed Approve" and "the ledger says it
//! committed" lives in this crate. A caller hands us a transaction manifest;
//! we figure out who has to sign it, who pays the fee, bind it to an epoch
//! window, collect signatures from whatever key sources are involved (keys on
//! this device, or a hardware wallet on the other side of a message channel),
//! notarize, submit, and poll until the network gives a final answer.
//!
//! ## Architecture
//!
//! The pipeline is a straight line of steps. Each one lives in its own module
//! and can be exercised on its own:
//!
//! - **manifest**: Manifest model and static address analysis.
//! - **transaction**: Fee payer selection, header construction, notarization,
//!   submission and status polling.
//! - **signing**: The multi-signer coordinator, its observable per-signer
//!   state, the on-device keystore and the hardware request/response link.
//! - **rola**: Off-ledger authentication: challenge signing for dApp login
//!   and owner-key registration manifests.
//! - **client**: The `sign_and_submit` entry point that wires it all together.
//! - **gateway** / **profile**: The narrow traits we consume from the outside
//!   world (ledger gateway, balances, wallet profile).
//! - **error**: The closed failure taxonomy reported back to the UI and dApps.
//! - **config** / **logging**: Constants, tunables, and tracing setup.
//!
//! ## Ground Rules
//!
//! 1. Nothing partially signed ever reaches the network.
//! 2. Every failure is a value. No panics cross a module boundary.
//! 3. Key material is never logged.
//! 4. Signing attempts share no state. Each has its own progress and cancel flag.

pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod manifest;
pub mod profile;
pub mod rola;
pub mod signing;
pub mod transaction;

pub use client::{TransactionApprovalRequest, TransactionClient};
pub use error::{DappRequestFailure, LedgerCommunicationFailure, TransactionApprovalFailure};
