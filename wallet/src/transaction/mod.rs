//! # Transaction Module
//!
//! The ledger-facing half of the pipeline.
//!
//! ```text
//! types.rs    - TransactionId, TransactionStatus, Epoch, SubmitResponse
//! fee.rs      - FeePayerSelector
//! header.rs   - TransactionHeader + HeaderBuilder
//! notarize.rs - Intent compilation, notary signature, transaction id
//! submit.rs   - Submitter (duplicate detection, cache invalidation)
//! poll.rs     - StatusPoller (bounded, fixed interval)
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Fee payer**: pick an account able to lock the fee.
//! 2. **Header**: bind the intent to the current epoch window.
//! 3. **Notarize**: signer signatures, then the notary's, then compile.
//! 4. **Submit**: post the payload; duplicates are failures.
//! 5. **Poll**: wait for a terminal status or give up.

pub mod fee;
pub mod header;
pub mod notarize;
pub mod poll;
pub mod submit;
pub mod types;

pub use fee::{FeePayerCandidate, FeePayerSearchResult, FeePayerSelector};
pub use header::{HeaderBuilder, TransactionHeader};
pub use notarize::{
    decompile, notarize, CompiledTransaction, NotarizedTransaction, NotaryAndSigners, SignedIntent,
    TransactionIntent,
};
pub use poll::StatusPoller;
pub use submit::Submitter;
pub use types::{Epoch, SubmitResponse, TransactionId, TransactionStatus};
