//! # Signing Module
//!
//! ```text
//! types.rs       - Factor sources, factor instances, signer handles
//! state.rs       - Observable per-factor-source SigningState
//! attempt.rs     - SigningAttempt: progress + cancel flag of one attempt
//! keystore.rs    - On-device keystore trait + in-memory implementation
//! hardware.rs    - Request/response link to a hardware wallet
//! coordinator.rs - SigningCoordinator: drives a whole signing round
//! ```

pub mod attempt;
pub mod coordinator;
pub mod hardware;
pub mod keystore;
pub mod state;
pub mod types;

pub use attempt::SigningAttempt;
pub use coordinator::{EntitySignature, SigningCoordinator};
pub use hardware::{
    verify_response, HardwareEnvelope, HardwareKey, HardwareLink, HardwareRequest,
    HardwareResponse, HardwareSignature, LedgerErrorCode,
};
pub use keystore::{DeviceKeystore, InMemoryKeystore};
pub use state::{SigningFailure, SigningPhase, SigningProgress, SigningState};
pub use types::{FactorInstance, FactorSourceId, FactorSourceKind, SignerHandle, SigningPurpose};
