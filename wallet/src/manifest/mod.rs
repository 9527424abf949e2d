//! # Manifest Module
//!
//! The transaction manifest model and the static analysis the pipeline runs
//! over it.
//!
//! ```text
//! types.rs    - EntityAddress, Amount, Instruction, TransactionManifest
//! analysis.rs - Involved / auth-requiring address extraction
//! builder.rs  - Fluent ManifestBuilder
//! ```

pub mod analysis;
pub mod builder;
pub mod types;

pub use analysis::{
    addresses_requiring_auth, collect_addresses, identities_requiring_auth, involved_addresses,
    AddressFilter,
};
pub use builder::ManifestBuilder;
pub use types::{
    Amount, EntityAddress, EntityKind, Instruction, ManifestError, ManifestInstructions,
    ManifestValue, TransactionManifest, LOCK_FEE_METHOD, METHODS_REQUIRING_AUTH,
    OWNER_KEYS_METADATA_KEY,
};
