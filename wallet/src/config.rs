//! # Pipeline Configuration & Constants
//!
//! Every magic number the signing pipeline depends on lives here. The
//! constants are the defaults; [`PipelineConfig`] is what the pipeline
//! actually reads, so a host application can override them from a TOML file
//! without recompiling.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::manifest::{Amount, EntityAddress};

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Mainnet network id.
pub const NETWORK_ID_MAINNET: u8 = 0x01;

/// Stokenet (public testnet) network id.
pub const NETWORK_ID_STOKENET: u8 = 0x02;

/// Local simulator network id.
pub const NETWORK_ID_SIMULATOR: u8 = 0xF2;

// ---------------------------------------------------------------------------
// Transaction Header
// ---------------------------------------------------------------------------

/// Transaction format version written into every header.
pub const TRANSACTION_VERSION: u8 = 1;

/// Number of epochs a header stays valid for. `end = start + EPOCH_WINDOW`.
pub const EPOCH_WINDOW: u64 = 10;

/// Default execution cost-unit limit.
pub const COST_UNIT_LIMIT: u32 = 100_000_000;

/// Default validator tip, as a percentage of the fee.
pub const TIP_PERCENTAGE: u16 = 0;

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Decimal places of the fee currency. Amounts are integers in the smallest
/// unit, so one whole token is `10^FEE_DECIMALS`.
pub const FEE_DECIMALS: u32 = 18;

/// Minimum fee-currency balance (whole tokens) an account must exceed to be
/// picked as the fee payer.
pub const MIN_FEE_RESERVE_WHOLE: u128 = 25;

/// Default amount (whole tokens) locked by the injected `lock_fee` call.
pub const DEFAULT_LOCK_FEE_WHOLE: u128 = 10;

/// Fee currency resource address on mainnet.
pub const MAINNET_FEE_RESOURCE: &str =
    "resource_rdx1tknxxxxxxxxxradxrdxxxxxxxxx009923554798xxxxxxxxxradxrd";

// ---------------------------------------------------------------------------
// Polling & Hardware
// ---------------------------------------------------------------------------

/// Delay between two transaction status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Maximum number of status polls before giving up with an unknown outcome.
pub const MAX_POLL_TRIES: u32 = 20;

/// How long we wait for a hardware wallet to answer a single request.
/// Users read the transaction on a tiny screen, so this is generous.
pub const HARDWARE_RESPONSE_TIMEOUT: Duration = Duration::from_secs(180);

/// Capacity of the outbound hardware request queue.
pub const HARDWARE_CHANNEL_CAPACITY: usize = 8;

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Errors while loading a [`PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for a signing pipeline instance.
///
/// Every field has a default, so a config file only needs to list what it
/// wants to change:
///
/// ```toml
/// epoch_window = 5
/// max_poll_tries = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub epoch_window: u64,
    pub cost_unit_limit: u32,
    pub tip_percentage: u16,
    /// Fee currency resource the fee payer must hold.
    pub fee_resource: EntityAddress,
    /// Minimum balance, in the smallest unit, a fee payer must exceed.
    pub min_fee_reserve: Amount,
    /// Amount, in the smallest unit, locked by the injected `lock_fee` call.
    pub lock_fee: Amount,
    pub poll_interval_ms: u64,
    pub max_poll_tries: u32,
    pub hardware_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            epoch_window: EPOCH_WINDOW,
            cost_unit_limit: COST_UNIT_LIMIT,
            tip_percentage: TIP_PERCENTAGE,
            fee_resource: EntityAddress::new(MAINNET_FEE_RESOURCE),
            min_fee_reserve: Amount::from_whole(MIN_FEE_RESERVE_WHOLE),
            lock_fee: Amount::from_whole(DEFAULT_LOCK_FEE_WHOLE),
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
            max_poll_tries: MAX_POLL_TRIES,
            hardware_timeout_secs: HARDWARE_RESPONSE_TIMEOUT.as_secs(),
        }
    }
}

impl PipelineConfig {
    /// Parses a TOML document. Missing keys fall back to the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Rejects values that would make the pipeline misbehave rather than fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epoch_window == 0 {
            return Err(ConfigError::Invalid("epoch_window must be at least 1".into()));
        }
        if self.max_poll_tries == 0 {
            return Err(ConfigError::Invalid("max_poll_tries must be at least 1".into()));
        }
        if self.hardware_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "hardware_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn hardware_timeout(&self) -> Duration {
        Duration::from_secs(self.hardware_timeout_secs)
    }
}

/// Returns a friendly name for a network id, mainly for logging.
pub fn network_name(network_id: u8) -> String {
    match network_id {
        NETWORK_ID_MAINNET => "mainnet".to_string(),
        NETWORK_ID_STOKENET => "stokenet".to_string(),
        NETWORK_ID_SIMULATOR => "simulator".to_string(),
        other => format!("unknown(0x{:02X})", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.epoch_window, EPOCH_WINDOW);
        assert_eq!(config.max_poll_tries, 20);
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.min_fee_reserve, Amount::from_whole(25));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str("epoch_window = 5\nmax_poll_tries = 3\n").unwrap();
        assert_eq!(config.epoch_window, 5);
        assert_eq!(config.max_poll_tries, 3);
        assert_eq!(config.cost_unit_limit, COST_UNIT_LIMIT);
        assert_eq!(config.fee_resource.as_str(), MAINNET_FEE_RESOURCE);
    }

    #[test]
    fn zero_epoch_window_is_rejected() {
        let err = PipelineConfig::from_toml_str("epoch_window = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = PipelineConfig::from_toml_str("epoch_window = \"ten\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms = 250").unwrap();
        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn network_name_formatting() {
        assert_eq!(network_name(NETWORK_ID_MAINNET), "mainnet");
        assert_eq!(network_name(0x7A), "unknown(0x7A)");
    }
}
