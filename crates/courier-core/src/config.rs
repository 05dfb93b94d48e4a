//! Configuration types for Courier

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::{constants, Lovelace, Network};

/// Ledger data provider connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider base URL
    pub url: String,

    /// Project id / API key for authenticated endpoints (optional)
    #[serde(default)]
    pub project_id: String,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: "https://cardano-preview.blockfrost.io/api/v0".to_string(),
            project_id: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Bounded polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Multiplier applied to the delay after every attempt (1.0 = fixed delay)
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    60
}

fn default_delay_ms() -> u64 {
    2_000
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Transfer flow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    pub network: Network,

    /// Slots added to the current slot to form the TTL
    #[serde(default = "default_ttl_slot_offset")]
    pub ttl_slot_offset: u64,

    /// How many candidate UTXOs selection may scan
    #[serde(default = "default_max_inputs_considered")]
    pub max_inputs_considered: usize,

    /// Soft floor on the number of chosen inputs
    #[serde(default = "default_min_desired_inputs")]
    pub min_desired_inputs: usize,

    /// Fee allowance reserved while selecting inputs
    #[serde(default = "default_potential_fee")]
    pub potential_fee: Lovelace,

    /// Confirmation polling
    #[serde(default)]
    pub confirmation: RetryConfig,
}

fn default_ttl_slot_offset() -> u64 {
    constants::DEFAULT_TTL_SLOT_OFFSET
}

fn default_max_inputs_considered() -> usize {
    20
}

fn default_min_desired_inputs() -> usize {
    1
}

fn default_potential_fee() -> Lovelace {
    constants::POTENTIAL_FEE
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet {
                magic: constants::PREVIEW_MAGIC,
            },
            ttl_slot_offset: default_ttl_slot_offset(),
            max_inputs_considered: default_max_inputs_considered(),
            min_desired_inputs: default_min_desired_inputs(),
            potential_fee: default_potential_fee(),
            confirmation: RetryConfig::default(),
        }
    }
}

impl TransferConfig {
    /// Reject settings that can never produce a transaction
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_inputs_considered == 0 {
            return Err(Error::Config(
                "max_inputs_considered must be at least 1".to_string(),
            ));
        }
        if self.confirmation.max_attempts == 0 {
            return Err(Error::Config(
                "confirmation.max_attempts must be at least 1".to_string(),
            ));
        }
        let factor = self.confirmation.backoff_factor;
        if factor.is_nan() || factor < 1.0 {
            return Err(Error::Config(format!(
                "confirmation.backoff_factor must be >= 1.0, got {}",
                factor
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransferConfig::default();
        assert_eq!(config.network, Network::Testnet { magic: 2 });
        assert_eq!(config.ttl_slot_offset, 200);
        assert_eq!(config.max_inputs_considered, 20);
        assert_eq!(config.min_desired_inputs, 1);
        assert_eq!(config.potential_fee, 300_000);
        assert_eq!(config.confirmation.max_attempts, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = TransferConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TransferConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.network, config.network);
        assert_eq!(parsed.confirmation, config.confirmation);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let parsed: TransferConfig = serde_json::from_str(r#"{"network":"mainnet"}"#).unwrap();
        assert_eq!(parsed.network, Network::Mainnet);
        assert_eq!(parsed.max_inputs_considered, 20);
        assert_eq!(parsed.confirmation.delay_ms, 2_000);

        let provider: ProviderConfig =
            serde_json::from_str(r#"{"url":"http://localhost:3000"}"#).unwrap();
        assert_eq!(provider.request_timeout_secs, 30);
        assert!(provider.project_id.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let config = TransferConfig {
            max_inputs_considered: 0,
            ..TransferConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = TransferConfig::default();
        config.confirmation.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = TransferConfig::default();
        config.confirmation.backoff_factor = 0.5;
        assert!(config.validate().is_err());
    }
}
