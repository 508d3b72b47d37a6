//! Configuration management.
//!
//! Settings load from TOML with environment-variable overrides
//! (`RTB_EXCHANGE__AUCTION__TIMEOUT_MS=500` style) and deserialize into
//! plain structs; every field has a default so an empty document is a valid
//! configuration.

use std::collections::HashMap;

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::Deserialize;
use validator::Validate;

use crate::auction::config::AuctionConfig;
use crate::currency::RateTable;
use crate::error::ExchangeError;

/// Top-level settings for an exchange host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub auction: AuctionConfig,
    #[serde(default)]
    pub currency: CurrencySettings,
}

/// Seed currency configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrencySettings {
    /// Conversion-rate seed table, `from -> to -> rate`. Hosts typically
    /// replace it at runtime with a snapshot refreshed out-of-band.
    #[serde(default)]
    pub rates: HashMap<String, HashMap<String, f64>>,
}

impl Settings {
    /// Load settings from a TOML document plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the document fails to parse or the
    /// auction section fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<ExchangeError>> {
        let environment = Environment::default().prefix("RTB_EXCHANGE").separator("__");

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(ExchangeError::Configuration {
                message: "failed to build configuration".to_string(),
            })?;

        let settings: Settings =
            config
                .try_deserialize()
                .change_context(ExchangeError::Configuration {
                    message: "failed to deserialize configuration".to_string(),
                })?;

        settings
            .auction
            .validate()
            .change_context(ExchangeError::Configuration {
                message: "auction settings failed validation".to_string(),
            })?;

        Ok(settings)
    }

    /// The seed rate table as an immutable snapshot.
    #[must_use]
    pub fn rate_table(&self) -> RateTable {
        RateTable::new(self.currency.rates.clone())
    }
}
