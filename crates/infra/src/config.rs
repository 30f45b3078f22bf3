//! Runtime configuration of the fulfillment stack.
//!
//! Defaults are compiled in; a JSON file may override them, and `SLABTRACE_*`
//! environment variables override both.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use slabtrace_fulfillment::GuardSettings;
use slabtrace_inventory::{LocationUsage, LotNaming};
use slabtrace_sales::SaleLineSettings;

pub const ENV_LOT_SEQUENCE_PREFIX: &str = "SLABTRACE_LOT_SEQUENCE_PREFIX";
pub const ENV_LOT_SEQUENCE_PADDING: &str = "SLABTRACE_LOT_SEQUENCE_PADDING";
pub const ENV_GUARD_LOCATION_USAGES: &str = "SLABTRACE_GUARD_LOCATION_USAGES";
pub const ENV_SALE_CUSTOMS_USAGES: &str = "SLABTRACE_SALE_CUSTOMS_USAGES";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("lot sequence padding must be between 1 and 12 (got {0})")]
    Padding(usize),

    #[error("{0} must name at least one location usage")]
    EmptyUsages(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FulfillmentConfig {
    pub lot_sequence_prefix: String,
    pub lot_sequence_padding: usize,
    /// Locations whose quants supply the customs number the guard expects.
    pub guard_location_usages: Vec<LocationUsage>,
    /// Locations whose quants supply the customs number of a selected lot.
    pub sale_customs_usages: Vec<LocationUsage>,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        let naming = LotNaming::default();
        Self {
            lot_sequence_prefix: naming.code_prefix,
            lot_sequence_padding: naming.padding,
            guard_location_usages: GuardSettings::default().customs_usages,
            sale_customs_usages: SaleLineSettings::default().customs_usages,
        }
    }
}

impl FulfillmentConfig {
    /// Defaults plus process environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Read a JSON file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fulfillment config {}", path.display()))?;
        let config = Self::from_json(&raw)
            .with_context(|| format!("parsing fulfillment config {}", path.display()))?;
        let config = config
            .with_overrides(|key| std::env::var(key).ok())
            .context("applying environment overrides")?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up by variable name. Unset or blank variables
    /// leave the current value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(prefix) = lookup(ENV_LOT_SEQUENCE_PREFIX) {
            self.lot_sequence_prefix = prefix.trim().to_string();
        }
        if let Some(padding) = lookup(ENV_LOT_SEQUENCE_PADDING) {
            self.lot_sequence_padding =
                padding
                    .trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: ENV_LOT_SEQUENCE_PADDING,
                        reason: e.to_string(),
                    })?;
        }
        if let Some(usages) = lookup(ENV_GUARD_LOCATION_USAGES) {
            self.guard_location_usages = parse_usages(ENV_GUARD_LOCATION_USAGES, &usages)?;
        }
        if let Some(usages) = lookup(ENV_SALE_CUSTOMS_USAGES) {
            self.sale_customs_usages = parse_usages(ENV_SALE_CUSTOMS_USAGES, &usages)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=12).contains(&self.lot_sequence_padding) {
            return Err(ConfigError::Padding(self.lot_sequence_padding));
        }
        if self.guard_location_usages.is_empty() {
            return Err(ConfigError::EmptyUsages("guard_location_usages"));
        }
        if self.sale_customs_usages.is_empty() {
            return Err(ConfigError::EmptyUsages("sale_customs_usages"));
        }
        Ok(())
    }

    pub fn lot_naming(&self) -> LotNaming {
        LotNaming {
            code_prefix: self.lot_sequence_prefix.clone(),
            padding: self.lot_sequence_padding,
        }
    }

    pub fn guard_settings(&self) -> GuardSettings {
        GuardSettings {
            customs_usages: self.guard_location_usages.clone(),
        }
    }

    pub fn sale_settings(&self) -> SaleLineSettings {
        SaleLineSettings {
            customs_usages: self.sale_customs_usages.clone(),
        }
    }
}

fn parse_usages(key: &'static str, raw: &str) -> Result<Vec<LocationUsage>, ConfigError> {
    let mut usages = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let usage: LocationUsage = part.parse().map_err(|e: slabtrace_core::DomainError| {
            ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
            }
        })?;
        if !usages.contains(&usage) {
            usages.push(usage);
        }
    }
    if usages.is_empty() {
        return Err(ConfigError::EmptyUsages(key));
    }
    Ok(usages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_component_defaults() {
        let config = FulfillmentConfig::default();
        assert_eq!(config.lot_naming(), LotNaming::default());
        assert_eq!(config.guard_settings(), GuardSettings::default());
        assert_eq!(config.sale_settings(), SaleLineSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn environment_overrides_every_field() {
        let config = FulfillmentConfig::default()
            .with_overrides(env(&[
                (ENV_LOT_SEQUENCE_PREFIX, "slab.lot."),
                (ENV_LOT_SEQUENCE_PADDING, "4"),
                (ENV_GUARD_LOCATION_USAGES, "internal, transit"),
                (ENV_SALE_CUSTOMS_USAGES, "Internal"),
            ]))
            .unwrap();

        assert_eq!(config.lot_naming().sequence_code("UYI"), "slab.lot.UYI");
        assert_eq!(config.lot_naming().sequence_definition("UYI").render(7), "UYI-0007");
        assert_eq!(
            config.guard_settings().customs_usages,
            vec![LocationUsage::Internal, LocationUsage::Transit]
        );
        assert_eq!(config.sale_settings().customs_usages, vec![LocationUsage::Internal]);
    }

    #[test]
    fn blank_variables_are_ignored() {
        let config = FulfillmentConfig::default()
            .with_overrides(env(&[(ENV_LOT_SEQUENCE_PADDING, "  ")]))
            .unwrap();
        assert_eq!(config, FulfillmentConfig::default());
    }

    #[test]
    fn bad_padding_is_rejected() {
        let err = FulfillmentConfig::default()
            .with_overrides(env(&[(ENV_LOT_SEQUENCE_PADDING, "three")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, ENV_LOT_SEQUENCE_PADDING),
            _ => panic!("Expected InvalidValue error"),
        }

        let err = FulfillmentConfig::default()
            .with_overrides(env(&[(ENV_LOT_SEQUENCE_PADDING, "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Padding(0));
    }

    #[test]
    fn unknown_usage_is_rejected() {
        let err = FulfillmentConfig::default()
            .with_overrides(env(&[(ENV_GUARD_LOCATION_USAGES, "internal,warehouse")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, reason } => {
                assert_eq!(key, ENV_GUARD_LOCATION_USAGES);
                assert!(reason.contains("warehouse"));
            }
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = FulfillmentConfig::from_json(r#"{ "lot_sequence_padding": 5 }"#).unwrap();
        assert_eq!(config.lot_sequence_padding, 5);
        assert_eq!(config.lot_sequence_prefix, "lot.serial.");
        assert_eq!(config.sale_customs_usages, SaleLineSettings::default().customs_usages);
    }

    #[test]
    fn json_with_empty_usages_is_rejected() {
        let err = FulfillmentConfig::from_json(r#"{ "guard_location_usages": [] }"#).unwrap_err();
        assert!(err.to_string().contains("guard_location_usages"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FulfillmentConfig::load("/nonexistent/slabtrace.json").unwrap_err();
        assert!(format!("{err:#}").contains("reading fulfillment config"));
    }
}
