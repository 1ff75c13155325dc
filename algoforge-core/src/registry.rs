//! Indicator registry: metadata for the indicator types the editor offers.
//!
//! The registry supplies default params and output field names for menus and
//! for [`StrategyDraft::add_indicator_of_type`](crate::draft::StrategyDraft::add_indicator_of_type).
//! Validation and compilation never consult it: indicator references resolve
//! against the draft's own indicator list only.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::draft::Params;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read indicator file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse indicator definitions: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("indicator '{0}' declares no output fields")]
    NoOutputs(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorCategory {
    Trend,
    Momentum,
    Volatility,
    Volume,
}

/// Metadata for one indicator type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorMeta {
    #[serde(rename = "type")]
    pub indicator_type: String,
    pub name: String,
    pub category: IndicatorCategory,
    #[serde(default)]
    pub default_params: Params,
    pub output_fields: Vec<String>,
}

impl IndicatorMeta {
    fn builtin(
        indicator_type: &str,
        name: &str,
        category: IndicatorCategory,
        default_params: Params,
    ) -> Self {
        Self {
            indicator_type: indicator_type.to_string(),
            name: name.to_string(),
            category,
            default_params,
            output_fields: vec!["main".to_string()],
        }
    }
}

/// TOML file layout: a list of `[[indicator]]` tables.
#[derive(Debug, Deserialize)]
struct IndicatorFile {
    #[serde(default)]
    indicator: Vec<IndicatorMeta>,
}

/// Lookup table keyed by indicator type. Iterates in type-name order.
#[derive(Debug, Clone, Default)]
pub struct IndicatorRegistry {
    entries: BTreeMap<String, IndicatorMeta>,
}

impl IndicatorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in catalog: EMA, SMA, RSI, ATR.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for meta in [
            IndicatorMeta::builtin(
                "ema",
                "EMA (Exponential Moving Average)",
                IndicatorCategory::Trend,
                Params::new().with("source", "close").with("period", 20),
            ),
            IndicatorMeta::builtin(
                "sma",
                "SMA (Simple Moving Average)",
                IndicatorCategory::Trend,
                Params::new().with("source", "close").with("period", 50),
            ),
            IndicatorMeta::builtin(
                "rsi",
                "RSI (Relative Strength Index)",
                IndicatorCategory::Momentum,
                Params::new().with("source", "close").with("period", 14),
            ),
            IndicatorMeta::builtin(
                "atr",
                "ATR (Average True Range)",
                IndicatorCategory::Volatility,
                Params::new().with("period", 14),
            ),
        ] {
            registry.entries.insert(meta.indicator_type.clone(), meta);
        }
        registry
    }

    /// Parse custom indicator definitions from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, RegistryError> {
        let file: IndicatorFile = toml::from_str(content)?;
        let mut registry = Self::empty();
        for meta in file.indicator {
            if meta.output_fields.is_empty() {
                return Err(RegistryError::NoOutputs(meta.indicator_type));
            }
            registry.entries.insert(meta.indicator_type.clone(), meta);
        }
        Ok(registry)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Merge `other` into `self`; entries in `other` win on type collisions.
    pub fn merge(&mut self, other: IndicatorRegistry) {
        self.entries.extend(other.entries);
    }

    pub fn insert(&mut self, meta: IndicatorMeta) -> Option<IndicatorMeta> {
        self.entries.insert(meta.indicator_type.clone(), meta)
    }

    pub fn get(&self, indicator_type: &str) -> Option<&IndicatorMeta> {
        self.entries.get(indicator_type)
    }

    pub fn output_fields(&self, indicator_type: &str) -> Option<&[String]> {
        self.get(indicator_type).map(|m| m.output_fields.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndicatorMeta> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::ParamValue;

    const CUSTOM: &str = r#"
        [[indicator]]
        type = "macd"
        name = "MACD"
        category = "momentum"
        output_fields = ["main", "signal", "histogram"]
        default_params = { fast_period = 12, slow_period = 26, signal_period = 9 }

        [[indicator]]
        type = "ema"
        name = "Custom EMA"
        category = "trend"
        output_fields = ["main"]
        default_params = { source = "hl2", period = 10 }
    "#;

    #[test]
    fn builtin_catalog() {
        let registry = IndicatorRegistry::builtin();
        let types: Vec<_> = registry.iter().map(|m| m.indicator_type.as_str()).collect();
        assert_eq!(types, vec!["atr", "ema", "rsi", "sma"]);
        assert_eq!(registry.output_fields("atr"), Some(&["main".to_string()][..]));
        assert_eq!(
            registry.get("sma").unwrap().default_params.get("period"),
            Some(&ParamValue::Number(50.0))
        );
    }

    #[test]
    fn custom_entries_override_builtins() {
        let mut registry = IndicatorRegistry::builtin();
        registry.merge(IndicatorRegistry::from_toml_str(CUSTOM).unwrap());

        assert_eq!(registry.len(), 5);
        assert_eq!(registry.get("ema").unwrap().name, "Custom EMA");
        assert_eq!(registry.output_fields("macd").unwrap().len(), 3);
        assert_eq!(
            registry.get("macd").unwrap().category,
            IndicatorCategory::Momentum
        );
    }

    #[test]
    fn entry_without_outputs_is_rejected() {
        let toml = r#"
            [[indicator]]
            type = "blank"
            name = "Blank"
            category = "trend"
            output_fields = []
        "#;
        assert!(matches!(
            IndicatorRegistry::from_toml_str(toml),
            Err(RegistryError::NoOutputs(t)) if t == "blank"
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indicators.toml");
        std::fs::write(&path, CUSTOM).unwrap();
        let registry = IndicatorRegistry::from_toml_file(&path).unwrap();
        assert!(registry.get("macd").is_some());

        let missing = IndicatorRegistry::from_toml_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(RegistryError::Io { .. })));
    }
}
