//! Canonical strategy document: schema version 1.0.
//!
//! This is the wire/storage format handed to the persistence layer:
//!
//! ```text
//! { schema_version, meta{name,description}, indicators[{id,type,params}],
//!   entry{long{and:[Condition]}, short{and:[Condition]}}, exit?,
//!   stop_loss, reverse, hook }
//! Condition = { left: Operand, op, right: Operand }
//! Operand   = {ref} | {price} | {value}
//! ```
//!
//! `exit` is only present when the strategy defines exit conditions or an
//! ATR trailing stop. Each exit block carries `enabled: true` since the
//! backtest engine skips blocks without it. `meta` is display-only and never part of the hash.

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalError, CanonicalNumber, CanonicalValue, ToCanonical};
use crate::draft::{Operator, ParamValue, Params, PriceField, ReverseMode, ReverseRepr};

pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDocument {
    pub schema_version: String,
    pub meta: DocumentMeta,
    pub indicators: Vec<IndicatorSpec>,
    pub entry: EntrySpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitSpec>,
    pub stop_loss: StopLossSpec,
    pub reverse: ReverseSpec,
    pub hook: HookSpec,
}

/// Checks the top-level `schema_version` of a stored document before it is
/// hashed as raw JSON.
pub fn check_schema_version(value: &serde_json::Value) -> Result<(), CanonicalError> {
    let object = value.as_object().ok_or(CanonicalError::NotAnObject)?;
    match object.get("schema_version") {
        Some(serde_json::Value::String(found)) if found == SCHEMA_VERSION => Ok(()),
        Some(serde_json::Value::String(found)) => Err(CanonicalError::UnsupportedSchema {
            found: found.clone(),
            expected: SCHEMA_VERSION,
        }),
        other => Err(CanonicalError::UnsupportedSchema {
            found: other.map_or_else(|| "<missing>".to_string(), |v| v.to_string()),
            expected: SCHEMA_VERSION,
        }),
    }
}

impl StrategyDocument {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub indicator_type: String,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperandSpec {
    Ref {
        #[serde(rename = "ref")]
        reference: String,
    },
    Price {
        price: PriceField,
    },
    Value {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub left: OperandSpec,
    pub op: Operator,
    pub right: OperandSpec,
}

/// AND-combined condition list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub and: Vec<ConditionSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrySpec {
    pub long: ConditionGroup,
    pub short: ConditionGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator_based: Option<IndicatorExitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atr_trailing: Option<AtrTrailingSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorExitSpec {
    pub enabled: bool,
    pub long: ConditionGroup,
    pub short: ConditionGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrTrailingSpec {
    pub enabled: bool,
    pub atr_indicator_id: String,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopLossSpec {
    FixedPercent {
        percent: f64,
    },
    AtrBased {
        atr_indicator_id: String,
        multiplier: f64,
    },
    IndicatorLevel {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        long_ref: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        short_ref: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReverseRepr", into = "ReverseRepr")]
pub enum ReverseSpec {
    Disabled,
    Enabled { mode: ReverseMode },
}

impl TryFrom<ReverseRepr> for ReverseSpec {
    type Error = String;

    fn try_from(repr: ReverseRepr) -> Result<Self, Self::Error> {
        match (repr.enabled, repr.mode) {
            (false, _) => Ok(ReverseSpec::Disabled),
            (true, Some(mode)) => Ok(ReverseSpec::Enabled { mode }),
            (true, None) => Err("enabled reverse policy requires a mode".to_string()),
        }
    }
}

impl From<ReverseSpec> for ReverseRepr {
    fn from(spec: ReverseSpec) -> Self {
        match spec {
            ReverseSpec::Disabled => ReverseRepr {
                enabled: false,
                mode: None,
            },
            ReverseSpec::Enabled { mode } => ReverseRepr {
                enabled: true,
                mode: Some(mode),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSpec {
    pub enabled: bool,
}

// ─── Canonical lowering ──────────────────────────────────────────────

fn number(value: f64, path: &str) -> Result<CanonicalValue, CanonicalError> {
    CanonicalNumber::float(value, path).map(CanonicalValue::Number)
}

impl ToCanonical for ParamValue {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        match self {
            ParamValue::Bool(b) => Ok(CanonicalValue::Bool(*b)),
            ParamValue::Number(n) => number(*n, "params"),
            ParamValue::Text(s) => Ok(CanonicalValue::string(s.as_str())),
        }
    }
}

impl ToCanonical for Params {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        let entries = self
            .iter()
            .map(|(k, v)| Ok((k.to_string(), v.to_canonical()?)))
            .collect::<Result<Vec<_>, CanonicalError>>()?;
        CanonicalValue::object(entries)
    }
}

impl ToCanonical for DocumentMeta {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        CanonicalValue::object([
            ("name", self.name.to_canonical()?),
            ("description", self.description.to_canonical()?),
        ])
    }
}

impl ToCanonical for IndicatorSpec {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        CanonicalValue::object([
            ("id", self.id.to_canonical()?),
            ("type", self.indicator_type.to_canonical()?),
            ("params", self.params.to_canonical()?),
        ])
    }
}

impl ToCanonical for OperandSpec {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        match self {
            OperandSpec::Ref { reference } => CanonicalValue::object([("ref", reference.to_canonical()?)]),
            OperandSpec::Price { price } => {
                CanonicalValue::object([("price", CanonicalValue::string(price.as_str()))])
            }
            OperandSpec::Value { value } => CanonicalValue::object([("value", number(*value, "value")?)]),
        }
    }
}

impl ToCanonical for ConditionSpec {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        CanonicalValue::object([
            ("left", self.left.to_canonical()?),
            ("op", CanonicalValue::string(self.op.as_str())),
            ("right", self.right.to_canonical()?),
        ])
    }
}

impl ToCanonical for ConditionGroup {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        CanonicalValue::object([("and", self.and.to_canonical()?)])
    }
}

impl ToCanonical for EntrySpec {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        CanonicalValue::object([
            ("long", self.long.to_canonical()?),
            ("short", self.short.to_canonical()?),
        ])
    }
}

impl ToCanonical for IndicatorExitSpec {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        CanonicalValue::object([
            ("enabled", self.enabled.to_canonical()?),
            ("long", self.long.to_canonical()?),
            ("short", self.short.to_canonical()?),
        ])
    }
}

impl ToCanonical for AtrTrailingSpec {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        CanonicalValue::object([
            ("enabled", self.enabled.to_canonical()?),
            ("atr_indicator_id", self.atr_indicator_id.to_canonical()?),
            ("multiplier", number(self.multiplier, "exit.atr_trailing.multiplier")?),
        ])
    }
}

impl ToCanonical for ExitSpec {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        let mut entries = Vec::new();
        if let Some(indicator_based) = &self.indicator_based {
            entries.push(("indicator_based", indicator_based.to_canonical()?));
        }
        if let Some(atr_trailing) = &self.atr_trailing {
            entries.push(("atr_trailing", atr_trailing.to_canonical()?));
        }
        CanonicalValue::object(entries)
    }
}

impl ToCanonical for StopLossSpec {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        match self {
            StopLossSpec::FixedPercent { percent } => CanonicalValue::object([
                ("type", CanonicalValue::string("fixed_percent")),
                ("percent", number(*percent, "stop_loss.percent")?),
            ]),
            StopLossSpec::AtrBased {
                atr_indicator_id,
                multiplier,
            } => CanonicalValue::object([
                ("type", CanonicalValue::string("atr_based")),
                ("atr_indicator_id", atr_indicator_id.to_canonical()?),
                ("multiplier", number(*multiplier, "stop_loss.multiplier")?),
            ]),
            StopLossSpec::IndicatorLevel {
                long_ref,
                short_ref,
            } => {
                let mut entries = vec![("type", CanonicalValue::string("indicator_level"))];
                if let Some(r) = long_ref {
                    entries.push(("long_ref", r.to_canonical()?));
                }
                if let Some(r) = short_ref {
                    entries.push(("short_ref", r.to_canonical()?));
                }
                CanonicalValue::object(entries)
            }
        }
    }
}

impl ToCanonical for ReverseSpec {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        match self {
            ReverseSpec::Disabled => CanonicalValue::object([("enabled", CanonicalValue::Bool(false))]),
            ReverseSpec::Enabled { mode } => CanonicalValue::object([
                ("enabled", CanonicalValue::Bool(true)),
                ("mode", CanonicalValue::string(mode.as_str())),
            ]),
        }
    }
}

impl ToCanonical for HookSpec {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        CanonicalValue::object([("enabled", CanonicalValue::Bool(self.enabled))])
    }
}

impl ToCanonical for StrategyDocument {
    fn to_canonical(&self) -> Result<CanonicalValue, CanonicalError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(CanonicalError::UnsupportedSchema {
                found: self.schema_version.clone(),
                expected: SCHEMA_VERSION,
            });
        }
        let mut entries = vec![
            ("schema_version", self.schema_version.to_canonical()?),
            ("meta", self.meta.to_canonical()?),
            ("indicators", self.indicators.to_canonical()?),
            ("entry", self.entry.to_canonical()?),
            ("stop_loss", self.stop_loss.to_canonical()?),
            ("reverse", self.reverse.to_canonical()?),
            ("hook", self.hook.to_canonical()?),
        ];
        if let Some(exit) = &self.exit {
            entries.push(("exit", exit.to_canonical()?));
        }
        CanonicalValue::object(entries)
    }
}
