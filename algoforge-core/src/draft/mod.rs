//! Strategy draft: the mutable, editor-shaped representation of a strategy.
//!
//! Drafts serialize in the editor's JSON shape (camelCase keys, adjacently
//! tagged operands) and are never persisted directly. Only the canonical
//! document compiled from a validated draft, and its hash, leave this crate.

pub mod editor;
pub mod params;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use editor::{is_valid_indicator_id, DraftError};
pub use params::{ParamValue, Params};

/// Indicator type that ATR-based stop losses and trailing exits must reference.
pub const ATR_TYPE: &str = "atr";

// ─── Indicators ──────────────────────────────────────────────────────

/// An indicator instance in the draft. `id` is the only stable cross-reference key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDraft {
    pub id: String,
    #[serde(rename = "type")]
    pub indicator_type: String,
    #[serde(default)]
    pub params: Params,
}

impl IndicatorDraft {
    pub fn new(id: impl Into<String>, indicator_type: impl Into<String>, params: Params) -> Self {
        Self {
            id: id.into(),
            indicator_type: indicator_type.into(),
            params,
        }
    }
}

// ─── Conditions ──────────────────────────────────────────────────────

/// OHLCV field usable as a condition operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
        }
    }
}

/// One side of a comparison.
///
/// Serialized as `{"type": "indicator", "value": "ema_1"}`,
/// `{"type": "price", "value": "close"}` or `{"type": "number", "value": 50}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Operand {
    /// Indicator reference: `id` or `id.output_field`.
    Indicator(String),
    Price(PriceField),
    Number(f64),
}

impl Operand {
    pub fn indicator(id: impl Into<String>) -> Self {
        Operand::Indicator(id.into())
    }

    pub fn is_indicator(&self) -> bool {
        matches!(self, Operand::Indicator(_))
    }

    /// Indicator id this operand points at, with any `.field` suffix stripped.
    pub fn referenced_indicator(&self) -> Option<&str> {
        match self {
            Operand::Indicator(reference) => Some(indicator_id_of(reference)),
            _ => None,
        }
    }
}

/// Strip the `.output_field` suffix from an indicator reference.
pub fn indicator_id_of(reference: &str) -> &str {
    reference.split('.').next().unwrap_or(reference)
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "cross_above")]
    CrossAbove,
    #[serde(rename = "cross_below")]
    CrossBelow,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::CrossAbove => "cross_above",
            Operator::CrossBelow => "cross_below",
        }
    }

    /// Cross operators compare two series over consecutive bars.
    pub fn is_cross(self) -> bool {
        matches!(self, Operator::CrossAbove | Operator::CrossBelow)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single comparison. `temp_id` exists only for editor list rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionDraft {
    #[serde(default)]
    pub temp_id: String,
    pub left: Operand,
    pub operator: Operator,
    pub right: Operand,
}

impl ConditionDraft {
    pub fn new(left: Operand, operator: Operator, right: Operand) -> Self {
        Self {
            temp_id: editor::new_temp_id(),
            left,
            operator,
            right,
        }
    }

    /// Blank condition as the editor inserts it: two unset indicator refs and `>`.
    pub fn empty() -> Self {
        Self::new(Operand::indicator(""), Operator::Gt, Operand::indicator(""))
    }
}

/// Conditions for one direction, implicitly AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideDraft {
    #[serde(default)]
    pub conditions: Vec<ConditionDraft>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    #[serde(default)]
    pub long: SideDraft,
    #[serde(default)]
    pub short: SideDraft,
}

impl EntryDraft {
    pub fn is_empty(&self) -> bool {
        self.long.conditions.is_empty() && self.short.conditions.is_empty()
    }
}

// ─── Exit ────────────────────────────────────────────────────────────

/// Indicator-based exit: close when the side's conditions all hold.
///
/// The editor keeps conditions around while the block is toggled off; only an
/// enabled block reaches the compiled document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorExitDraft {
    pub enabled: bool,
    pub long: SideDraft,
    pub short: SideDraft,
}

impl IndicatorExitDraft {
    pub fn has_conditions(&self) -> bool {
        !self.long.conditions.is_empty() || !self.short.conditions.is_empty()
    }
}

/// ATR trailing stop: LONG `max(SL, close - k*ATR)`, SHORT `min(SL, close + k*ATR)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtrTrailingDraft {
    pub enabled: bool,
    pub atr_indicator_id: String,
    pub multiplier: f64,
}

impl Default for AtrTrailingDraft {
    fn default() -> Self {
        Self {
            enabled: false,
            atr_indicator_id: String::new(),
            multiplier: 2.0,
        }
    }
}

/// Serialized as `{"indicatorBased": {...}, "atrTrailing": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ExitDraft {
    pub indicator_based: IndicatorExitDraft,
    pub atr_trailing: AtrTrailingDraft,
}

impl ExitDraft {
    /// An enabled indicator-based block with at least one condition.
    pub fn has_indicator_exit(&self) -> bool {
        self.indicator_based.enabled && self.indicator_based.has_conditions()
    }

    /// True when the exit contributes anything to the compiled document.
    pub fn is_configured(&self) -> bool {
        self.indicator_based.enabled || self.atr_trailing.enabled
    }
}

// ─── Stop loss / reverse / hook ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopLossDraft {
    FixedPercent {
        percent: f64,
    },
    AtrBased {
        atr_indicator_id: String,
        multiplier: f64,
    },
    /// The referenced indicator's value is the stop price itself.
    IndicatorLevel {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        long_ref: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        short_ref: Option<String>,
    },
}

impl Default for StopLossDraft {
    fn default() -> Self {
        StopLossDraft::FixedPercent { percent: 2.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverseMode {
    /// Flip on the opposite side's entry signal.
    UseEntryOpposite,
}

impl ReverseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReverseMode::UseEntryOpposite => "use_entry_opposite",
        }
    }
}

/// Serialized as `{"enabled": false}` or `{"enabled": true, "mode": "..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReverseRepr", into = "ReverseRepr")]
pub enum ReverseDraft {
    Disabled,
    Enabled(ReverseMode),
}

impl Default for ReverseDraft {
    fn default() -> Self {
        ReverseDraft::Enabled(ReverseMode::UseEntryOpposite)
    }
}

/// Wire shape shared by [`ReverseDraft`] and the document's reverse policy.
#[doc(hidden)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReverseRepr {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ReverseMode>,
}

impl TryFrom<ReverseRepr> for ReverseDraft {
    type Error = String;

    fn try_from(repr: ReverseRepr) -> Result<Self, Self::Error> {
        match (repr.enabled, repr.mode) {
            (false, _) => Ok(ReverseDraft::Disabled),
            (true, Some(mode)) => Ok(ReverseDraft::Enabled(mode)),
            (true, None) => Err("enabled reverse policy requires a mode".to_string()),
        }
    }
}

impl From<ReverseDraft> for ReverseRepr {
    fn from(draft: ReverseDraft) -> Self {
        match draft {
            ReverseDraft::Disabled => ReverseRepr {
                enabled: false,
                mode: None,
            },
            ReverseDraft::Enabled(mode) => ReverseRepr {
                enabled: true,
                mode: Some(mode),
            },
        }
    }
}

/// Reserved entry-filter hook. Round-trips but has no effect yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDraft {
    pub enabled: bool,
}

// ─── Strategy ────────────────────────────────────────────────────────

/// The whole in-progress strategy.
///
/// `name` and `description` are display metadata: they travel into the
/// document's `meta` block but never into the strategy hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub indicators: Vec<IndicatorDraft>,
    #[serde(default)]
    pub entry: EntryDraft,
    #[serde(default)]
    pub exit: ExitDraft,
    #[serde(default)]
    pub stop_loss: StopLossDraft,
    #[serde(default)]
    pub reverse: ReverseDraft,
    #[serde(default)]
    pub hook: HookDraft,
}

impl StrategyDraft {
    /// A fresh draft with the editor defaults: 2% fixed stop, reverse on, hook off.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            indicators: Vec::new(),
            entry: EntryDraft::default(),
            exit: ExitDraft::default(),
            stop_loss: StopLossDraft::default(),
            reverse: ReverseDraft::default(),
            hook: HookDraft::default(),
        }
    }

    pub fn indicator(&self, id: &str) -> Option<&IndicatorDraft> {
        self.indicators.iter().find(|i| i.id == id)
    }

    pub fn has_indicator(&self, id: &str) -> bool {
        self.indicator(id).is_some()
    }
}

impl Default for StrategyDraft {
    fn default() -> Self {
        Self::empty()
    }
}
