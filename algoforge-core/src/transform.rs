//! Draft → canonical document transformation.
//!
//! The transformer only accepts drafts that pass [`validate_draft`]. An
//! invalid draft is a caller contract violation and is reported as
//! [`TransformError::InvalidDraft`]; no partial document is ever produced.
//!
//! Indicator order, condition order and param insertion order are carried
//! through verbatim. Key ordering is the canonicalizer's job.

use tracing::{debug, warn};

use crate::document::{
    AtrTrailingSpec, ConditionGroup, ConditionSpec, DocumentMeta, EntrySpec, ExitSpec, HookSpec,
    IndicatorExitSpec, IndicatorSpec, OperandSpec, ReverseSpec, StopLossSpec, StrategyDocument,
    SCHEMA_VERSION,
};
use crate::draft::{
    ConditionDraft, ExitDraft, IndicatorDraft, Operand, ReverseDraft, SideDraft, StopLossDraft,
    StrategyDraft,
};
use crate::validate::{validate_draft, ValidationResult};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("draft failed validation with {} error(s)", .0.errors.len())]
    InvalidDraft(ValidationResult),
}

/// Transform a draft into its canonical document, gating on validation first.
pub fn transform(draft: &StrategyDraft) -> Result<StrategyDocument, TransformError> {
    let validation = validate_draft(draft);
    if !validation.is_valid {
        warn!(
            errors = validation.errors.len(),
            "refusing to transform invalid draft"
        );
        return Err(TransformError::InvalidDraft(validation));
    }
    let document = lower_draft(draft);
    debug!(
        indicators = document.indicators.len(),
        long = document.entry.long.and.len(),
        short = document.entry.short.and.len(),
        "transformed draft"
    );
    Ok(document)
}

/// Structural mapping of an already-validated draft.
fn lower_draft(draft: &StrategyDraft) -> StrategyDocument {
    StrategyDocument {
        schema_version: SCHEMA_VERSION.to_string(),
        meta: DocumentMeta {
            name: draft.name.clone(),
            description: draft.description.clone(),
        },
        indicators: draft.indicators.iter().map(lower_indicator).collect(),
        entry: EntrySpec {
            long: lower_side(&draft.entry.long),
            short: lower_side(&draft.entry.short),
        },
        exit: lower_exit(&draft.exit),
        stop_loss: lower_stop_loss(&draft.stop_loss),
        reverse: match draft.reverse {
            ReverseDraft::Disabled => ReverseSpec::Disabled,
            ReverseDraft::Enabled(mode) => ReverseSpec::Enabled { mode },
        },
        hook: HookSpec {
            enabled: draft.hook.enabled,
        },
    }
}

fn lower_indicator(indicator: &IndicatorDraft) -> IndicatorSpec {
    IndicatorSpec {
        id: indicator.id.clone(),
        indicator_type: indicator.indicator_type.clone(),
        params: indicator.params.clone(),
    }
}

fn lower_side(side: &SideDraft) -> ConditionGroup {
    ConditionGroup {
        and: side.conditions.iter().map(lower_condition).collect(),
    }
}

fn lower_condition(condition: &ConditionDraft) -> ConditionSpec {
    ConditionSpec {
        left: lower_operand(&condition.left),
        op: condition.operator,
        right: lower_operand(&condition.right),
    }
}

fn lower_operand(operand: &Operand) -> OperandSpec {
    match operand {
        Operand::Indicator(reference) => OperandSpec::Ref {
            reference: reference.clone(),
        },
        Operand::Price(price) => OperandSpec::Price { price: *price },
        Operand::Number(value) => OperandSpec::Value { value: *value },
    }
}

fn lower_exit(exit: &ExitDraft) -> Option<ExitSpec> {
    if !exit.is_configured() {
        return None;
    }
    let indicator_based = exit.has_indicator_exit().then(|| IndicatorExitSpec {
        enabled: true,
        long: lower_side(&exit.indicator_based.long),
        short: lower_side(&exit.indicator_based.short),
    });
    let atr_trailing = exit.atr_trailing.enabled.then(|| AtrTrailingSpec {
        enabled: true,
        atr_indicator_id: exit.atr_trailing.atr_indicator_id.clone(),
        multiplier: exit.atr_trailing.multiplier,
    });
    Some(ExitSpec {
        indicator_based,
        atr_trailing,
    })
}

fn lower_stop_loss(stop_loss: &StopLossDraft) -> StopLossSpec {
    match stop_loss {
        StopLossDraft::FixedPercent { percent } => StopLossSpec::FixedPercent { percent: *percent },
        StopLossDraft::AtrBased {
            atr_indicator_id,
            multiplier,
        } => StopLossSpec::AtrBased {
            atr_indicator_id: atr_indicator_id.clone(),
            multiplier: *multiplier,
        },
        StopLossDraft::IndicatorLevel {
            long_ref,
            short_ref,
        } => StopLossSpec::IndicatorLevel {
            long_ref: non_empty(long_ref),
            short_ref: non_empty(short_ref),
        },
    }
}

/// Blank refs are dropped so `Some("")` and `None` compile identically.
fn non_empty(reference: &Option<String>) -> Option<String> {
    reference
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
