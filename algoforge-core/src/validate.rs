//! Draft validation: the business-rule gate in front of compilation.
//!
//! `validate_draft` is an accumulator: every rule group runs and all
//! violations are collected, so an editor can show the complete list after a
//! single call. It never mutates the draft and never fails.
//!
//! Field names consumers key off: `name`, `indicators`, `entry`, `exit`,
//! `stopLoss`. Condition-level errors use positional fields such as
//! `entry.long.conditions[0]` or `exit.indicatorBased.short.conditions[1]`
//! and mention "left operand" / "right operand".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::draft::{ConditionDraft, Operand, SideDraft, StopLossDraft, StrategyDraft, ATR_TYPE};

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a draft: `is_valid == errors.is_empty()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn messages_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.errors
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

/// Validate a draft against every rule group.
pub fn validate_draft(draft: &StrategyDraft) -> ValidationResult {
    let mut errors = Vec::new();
    let known: HashSet<&str> = draft.indicators.iter().map(|i| i.id.as_str()).collect();

    check_name(draft, &mut errors);
    check_indicators(draft, &mut errors);
    check_entry(draft, &known, &mut errors);
    check_exit(draft, &known, &mut errors);
    check_stop_loss(draft, &known, &mut errors);

    ValidationResult::from_errors(errors)
}

fn check_name(draft: &StrategyDraft, errors: &mut Vec<ValidationError>) {
    if draft.name.trim().is_empty() {
        errors.push(ValidationError::new("name", "strategy name is required"));
    }
}

fn check_indicators(draft: &StrategyDraft, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for (i, indicator) in draft.indicators.iter().enumerate() {
        if indicator.id.trim().is_empty() {
            errors.push(ValidationError::new(
                "indicators",
                format!("indicator #{} has an empty id", i + 1),
            ));
            continue;
        }
        if !seen.insert(indicator.id.as_str()) && reported.insert(indicator.id.as_str()) {
            errors.push(ValidationError::new(
                "indicators",
                format!("duplicate indicator id '{}'", indicator.id),
            ));
        }
    }
}

fn check_entry(draft: &StrategyDraft, known: &HashSet<&str>, errors: &mut Vec<ValidationError>) {
    if draft.entry.is_empty() {
        errors.push(ValidationError::new(
            "entry",
            "at least 1 entry condition (long or short) is required",
        ));
    }
    check_side("entry.long", &draft.entry.long, known, errors);
    check_side("entry.short", &draft.entry.short, known, errors);
}

fn check_exit(draft: &StrategyDraft, known: &HashSet<&str>, errors: &mut Vec<ValidationError>) {
    let indicator_based = &draft.exit.indicator_based;
    if indicator_based.enabled {
        if !indicator_based.has_conditions() {
            errors.push(ValidationError::new(
                "exit",
                "indicator-based exit is enabled but has no conditions",
            ));
        }
        check_side("exit.indicatorBased.long", &indicator_based.long, known, errors);
        check_side("exit.indicatorBased.short", &indicator_based.short, known, errors);
    }

    let trailing = &draft.exit.atr_trailing;
    if trailing.enabled {
        if !references_atr(draft, &trailing.atr_indicator_id) {
            errors.push(ValidationError::new(
                "exit",
                atr_reference_message("ATR trailing", &trailing.atr_indicator_id),
            ));
        }
        if !is_positive(trailing.multiplier) {
            errors.push(ValidationError::new(
                "exit",
                "ATR trailing multiplier must be a positive number",
            ));
        }
    }
}

fn check_side(
    prefix: &str,
    side: &SideDraft,
    known: &HashSet<&str>,
    errors: &mut Vec<ValidationError>,
) {
    for (i, condition) in side.conditions.iter().enumerate() {
        let field = format!("{prefix}.conditions[{i}]");
        check_condition(&field, condition, known, errors);
    }
}

fn check_condition(
    field: &str,
    condition: &ConditionDraft,
    known: &HashSet<&str>,
    errors: &mut Vec<ValidationError>,
) {
    check_operand(field, "left operand", &condition.left, known, errors);
    check_operand(field, "right operand", &condition.right, known, errors);

    if condition.operator.is_cross()
        && !(condition.left.is_indicator() && condition.right.is_indicator())
    {
        errors.push(ValidationError::new(
            field,
            format!(
                "{} (cross operator) requires both operands to be indicators",
                condition.operator
            ),
        ));
    }
}

fn check_operand(
    field: &str,
    side: &str,
    operand: &Operand,
    known: &HashSet<&str>,
    errors: &mut Vec<ValidationError>,
) {
    match operand {
        Operand::Indicator(reference) if reference.trim().is_empty() => {
            errors.push(ValidationError::new(field, format!("{side} is empty")));
        }
        Operand::Indicator(_) => {
            if let Some(id) = operand.referenced_indicator() {
                if !known.contains(id) {
                    errors.push(ValidationError::new(
                        field,
                        format!("{side} references unknown indicator '{id}'"),
                    ));
                }
            }
        }
        Operand::Number(value) if !value.is_finite() => {
            errors.push(ValidationError::new(
                field,
                format!("{side} must be a finite number"),
            ));
        }
        Operand::Number(_) | Operand::Price(_) => {}
    }
}

fn check_stop_loss(draft: &StrategyDraft, known: &HashSet<&str>, errors: &mut Vec<ValidationError>) {
    match &draft.stop_loss {
        StopLossDraft::FixedPercent { percent } => {
            if !is_positive(*percent) {
                errors.push(ValidationError::new(
                    "stopLoss",
                    "stop loss percent must be a positive number",
                ));
            }
        }
        StopLossDraft::AtrBased {
            atr_indicator_id,
            multiplier,
        } => {
            if !references_atr(draft, atr_indicator_id) {
                errors.push(ValidationError::new(
                    "stopLoss",
                    atr_reference_message("ATR-based stop loss", atr_indicator_id),
                ));
            }
            if !is_positive(*multiplier) {
                errors.push(ValidationError::new(
                    "stopLoss",
                    "ATR multiplier must be a positive number",
                ));
            }
        }
        StopLossDraft::IndicatorLevel {
            long_ref,
            short_ref,
        } => {
            let refs = [("long", long_ref), ("short", short_ref)];
            if refs.iter().all(|(_, r)| r.as_deref().map_or(true, |s| s.trim().is_empty())) {
                errors.push(ValidationError::new(
                    "stopLoss",
                    "indicator level stop loss needs a long or short indicator reference",
                ));
            }
            for (direction, reference) in refs {
                let Some(reference) = reference.as_deref().filter(|s| !s.trim().is_empty()) else {
                    continue;
                };
                let id = crate::draft::indicator_id_of(reference);
                if !known.contains(id) {
                    errors.push(ValidationError::new(
                        "stopLoss",
                        format!("{direction} stop level references unknown indicator '{id}'"),
                    ));
                }
            }
        }
    }
}

/// `id` (or `id.field`) names an indicator of type `atr` in this draft.
fn references_atr(draft: &StrategyDraft, reference: &str) -> bool {
    draft
        .indicator(crate::draft::indicator_id_of(reference))
        .is_some_and(|i| i.indicator_type == ATR_TYPE)
}

fn atr_reference_message(what: &str, id: &str) -> String {
    if id.trim().is_empty() {
        format!("{what} requires an ATR indicator")
    } else {
        format!("{what} requires an ATR indicator; '{id}' is not an ATR indicator in this strategy")
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
