//! In-place editing operations on a [`StrategyDraft`].
//!
//! These mirror what the guided editor does: add/update/remove indicators by
//! id, auto-number new indicators, and rename an id while rewriting every
//! reference to it.

use tracing::debug;

use super::{indicator_id_of, ConditionDraft, IndicatorDraft, Operand, ParamValue, StopLossDraft, StrategyDraft};
use crate::registry::IndicatorRegistry;

/// Errors from editor operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),
    #[error("Indicator id already in use: {0}")]
    DuplicateId(String),
    #[error("Invalid indicator id '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },
    #[error("Unknown indicator type: {0}")]
    UnknownType(String),
}

/// Random id for a new condition row.
pub(crate) fn new_temp_id() -> String {
    format!("cond_{:016x}", rand::random::<u64>())
}

/// Check an indicator id against the editor's naming rules.
///
/// Ids are ASCII letters, digits and `_`; they may not start with a digit and
/// may not start, end, or repeat `_`.
pub fn check_indicator_id(id: &str) -> Result<(), DraftError> {
    let invalid = |reason| {
        Err(DraftError::InvalidId {
            id: id.to_string(),
            reason,
        })
    };
    if id.trim().is_empty() {
        return invalid("id is required");
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return invalid("only ASCII letters, digits and '_' are allowed");
    }
    if id.starts_with(|c: char| c.is_ascii_digit()) {
        return invalid("id cannot start with a digit");
    }
    if id.starts_with('_') || id.ends_with('_') {
        return invalid("id cannot start or end with '_'");
    }
    if id.contains("__") {
        return invalid("id cannot contain '__'");
    }
    Ok(())
}

pub fn is_valid_indicator_id(id: &str) -> bool {
    check_indicator_id(id).is_ok()
}

impl StrategyDraft {
    /// Append an indicator. Ids must be unique within the draft.
    pub fn add_indicator(&mut self, indicator: IndicatorDraft) -> Result<(), DraftError> {
        if self.has_indicator(&indicator.id) {
            return Err(DraftError::DuplicateId(indicator.id));
        }
        self.indicators.push(indicator);
        Ok(())
    }

    /// Add an indicator of a registered type with default params and an
    /// auto-generated `{type}_{n}` id. Returns the new id.
    pub fn add_indicator_of_type(
        &mut self,
        registry: &IndicatorRegistry,
        indicator_type: &str,
    ) -> Result<String, DraftError> {
        let meta = registry
            .get(indicator_type)
            .ok_or_else(|| DraftError::UnknownType(indicator_type.to_string()))?;

        let mut n = self
            .indicators
            .iter()
            .filter(|i| i.indicator_type == indicator_type)
            .count()
            + 1;
        let mut id = format!("{indicator_type}_{n}");
        while self.has_indicator(&id) {
            n += 1;
            id = format!("{indicator_type}_{n}");
        }

        debug!(id = %id, indicator_type, "adding indicator");
        self.indicators.push(IndicatorDraft::new(
            id.clone(),
            indicator_type,
            meta.default_params.clone(),
        ));
        Ok(id)
    }

    /// Replace the indicator with `id`, keeping its position in the list.
    pub fn update_indicator(&mut self, id: &str, updated: IndicatorDraft) -> Result<(), DraftError> {
        if updated.id != id && self.has_indicator(&updated.id) {
            return Err(DraftError::DuplicateId(updated.id));
        }
        let slot = self
            .indicators
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| DraftError::UnknownIndicator(id.to_string()))?;
        *slot = updated;
        Ok(())
    }

    /// Set a single param on an indicator.
    pub fn set_param(
        &mut self,
        id: &str,
        key: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), DraftError> {
        let indicator = self
            .indicators
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| DraftError::UnknownIndicator(id.to_string()))?;
        indicator.params.set(key, value);
        Ok(())
    }

    /// Remove an indicator. References to it are left for the validator to report.
    pub fn remove_indicator(&mut self, id: &str) -> Result<IndicatorDraft, DraftError> {
        let pos = self
            .indicators
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| DraftError::UnknownIndicator(id.to_string()))?;
        Ok(self.indicators.remove(pos))
    }

    /// Rename an indicator and rewrite every reference to it.
    pub fn rename_indicator(&mut self, old_id: &str, new_id: &str) -> Result<(), DraftError> {
        if old_id == new_id {
            return if self.has_indicator(old_id) {
                Ok(())
            } else {
                Err(DraftError::UnknownIndicator(old_id.to_string()))
            };
        }
        check_indicator_id(new_id)?;
        if self.has_indicator(new_id) {
            return Err(DraftError::DuplicateId(new_id.to_string()));
        }
        let indicator = self
            .indicators
            .iter_mut()
            .find(|i| i.id == old_id)
            .ok_or_else(|| DraftError::UnknownIndicator(old_id.to_string()))?;
        indicator.id = new_id.to_string();

        let conditions = self
            .entry
            .long
            .conditions
            .iter_mut()
            .chain(self.entry.short.conditions.iter_mut())
            .chain(self.exit.indicator_based.long.conditions.iter_mut())
            .chain(self.exit.indicator_based.short.conditions.iter_mut());
        for condition in conditions {
            rename_in_condition(condition, old_id, new_id);
        }

        match &mut self.stop_loss {
            StopLossDraft::AtrBased {
                atr_indicator_id, ..
            } => rename_ref(atr_indicator_id, old_id, new_id),
            StopLossDraft::IndicatorLevel {
                long_ref,
                short_ref,
            } => {
                for r in [long_ref, short_ref].into_iter().flatten() {
                    rename_ref(r, old_id, new_id);
                }
            }
            StopLossDraft::FixedPercent { .. } => {}
        }
        rename_ref(&mut self.exit.atr_trailing.atr_indicator_id, old_id, new_id);

        debug!(old_id, new_id, "renamed indicator");
        Ok(())
    }
}

fn rename_in_condition(condition: &mut ConditionDraft, old_id: &str, new_id: &str) {
    for operand in [&mut condition.left, &mut condition.right] {
        if let Operand::Indicator(reference) = operand {
            rename_ref(reference, old_id, new_id);
        }
    }
}

/// Rewrite `old` or `old.field` to `new` / `new.field`.
fn rename_ref(reference: &mut String, old_id: &str, new_id: &str) {
    if indicator_id_of(reference) != old_id {
        return;
    }
    let suffix = &reference[old_id.len()..];
    *reference = format!("{new_id}{suffix}");
}
