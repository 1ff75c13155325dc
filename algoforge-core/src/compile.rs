//! End-to-end compilation: validate → transform → canonicalize → hash.
//!
//! Every stage is a pure function of its input, so drafts compile
//! independently and `compile_many` fans them out over the rayon pool.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, debug_span};

use crate::canonical::{canonicalize, CanonicalError};
use crate::document::StrategyDocument;
use crate::draft::StrategyDraft;
use crate::fingerprint::{hash_canonical, StrategyHash};
use crate::transform::{transform, TransformError};
use crate::validate::ValidationResult;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The draft was rejected by the validator. Recoverable, user-facing.
    #[error("strategy is invalid: {}", summarize(.0))]
    Invalid(ValidationResult),
    /// A malformed document reached the canonicalizer.
    #[error("structural error: {0}")]
    Structural(#[from] CanonicalError),
}

impl From<TransformError> for CompileError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::InvalidDraft(result) => CompileError::Invalid(result),
        }
    }
}

fn summarize(result: &ValidationResult) -> String {
    result
        .errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// What the persistence layer stores: identity, canonical form and the
/// full document (whose `meta` is the display metadata).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStrategy {
    pub identity: StrategyHash,
    pub document: StrategyDocument,
    pub canonical: String,
}

pub fn compile(draft: &StrategyDraft) -> Result<CompiledStrategy, CompileError> {
    let _span = debug_span!("compile", name = %draft.name).entered();

    let document = transform(draft)?;
    let canonical = canonicalize(&document)?;
    let identity = hash_canonical(&canonical);
    debug!(%identity, bytes = canonical.len(), "compiled strategy");

    Ok(CompiledStrategy {
        identity,
        document,
        canonical,
    })
}

/// Compile a batch in parallel. Results line up with `drafts` by index.
pub fn compile_many(drafts: &[StrategyDraft]) -> Vec<Result<CompiledStrategy, CompileError>> {
    drafts.par_iter().map(compile).collect()
}
