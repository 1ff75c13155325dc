//! AlgoForge Core: deterministic strategy compilation.
//!
//! A [`StrategyDraft`] edited in the UI passes through four pure stages:
//! - [`validate_draft`]: accumulates every business-rule violation
//! - [`transform`]: maps a valid draft onto the schema 1.0 [`StrategyDocument`]
//! - [`canonicalize`]: sorted, compact JSON with top-level `meta` excluded
//! - [`hash_canonical`]: lowercase hex SHA-256 of the canonical string
//!
//! [`compile`] runs the whole pipeline and yields the strategy identity the
//! persistence layer deduplicates on.

pub mod canonical;
pub mod compile;
pub mod config;
pub mod document;
pub mod draft;
pub mod fingerprint;
pub mod registry;
pub mod transform;
pub mod validate;

pub use canonical::{canonicalize, canonicalize_json, CanonicalError, CanonicalValue, ToCanonical};
pub use compile::{compile, compile_many, CompileError, CompiledStrategy};
pub use config::{AlgoforgeConfig, ConfigError};
pub use document::{check_schema_version, StrategyDocument, SCHEMA_VERSION};
pub use draft::{DraftError, StrategyDraft};
pub use fingerprint::{document_hash, hash_canonical, json_hash, HashError, StrategyHash};
pub use registry::{IndicatorRegistry, RegistryError};
pub use transform::{transform, TransformError};
pub use validate::{validate_draft, ValidationError, ValidationResult};
