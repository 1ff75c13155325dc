//! AlgoForge CLI: draft scaffolding, validation, compilation and hashing.
//!
//! Commands:
//! - `new`: write an empty draft with the editor defaults
//! - `validate`: report every rule violation in a draft
//! - `compile`: emit `{identity, canonical, document}` for a valid draft
//! - `hash`: recompute identities of stored canonical documents
//! - `indicators`: list the indicator registry

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use algoforge_core::config::DEFAULT_CONFIG_FILE;
use algoforge_core::{
    compile, json_hash, validate_draft, AlgoforgeConfig, CompileError, IndicatorRegistry,
    StrategyDraft, StrategyHash,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "algoforge",
    about = "AlgoForge CLI: deterministic strategy compilation"
)]
struct Cli {
    /// Config file. Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an empty strategy draft.
    New {
        /// Strategy name.
        #[arg(long, default_value = "")]
        name: String,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a draft and print the error list.
    Validate {
        /// Draft JSON file.
        draft: PathBuf,
    },
    /// Compile a draft into its canonical document and identity.
    Compile {
        /// Draft JSON file.
        draft: PathBuf,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Pretty-print the output (overrides config).
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Hash stored canonical documents.
    Hash {
        /// Document JSON files.
        #[arg(required = true)]
        documents: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = HashFormat::Text)]
        format: HashFormat,
    },
    /// List indicator types known to the registry.
    Indicators,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HashFormat {
    Text,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AlgoforgeConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_tracing(&config)?;

    match cli.command {
        Commands::New { name, out } => run_new(&config, name, out.as_deref()),
        Commands::Validate { draft } => run_validate(&draft),
        Commands::Compile { draft, out, pretty } => {
            run_compile(&draft, out.as_deref(), pretty || config.output.pretty)
        }
        Commands::Hash { documents, format } => {
            let rows = hash_documents(&documents)?;
            write_hashes(&rows, format, io::stdout().lock())
        }
        Commands::Indicators => {
            let registry = config.registry()?;
            write_indicators(&registry, io::stdout().lock())
        }
    }
}

/// `RUST_LOG` wins; otherwise the configured filter. Logs go to stderr so
/// stdout stays machine-readable.
fn init_tracing(config: &AlgoforgeConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.filter)
            .with_context(|| format!("invalid log filter '{}'", config.logging.filter))?,
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
    Ok(())
}

fn read_draft(path: &Path) -> Result<StrategyDraft> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing draft {}", path.display()))
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

fn emit(out: Option<&Path>, content: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, format!("{content}\n"))
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => println!("{content}"),
    }
    Ok(())
}

fn run_new(config: &AlgoforgeConfig, name: String, out: Option<&Path>) -> Result<()> {
    let mut draft = StrategyDraft::empty();
    draft.name = name;
    emit(out, &to_json(&draft, config.output.pretty)?)
}

fn run_validate(path: &Path) -> Result<()> {
    let draft = read_draft(path)?;
    let result = validate_draft(&draft);
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

fn run_compile(path: &Path, out: Option<&Path>, pretty: bool) -> Result<()> {
    let draft = read_draft(path)?;
    let compiled = match compile(&draft) {
        Ok(compiled) => compiled,
        Err(CompileError::Invalid(result)) => {
            for error in &result.errors {
                eprintln!("{}: {}", error.field, error.message);
            }
            bail!("{} has {} validation error(s)", path.display(), result.errors.len());
        }
        Err(err) => return Err(err.into()),
    };
    emit(out, &to_json(&compiled, pretty)?)
}

#[derive(Debug, Serialize)]
struct HashRow {
    path: String,
    identity: StrategyHash,
}

fn hash_documents(paths: &[PathBuf]) -> Result<Vec<HashRow>> {
    paths
        .iter()
        .map(|path| {
            let content =
                fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            let identity =
                json_hash(&value).with_context(|| format!("hashing {}", path.display()))?;
            debug!(path = %path.display(), %identity, "hashed document");
            Ok(HashRow {
                path: path.display().to_string(),
                identity,
            })
        })
        .collect()
}

fn write_hashes<W: Write>(rows: &[HashRow], format: HashFormat, mut out: W) -> Result<()> {
    match format {
        HashFormat::Text => {
            for row in rows {
                writeln!(out, "{}  {}", row.identity, row.path)?;
            }
        }
        HashFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

fn write_indicators<W: Write>(registry: &IndicatorRegistry, mut out: W) -> Result<()> {
    for meta in registry.iter() {
        let defaults: Vec<String> = meta
            .default_params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        writeln!(
            out,
            "{:<8} {:<32} {:<10} [{}] outputs: {}",
            meta.indicator_type,
            meta.name,
            format!("{:?}", meta.category).to_lowercase(),
            defaults.join(", "),
            meta.output_fields.join(", "),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const EMA_CROSS: &str = r#"{
        "name": "EMA Cross",
        "indicators": [
            {"id": "ema_fast", "type": "ema", "params": {"source": "close", "period": 12}},
            {"id": "ema_slow", "type": "ema", "params": {"source": "close", "period": 26}}
        ],
        "entry": {
            "long": {"conditions": [{
                "left": {"type": "indicator", "value": "ema_fast"},
                "operator": "cross_above",
                "right": {"type": "indicator", "value": "ema_slow"}
            }]},
            "short": {"conditions": []}
        },
        "stopLoss": {"type": "fixed_percent", "percent": 2}
    }"#;

    #[test]
    fn reads_editor_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "draft.json", EMA_CROSS);
        let draft = read_draft(&path).unwrap();
        assert_eq!(draft.name, "EMA Cross");
        assert!(validate_draft(&draft).is_valid);
    }

    #[test]
    fn hash_matches_compiled_identity() {
        let dir = tempfile::tempdir().unwrap();
        let draft = read_draft(&write(dir.path(), "draft.json", EMA_CROSS)).unwrap();
        let compiled = compile(&draft).unwrap();

        let doc_path = write(
            dir.path(),
            "doc.json",
            &serde_json::to_string_pretty(&compiled.document).unwrap(),
        );
        let rows = hash_documents(&[doc_path]).unwrap();
        assert_eq!(rows[0].identity, compiled.identity);
    }

    #[test]
    fn csv_output_has_header_and_rows() {
        let rows = vec![HashRow {
            path: "a.json".into(),
            identity: algoforge_core::hash_canonical("{}"),
        }];
        let mut buf = Vec::new();
        write_hashes(&rows, HashFormat::Csv, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("path,identity"));
        assert!(lines.next().unwrap().starts_with("a.json,"));
    }

    #[test]
    fn text_output_is_sha256sum_style() {
        let identity = algoforge_core::hash_canonical("{}");
        let rows = vec![HashRow {
            path: "a.json".into(),
            identity: identity.clone(),
        }];
        let mut buf = Vec::new();
        write_hashes(&rows, HashFormat::Text, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), format!("{identity}  a.json\n"));
    }

    #[test]
    fn malformed_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.json", "[1, 2]");
        assert!(hash_documents(&[path]).is_err());
    }

    #[test]
    fn documents_without_supported_schema_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let empty = write(dir.path(), "empty.json", "{}");
        let future = write(dir.path(), "future.json", r#"{"schema_version": "2.0", "entry": {}}"#);

        for path in [empty, future] {
            let err = hash_documents(&[path]).unwrap_err();
            assert!(
                format!("{err:#}").contains("unsupported schema_version"),
                "unexpected error: {err:#}"
            );
        }
    }

    #[test]
    fn indicator_listing_covers_builtins() {
        let mut buf = Vec::new();
        write_indicators(&IndicatorRegistry::builtin(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        for ty in ["atr", "ema", "rsi", "sma"] {
            assert!(text.lines().any(|l| l.starts_with(ty)), "missing {ty}");
        }
    }
}
