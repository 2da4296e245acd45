//! Supply Chain CLI - JSON bridge for integration tooling
//!
//! Commands: nodes, validate, compile
//! Outputs JSON to stdout, logs to stderr
//! Returns non-zero on validation failure

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use supplychain_core::{SupplyChainCompiler, SupplyChainConfig};

#[derive(Parser)]
#[command(name = "supplychain-cli")]
#[command(about = "Supply Chain CLI - Topology Template Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log validation steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the compiled node map
    Nodes {
        /// Template document (.yaml, .yml or .json)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Validate a template document
    Validate {
        /// Template document (.yaml, .yml or .json)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Compile a template document into a manifest
    Compile {
        /// Template document (.yaml, .yml or .json)
        #[arg(short, long)]
        file: PathBuf,
    },
}

/// `--verbose` forces debug output; otherwise `RUST_LOG` wins over the warn default.
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(verbose))
        .init();
}

fn load_config(path: &Path) -> Result<SupplyChainConfig, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let is_json = path.extension().map_or(false, |e| e == "json");
    let decoded = if is_json {
        SupplyChainConfig::from_json_str(&content)
    } else {
        SupplyChainConfig::from_yaml_str(&content)
    };
    decoded.map_err(|e| format!("Failed to decode {}: {}", path.display(), e))
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => println!(r#"{{"error": "Failed to encode output: {}"}}"#, e),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = match &cli.command {
        Commands::Nodes { file } | Commands::Validate { file } | Commands::Compile { file } => file,
    };
    let config = match load_config(file) {
        Ok(c) => c,
        Err(e) => {
            print_json(&serde_json::json!({ "error": e }));
            return ExitCode::FAILURE;
        }
    };

    let compiler = SupplyChainCompiler::new();

    match cli.command {
        Commands::Nodes { .. } => match compiler.compile(&config) {
            Ok(chain) => {
                print_json(&serde_json::json!(chain.node_map()));
                ExitCode::SUCCESS
            }
            Err(e) => {
                print_json(&serde_json::json!({
                    "error": e.to_string(),
                    "kind": e.kind().name(),
                }));
                ExitCode::from(2)
            }
        },

        Commands::Validate { .. } => match compiler.compile(&config) {
            Ok(chain) => {
                let entity_types: Vec<_> = chain.entity_types().map(|t| t.as_str()).collect();
                print_json(&serde_json::json!({
                    "valid": true,
                    "entityTypes": entity_types,
                }));
                ExitCode::SUCCESS
            }
            Err(e) => {
                print_json(&serde_json::json!({
                    "valid": false,
                    "error": e.to_string(),
                    "kind": e.kind().name(),
                    "entry": e.entry,
                    "field": e.field,
                }));
                ExitCode::from(2) // Validation failure
            }
        },

        Commands::Compile { .. } => match compiler.compile_manifest(&config) {
            Ok(manifest) => {
                print_json(&serde_json::json!({
                    "success": true,
                    "manifest": manifest,
                }));
                ExitCode::SUCCESS
            }
            Err(e) => {
                print_json(&serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                }));
                ExitCode::from(2)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_filter_is_debug() {
        assert_eq!(log_filter(true).to_string(), "debug");
    }

    #[test]
    fn test_default_filter_follows_rust_log() {
        let expected = std::env::var("RUST_LOG")
            .ok()
            .and_then(|v| EnvFilter::try_new(v).ok())
            .map_or_else(|| "warn".to_string(), |f| f.to_string());
        assert_eq!(log_filter(false).to_string(), expected);
    }
}
