// crates/falco-legacy-compiler/src/main.rs
// ============================================================================
// Module: Legacy Compiler CLI
// Description: CLI entrypoint for descriptor bundle generation.
// Purpose: Compile legacy regression YAML and keep the bundle in sync.
// Dependencies: clap, falco-legacy-compiler, falco-legacy-config
// ============================================================================

//! ## Overview
//! `compile` writes the descriptor bundle for the configured legacy
//! documents; `check` recompiles and fails when the on-disk bundle differs.
//! Any configuration, load, or compile error fails the run without writing.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use falco_legacy_compiler::PipelineError;
use falco_legacy_compiler::pipeline::run_check;
use falco_legacy_compiler::pipeline::run_compile;
use falco_legacy_compiler::pipeline::skip_sink;
use falco_legacy_config::CompilerConfig;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// CLI arguments for descriptor compilation.
#[derive(Debug, Parser)]
#[command(
    name = "falco-legacy-compiler",
    about = "Compile legacy Falco regression tests into test descriptors."
)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Arguments shared by every subcommand.
#[derive(Debug, clap::Args)]
struct CommonArgs {
    /// Compiler configuration file (defaults to `falco-legacy.toml`).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Descriptor bundle path, overriding `output.path`.
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,
}

/// Supported CLI subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Compile the legacy documents and write the bundle.
    Compile(CommonArgs),
    /// Verify the bundle matches a fresh compilation.
    Check(CommonArgs),
}

// ============================================================================
// SECTION: Command Dispatch
// ============================================================================

/// CLI entrypoint.
fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_error(&err),
    }
}

/// Dispatches the CLI command.
fn run() -> Result<(), PipelineError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Compile(args) => {
            let config = load_config(args)?;
            let sink = skip_sink(&config)?;
            run_compile(&config, sink.as_ref())
        }
        Command::Check(args) => {
            let config = load_config(args)?;
            let sink = skip_sink(&config)?;
            run_check(&config, sink.as_ref())
        }
    }
}

/// Loads configuration and applies command line overrides.
fn load_config(args: CommonArgs) -> Result<CompilerConfig, PipelineError> {
    let mut config = CompilerConfig::load(args.config.as_deref())?;
    if let Some(out) = args.out {
        config.output.path = out;
        config.validate()?;
    }
    Ok(config)
}

/// Reports a CLI error to stderr.
fn report_error(err: &PipelineError) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "{err}");
    ExitCode::FAILURE
}
