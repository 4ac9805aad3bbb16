//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use archmap_core::pipeline::{
    ProgressReporter, RunOptions, RunState, RunSummary, run as run_pipeline,
};
use archmap_shared::{
    CONFIG_FILE_NAME, ResolvedConfig, StageKind, init_config, load_config, resolve_config,
};
use archmap_stages::builtin_registry;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// archmap — architecture models out of heterogeneous source trees.
#[derive(Parser)]
#[command(
    name = "archmap",
    version,
    about = "Aggregate architecture metadata into one model and generate diagrams and docs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline: extract, validate, generate, render, docs.
    Build {
        /// Path to archmap.toml (defaults to ./archmap.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Source tree to analyze (defaults to the config file's directory).
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Output directory (overrides [project] output_dir).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Extract, validate, and print the aggregated IR as JSON.
    Ir {
        /// Path to archmap.toml (defaults to ./archmap.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Source tree to analyze (defaults to the config file's directory).
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Skip the validation stage (raw aggregation output).
        #[arg(long)]
        no_validate: bool,
    },

    /// List the builtin stage implementations.
    Plugins,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default archmap.toml into the current directory.
    Init,
    /// Show the resolved configuration.
    Show {
        /// Path to archmap.toml (defaults to ./archmap.toml).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command routing
// ---------------------------------------------------------------------------

/// Dispatch the parsed CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            config,
            source,
            out,
        } => build(config, source, out),
        Command::Ir {
            config,
            source,
            no_validate,
        } => print_ir(config, source, no_validate),
        Command::Plugins => list_plugins(),
        Command::Config { action } => match action {
            ConfigAction::Init => config_init(),
            ConfigAction::Show { config } => config_show(config),
        },
    }
}

fn build(config: Option<PathBuf>, source: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let (resolved, config_dir) = load_resolved(config)?;
    let opts = RunOptions {
        base_dir: install_dir(),
        source_dir: source.unwrap_or_else(|| config_dir.clone()),
        output_dir: out,
        halt_after: None,
    };

    let progress = SpinnerProgress::new();
    let summary = run_pipeline(&resolved, &builtin_registry(), &opts, &progress)?;
    progress.finish();

    for warning in &summary.warnings {
        eprintln!("warning: {warning}");
    }
    println!(
        "{} entities, {} relationships from {} fragment(s); {} artifact(s), {} doc file(s) ({:.1?})",
        summary.ir.entity_count(),
        summary.ir.relationships.len(),
        summary.fragments,
        summary.artifacts.len(),
        summary.doc_files.len(),
        summary.elapsed,
    );
    Ok(())
}

fn print_ir(config: Option<PathBuf>, source: Option<PathBuf>, no_validate: bool) -> Result<()> {
    let (resolved, config_dir) = load_resolved(config)?;
    let opts = RunOptions {
        base_dir: install_dir(),
        source_dir: source.unwrap_or_else(|| config_dir.clone()),
        output_dir: None,
        halt_after: Some(if no_validate {
            StageKind::Extract
        } else {
            StageKind::Validate
        }),
    };

    let summary = run_pipeline(&resolved, &builtin_registry(), &opts, &SilentCliProgress)?;
    println!("{}", serde_json::to_string_pretty(&summary.ir)?);
    Ok(())
}

fn list_plugins() -> Result<()> {
    let registry = builtin_registry();
    for kind in StageKind::ALL {
        let names = registry.names_for(kind);
        if names.is_empty() {
            println!("{kind}: (external plugins only)");
        } else {
            println!("{kind}: {}", names.join(", "));
        }
    }
    Ok(())
}

fn config_init() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let path = init_config(&cwd)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn config_show(config: Option<PathBuf>) -> Result<()> {
    let (resolved, _) = load_resolved(config)?;
    println!("project: {}", resolved.project.name);
    println!("output:  {}", resolved.project.output_dir);
    for node in &resolved.nodes {
        let include: Vec<&str> = node.include.iter().map(|p| p.as_str()).collect();
        let exclude: Vec<&str> = node.exclude.iter().map(|p| p.as_str()).collect();
        println!(
            "{:>9} {} include={include:?} exclude={exclude:?}",
            node.kind.to_string(),
            node.module,
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_resolved(config: Option<PathBuf>) -> Result<(ResolvedConfig, PathBuf)> {
    let path = match config {
        Some(path) => path,
        None => std::env::current_dir()?.join(CONFIG_FILE_NAME),
    };
    if !path.is_file() {
        return Err(eyre!(
            "no config file at {} (run `archmap config init` to create one)",
            path.display()
        ));
    }

    let raw = load_config(&path)?;
    let resolved = resolve_config(&raw)?;
    let config_dir = path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    info!(config = %path.display(), nodes = resolved.nodes.len(), "configuration resolved");
    Ok((resolved, config_dir))
}

/// Base directory for module resolution: the tool's install location, so
/// relative plugin paths in config work from any CWD.
fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Spinner-based progress for interactive runs.
struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .expect("valid progress template"),
        );
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for SpinnerProgress {
    fn state(&self, state: RunState) {
        self.bar.set_message(state.as_str().to_string());
        self.bar.tick();
    }

    fn node_done(&self, kind: StageKind, module: &str) {
        self.bar.set_message(format!("{kind}: {module} done"));
        self.bar.tick();
    }

    fn done(&self, _summary: &RunSummary) {}
}

/// Quiet reporter for commands whose stdout is the payload.
struct SilentCliProgress;

impl ProgressReporter for SilentCliProgress {
    fn state(&self, _state: RunState) {}
    fn node_done(&self, _kind: StageKind, _module: &str) {}
    fn done(&self, _summary: &RunSummary) {}
}
