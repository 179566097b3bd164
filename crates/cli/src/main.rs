//! unconflict command-line tool.
//!
//! Walks a source tree, collapses every leftover merge-conflict block into a
//! single side, and rewrites the affected files in place. Also provides a
//! read-only `check` for CI and helpers to generate / validate the
//! configuration file.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use unconflict_core::config::AppConfig;
use unconflict_core::file_policy::FilePolicy;
use unconflict_core::scanner::{FileOutcome, ScanReport, Scanner};
use unconflict_core::{ResolveOptions, Side};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// unconflict command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "unconflict",
    version,
    about = "Collapse leftover merge-conflict markers in a source tree"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to
    /// `<config dir>/unconflict/config.toml` when that file exists.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug events to stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors to stderr.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve conflict markers under ROOT and write the files back.
    Resolve {
        /// Directory to scan.
        root: PathBuf,

        /// Report what would change without writing any file.
        #[arg(long)]
        dry_run: bool,

        /// Side kept when both segments differ: ours or theirs.
        #[arg(long)]
        prefer: Option<Side>,
    },

    /// List files under ROOT that still contain conflict markers.
    ///
    /// Exits with status 1 when any are found or a file could not be read.
    Check {
        /// Directory to scan.
        root: PathBuf,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./unconflict.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        config,
        verbose,
        quiet,
        command,
    } = cli;

    match command {
        Commands::Init { output } => {
            init_tracing(verbose, quiet, "warn");
            cmd_init(&output).map(|()| ExitCode::SUCCESS)
        }
        Commands::Resolve {
            root,
            dry_run,
            prefer,
        } => {
            let (config, _) = load_config(config, verbose, quiet)?;
            config.validate().context("invalid configuration")?;
            cmd_resolve(&config, &root, dry_run, prefer).map(|()| ExitCode::SUCCESS)
        }
        Commands::Check { root } => {
            let (config, _) = load_config(config, verbose, quiet)?;
            config.validate().context("invalid configuration")?;
            cmd_check(&config, &root)
        }
        Commands::Validate => {
            let (config, path) = load_config(config, verbose, quiet)?;
            cmd_validate(&config, path.as_deref()).map(|()| ExitCode::SUCCESS)
        }
    }
}

/// Load the configuration from `explicit` or the default location, then
/// install tracing at its level. Returns the path that was read, if any.
fn load_config(
    explicit: Option<PathBuf>,
    verbose: bool,
    quiet: bool,
) -> Result<(AppConfig, Option<PathBuf>)> {
    let path = explicit.or_else(existing_default_config);
    let config = match &path {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => AppConfig::default(),
    };
    init_tracing(verbose, quiet, &config.log.level);
    Ok((config, path))
}

/// Install the tracing subscriber. `RUST_LOG` wins over the flags, which win
/// over the configured level.
fn init_tracing(verbose: bool, quiet: bool, configured: &str) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        configured
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("unconflict").join("config.toml"))
}

fn existing_default_config() -> Option<PathBuf> {
    default_config_path().filter(|path| path.exists())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_resolve(
    config: &AppConfig,
    root: &Path,
    dry_run: bool,
    prefer: Option<Side>,
) -> Result<()> {
    let mut options = ResolveOptions::from(&config.resolve);
    if let Some(prefer) = prefer {
        options.prefer = prefer;
    }
    debug!(prefer = %options.prefer, max_passes = options.max_passes, "resolve options");

    let scanner = Scanner::new(FilePolicy::from(&config.scan), options).dry_run(dry_run);
    let report = scanner
        .scan_with(root, |outcome| print_outcome(outcome, dry_run))
        .with_context(|| format!("failed to scan {}", root.display()))?;

    println!();
    println!("{}", style::done(&report));
    if dry_run {
        println!("{}", style::dry_run_note());
    }

    Ok(())
}

fn print_outcome(outcome: &FileOutcome, dry_run: bool) {
    match outcome {
        FileOutcome::Resolved {
            path, converged, ..
        } => {
            println!("{}", style::cleaning(path, dry_run));
            if !converged {
                println!("{}", style::partial(path));
            }
        }
        FileOutcome::Failed { path, error } => {
            eprintln!("{}", style::failed(path, error));
        }
    }
}

fn cmd_check(config: &AppConfig, root: &Path) -> Result<ExitCode> {
    let scanner = Scanner::new(
        FilePolicy::from(&config.scan),
        ResolveOptions::from(&config.resolve),
    )
    .dry_run(true);
    let report = scanner
        .scan(root)
        .with_context(|| format!("failed to scan {}", root.display()))?;

    for outcome in report.failures() {
        if let FileOutcome::Failed { path, error } = outcome {
            eprintln!("{}", style::failed(path, error));
        }
    }

    if report.is_clean() {
        println!();
        println!("{}", style::no_markers(report.files_visited));
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    if report.resolved_count() > 0 {
        println!("{}", style::markers_header(report.resolved_count()));
        println!();
        println!("{}", conflict_table(root, &report));
        println!();
    }
    if report.failure_count() > 0 {
        println!("{}", style::unchecked(report.failure_count()));
        println!();
    }

    Ok(ExitCode::FAILURE)
}

fn conflict_table(root: &Path, report: &ScanReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Blocks", "Stray markers"]);

    for outcome in report.resolved() {
        if let FileOutcome::Resolved {
            path,
            blocks,
            stray_markers,
            ..
        } = outcome
        {
            let rel = path.strip_prefix(root).unwrap_or(path);
            table.add_row(vec![
                Cell::new(rel.display()),
                Cell::new(blocks),
                Cell::new(stray_markers),
            ]);
        }
    }

    table
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, AppConfig::default_toml()).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Adjust the extensions and excluded directories for your project");
    println!(
        "  2. Validate with: unconflict validate --config {}",
        output.display()
    );
    println!(
        "  3. Preview with: unconflict resolve --dry-run --config {} <ROOT>",
        output.display()
    );
    if let Some(default) = default_config_path() {
        println!(
            "  (Place it at {} to use it without --config.)",
            default.display()
        );
    }

    Ok(())
}

fn cmd_validate(config: &AppConfig, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            println!("Validating configuration: {}", path.display());
            println!();
            println!("  [OK] TOML structure is valid");
        }
        None => {
            println!("No configuration file found; validating built-in defaults.");
            println!();
        }
    }

    match config.validate() {
        Ok(()) => println!("  [OK] All values are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Extensions    : {}", config.scan.extensions.join(", "));
    println!("  Excluded dirs : {}", config.scan.exclude_dirs.join(", "));
    println!(
        "  Ignore globs  : {}",
        if config.scan.ignore_patterns.is_empty() {
            "none".to_string()
        } else {
            config.scan.ignore_patterns.join(", ")
        }
    );
    println!(
        "  Max file size : {}",
        if config.scan.max_file_size == 0 {
            "unlimited".to_string()
        } else {
            format!("{} bytes", config.scan.max_file_size)
        }
    );
    println!("  Prefer        : {}", config.resolve.prefer);
    println!("  Max passes    : {}", config.resolve.max_passes);
    println!("  Log level     : {}", config.log.level);
    println!();
    println!("Configuration is valid.");

    Ok(())
}
