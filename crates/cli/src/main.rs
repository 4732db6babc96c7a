// txrecon CLI - config-driven two-party payout reconciliation

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use txrecon::{CancelToken, ReconError};
use txrecon_cli::exit_codes::{exit_code_for, EXIT_RECON_MISMATCH, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};
use txrecon_cli::{job, report, JobConfig};

#[derive(Parser)]
#[command(name = "txrecon")]
#[command(about = "Reconcile a ledger against a payout provider's report")]
#[command(version)]
#[command(long_version = long_version())]
struct Cli {
    /// More logging (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation job from a TOML config file
    #[command(after_help = "\
Examples:
  txrecon run payouts.toml
  txrecon run payouts.toml --json
  txrecon run payouts.toml --output result.json --csv items.csv
  txrecon run payouts.toml --timeout-secs 60 -v")]
    Run {
        /// Path to the job config
        config: PathBuf,

        /// Print the JSON result set to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON result set to a file (overrides [output].json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write flattened diff items as CSV (overrides [output].csv)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Abort when the run takes longer than this
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },

    /// Validate a job config without running it
    #[command(after_help = "\
Examples:
  txrecon validate payouts.toml")]
    Validate {
        /// Path to the job config
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("TXRECON_COMMIT"), ")",
        "\nengine:  txrecon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TXRECON_TARGET"),
    )
}

#[derive(Debug)]
struct CliError {
    code: u8,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: u8, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), hint: None }
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let code = exit_code_for(&err);
        let hint = match &err {
            ReconError::Cancelled => Some("raise --timeout-secs or narrow [filter]".to_string()),
            e if e.is_not_found() => Some("relative paths resolve against the config file's directory".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // `log` records from the library crates are bridged by the subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(config_path: &Path) -> Result<JobConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(EXIT_USAGE, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    Ok(JobConfig::from_toml(&config_str)?)
}

fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    csv_file: Option<PathBuf>,
    timeout_secs: Option<u64>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let cancel = match timeout_secs {
        Some(0) => return Err(CliError::new(EXIT_USAGE, "--timeout-secs must be positive")),
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };

    tracing::debug!(config = %config_path.display(), "starting run");
    let result = job::run(&config, base_dir, &cancel)?;

    let json_path = output_file.or_else(|| config.output.json.as_ref().map(|p| base_dir.join(p)));
    let csv_path = csv_file.or_else(|| config.output.csv.as_ref().map(|p| base_dir.join(p)));

    if json_output || json_path.is_some() {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

        if let Some(ref path) = json_path {
            std::fs::write(path, &json_str)
                .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
            eprintln!("wrote {}", path.display());
        }

        if json_output {
            println!("{json_str}");
        }
    }

    if let Some(ref path) = csv_path {
        let rows = report::write_items_csv(&result, path)?;
        eprintln!("wrote {} ({} rows)", path.display(), rows);
    }

    let count = result.count();
    eprintln!("{}", report::summary_line(config.display_name(), &count));

    if !result.is_reconciled() {
        return Err(CliError::new(EXIT_RECON_MISMATCH, "differences found"));
    }
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "valid: '{}' reconciling '{}' ({:?}) against '{}' ({:?})",
        config.display_name(),
        config.party1.id,
        config.party1.format,
        config.party2.id,
        config.party2.format,
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output, csv, timeout_secs } => {
            cmd_run(config, json, output, csv, timeout_secs)
        }
        Commands::Validate { config } => cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
