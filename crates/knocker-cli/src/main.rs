//! knocker CLI - reset or wipe database content from delimited files.

use clap::{Args, Parser, Subcommand};
use knocker::{
    discover_inputs, Config, DatasetLoader, KnockerError, Operation, ResetOrchestrator,
    ResetReport, Settings,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "knocker")]
#[command(about = "Reset or wipe database content from delimited files (mssql, mysql, postgres)")]
#[command(version)]
struct Cli {
    /// Optional YAML configuration file; command-line flags take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by both commands.
#[derive(Args)]
struct TargetArgs {
    /// Connection string for the target database
    #[arg(short = 'c', long, env = "KNOCKER_CONNECTION_STRING", hide_env_values = true)]
    connection_string: Option<String>,

    /// Database provider: mssql, mysql or postgres [default: mssql]
    #[arg(short, long)]
    provider: Option<String>,

    /// Tables to leave untouched (repeatable, comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Schema to operate on [default: dbo, public, or the connection's database]
    #[arg(long)]
    schema: Option<String>,

    /// Do not reseed identity/auto-increment columns
    #[arg(long)]
    skip_identity_reset: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete all non-excluded tables and reload them from delimited files
    Reset {
        /// Directory containing one delimited file per table
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Field delimiter [default: ;]
        #[arg(short, long)]
        delimiter: Option<String>,

        /// Input file extension [default: csv]
        #[arg(long)]
        extension: Option<String>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Delete all rows from every non-excluded table
    Delete {
        #[command(flatten)]
        target: TargetArgs,
    },
}

impl TargetArgs {
    fn into_config(self) -> Config {
        Config {
            provider: self.provider,
            connection_string: self.connection_string,
            exclude: self.exclude,
            schema: self.schema,
            reset_identity: self.skip_identity_reset.then_some(false),
            ..Config::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), KnockerError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(KnockerError::Config)?;

    let file_config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };

    let report = match cli.command {
        Commands::Reset {
            input_dir,
            delimiter,
            extension,
            target,
        } => {
            let overrides = Config {
                delimiter,
                extension,
                ..target.into_config()
            };
            let settings = file_config.merge(overrides).resolve()?;

            let inputs = discover_inputs(&input_dir, &settings.extension, settings.delimiter)?;
            info!(
                "Found {} .{} files in {}",
                inputs.len(),
                settings.extension,
                input_dir.display()
            );

            execute(&settings, Some(inputs.as_slice())).await?
        }

        Commands::Delete { target } => {
            let settings = file_config.merge(target.into_config()).resolve()?;
            execute(&settings, None).await?
        }
    };

    if cli.output_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

/// Connect with the resolved settings, then reset from `inputs` or, without
/// inputs, delete.
async fn execute(
    settings: &Settings,
    inputs: Option<&[DatasetLoader]>,
) -> Result<ResetReport, KnockerError> {
    let dialect = settings.provider.dialect(settings.schema.as_deref());
    let mut session = settings
        .provider
        .connect(&settings.connection_string)
        .await?;
    info!("Connected to {}", settings.provider);

    let mut orchestrator =
        ResetOrchestrator::new(session.as_mut(), &dialect, settings.excludes.clone())
            .with_reset_identity(settings.reset_identity);
    match inputs {
        Some(inputs) => orchestrator.perform_reset(inputs).await,
        None => orchestrator.perform_delete().await,
    }
}

fn print_summary(report: &ResetReport) {
    let title = match report.operation {
        Operation::Reset => "Reset completed!",
        Operation::Delete => "Delete completed!",
    };
    println!("\n{}", title);
    println!("  Provider: {}", report.provider);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "  Tables cleared: {} ({} rows)",
        report.tables_cleared.len(),
        report.rows_deleted
    );
    if !report.identity_reset.is_empty() {
        println!("  Identity reset: {}", report.identity_reset.join(", "));
    }
    if !report.tables_loaded.is_empty() {
        println!(
            "  Rows inserted: {} into {} tables",
            report.rows_inserted(),
            report.tables_loaded.len()
        );
    }
    if !report.skipped_empty.is_empty() {
        println!("  No data: {}", report.skipped_empty.join(", "));
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity: {}", other)),
    };

    // Logs go to stderr so stdout carries only the summary or JSON report.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format: {}", other)),
    }

    Ok(())
}
