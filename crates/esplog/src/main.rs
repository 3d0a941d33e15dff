use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use esplog::motion::record_synthetic;
use esplog::{decode_log, RecorderArgs, RecorderConfig};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "esplog")]
#[command(about = "Record and inspect compressed orientation logs")]
struct Cli {
    /// Emit log records as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Recorder config file (default: ~/.esplog/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record synthetic motion into a log file
    Record {
        /// Output log path
        output: PathBuf,
        /// Number of gyro samples to record
        #[arg(long, default_value_t = 1000)]
        samples: u32,
        #[command(flatten)]
        overrides: RecorderArgs,
    },
    /// Decode a log file and summarize it
    Inspect {
        /// Input log path
        input: PathBuf,
        /// Print the decoded log as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the default recorder config
    InitConfig {
        /// Destination (default: the --config path or ~/.esplog/config.toml)
        path: Option<PathBuf>,
    },
}

fn config_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => RecorderConfig::default_path().context("locating the default config"),
    }
}

fn load_config(path: Option<&Path>) -> Result<RecorderConfig> {
    let path = config_path(path)?;
    RecorderConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

fn record(
    output: &Path,
    samples: u32,
    overrides: &RecorderArgs,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    config.apply(overrides)?;
    info!(config = ?config, "Recording synthetic motion");

    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let start = std::time::Instant::now();
    let (_, stats) = record_synthetic(BufWriter::new(file), &config, samples)?;
    info!(
        output = %output.display(),
        gyro_samples = stats.gyro_samples,
        gyro_blocks = stats.gyro_blocks,
        dropped_blocks = stats.dropped_blocks,
        fallback_blocks = stats.fallback_blocks,
        accel_samples = stats.accel_samples,
        total_bytes = stats.total_bytes,
        gyro_ratio_percent = stats.gyro_ratio() * 100.0,
        duration_secs = start.elapsed().as_secs_f64(),
        "Recording Complete"
    );
    Ok(())
}

fn inspect(input: &Path, json: bool) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let log = decode_log(&bytes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
        return Ok(());
    }

    println!("file:              {} ({} bytes)", input.display(), bytes.len());
    log.write_summary(&mut io::stdout().lock())?;
    Ok(())
}

fn init_config(path: Option<&Path>) -> Result<()> {
    let path = config_path(path)?;
    RecorderConfig::default().save(&path)?;
    info!(path = %path.display(), "Default config written");
    Ok(())
}

fn init_logging(json: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("{e}"))
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.json_logs) {
        eprintln!("could not initialize logging: {e}");
        std::process::exit(1);
    }

    let config_path = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Record {
            output,
            samples,
            overrides,
        } => record(output, *samples, overrides, config_path),
        Commands::Inspect { input, json } => inspect(input, *json),
        Commands::InitConfig { path } => init_config(path.as_deref().or(config_path)),
    };

    if let Err(e) = result {
        error!(error = %format!("{e:#}"), "Fatal Error");
        std::process::exit(1);
    }
}
