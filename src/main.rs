mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use trailkeep::config::TrailkeepConfig;
use trailkeep::history::{RetentionSettings, RetentionStore};
use trailkeep::logs::{LogCapture, LogSync};

#[derive(Parser)]
#[command(name = "trailkeep", version, about = "Bounded, obfuscated location history")]
struct Cli {
    /// Config file (default ~/.trailkeep/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sample positions from a JSON-lines replay source and store them
    Track {
        /// Replay file, or `-` for stdin
        #[arg(long, default_value = "-")]
        replay: String,
        /// Seconds between samples (overrides [sampler] interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// List stored locations, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show the stored trail in chronological order
    Route {
        #[arg(long)]
        json: bool,
    },
    /// Show history statistics
    Stats,
    /// Delete all stored locations
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Local and remote diagnostic log
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },
}

#[derive(Subcommand)]
enum LogsAction {
    /// Print the local log
    Show,
    /// Delete the local log file
    Clear,
    /// Upload the local log to the remote store
    Upload,
    /// Print the most recently uploaded log
    Download,
    /// Delete every uploaded log
    DeleteRemote,
}

fn init_tracing(config: &TrailkeepConfig, capture: &LogCapture) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // stderr keeps stdout clean for command output
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let capture_layer = config.logging.capture.then(|| {
        fmt::layer()
            .with_ansi(false)
            .without_time()
            .with_writer(capture.clone())
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(capture_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TrailkeepConfig::load_from(path)?,
        None => TrailkeepConfig::load()?,
    };

    let capture = LogCapture::new(config.resolved_log_path());
    init_tracing(&config, &capture);

    // Local log commands never touch the remote store
    if let Command::Logs { action } = &cli.command {
        match action {
            LogsAction::Show => {
                cli::logs::show(&capture);
                return Ok(());
            }
            LogsAction::Clear => return cli::logs::clear(&capture),
            _ => {}
        }
    }

    let remote = trailkeep::remote::create_store(&config.remote)?;
    let codec = config.codec()?;

    match cli.command {
        Command::Logs { action } => {
            let sync = LogSync::new(
                remote,
                codec,
                config.retention.logs_path.clone(),
                config.retention.log_retention,
            );
            match action {
                LogsAction::Upload => cli::logs::upload(&sync, &capture).await?,
                LogsAction::Download => cli::logs::download(&sync).await?,
                LogsAction::DeleteRemote => cli::logs::delete_remote(&sync).await?,
                LogsAction::Show | LogsAction::Clear => {}
            }
        }
        command => {
            let store = RetentionStore::new(
                remote,
                codec,
                RetentionSettings::from(&config.retention),
            );
            match command {
                Command::Track { replay, interval } => {
                    cli::track::track(&config, &store, &replay, interval).await?
                }
                Command::List { limit, json } => cli::list::list(&store, limit, json).await?,
                Command::Route { json } => cli::route::route(&store, json).await?,
                Command::Stats => cli::stats::stats(&config, &store).await?,
                Command::Reset { yes } => cli::reset::reset(&store, yes).await?,
                Command::Logs { .. } => {}
            }
        }
    }

    Ok(())
}
