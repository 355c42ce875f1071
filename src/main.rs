use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use nzbguard::config::{Credentials, GuardConfig, LogFormat, Overrides};

#[derive(Parser)]
#[command(
    name = "nzbguard",
    about = "Pause NZBGet downloads when free disk space runs low",
    version,
    long_about = "Polls free space on a directory every 60 seconds. Below the pause \
                  threshold NZBGet is paused; above the unpause threshold it is resumed. \
                  Credentials are read from NZBGET_USER and NZBGET_PASS."
)]
struct Cli {
    /// Pause threshold in GB [default: 10]
    #[arg(long)]
    pause_threshold: Option<u64>,

    /// Unpause threshold in GB [default: 50]
    #[arg(long)]
    unpause_threshold: Option<u64>,

    /// Use SSL for communication with NZBGet
    #[arg(long)]
    ssl: bool,

    /// Hostname for NZBGet [default: localhost]
    #[arg(long)]
    host: Option<String>,

    /// Port for NZBGet [default: 6789]
    #[arg(long)]
    port: Option<String>,

    /// Directory to check [default: /]
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Show a terminal gauge instead of status lines (q to quit)
    #[arg(long)]
    dashboard: bool,

    /// Optional TOML config file; flags take precedence over it
    #[arg(long, env = "NZBGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format [default: text]
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            pause_threshold: self.pause_threshold,
            unpause_threshold: self.unpause_threshold,
            ssl: self.ssl,
            host: self.host.clone(),
            port: self.port.clone(),
            dir: self.dir.clone(),
            dashboard: self.dashboard,
            log_format: self.log_format,
        }
    }
}

fn init_tracing(config: &GuardConfig) {
    // The dashboard owns the terminal; stay quiet there unless RUST_LOG asks otherwise.
    let fallback = if config.monitor.dashboard {
        "off"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

    match config.logging.format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = GuardConfig::load_or_default(cli.config.as_deref())?;
    config.apply(&cli.overrides());

    init_tracing(&config);

    let credentials = Credentials::from_env().map_err(|e| {
        tracing::error!(error = %e, "startup aborted");
        e
    })?;

    if let Err(e) = nzbguard::run(config, credentials).await {
        tracing::error!(error = %e, "fatal error, exiting");
        return Err(e).context("nzbguard stopped");
    }

    Ok(())
}
