//! nzbguard -- pause NZBGet downloads before the disk fills up.
//!
//! A single threshold controller polls free space on one directory every
//! minute and flips NZBGet between paused and resumed over JSON-RPC when the
//! configured hysteresis bounds are crossed. Every error is fatal; run it
//! under a supervisor that restarts it.

pub mod config;
pub mod controller;
pub mod dashboard;
pub mod disk;
pub mod error;
pub mod rpc;
pub mod view;

use crate::config::{Credentials, GuardConfig};
use crate::controller::Controller;
use crate::dashboard::Dashboard;
use crate::disk::StatvfsProbe;
use crate::error::Result;
use crate::rpc::NzbGetClient;
use crate::view::ConsoleView;

/// Start the guard: build the probe and client, then poll until quit or error.
pub async fn run(config: GuardConfig, credentials: Credentials) -> Result<()> {
    config.check();

    let probe = StatvfsProbe::new(&config.monitor.dir);
    let client = NzbGetClient::new(&config.nzbget, &credentials)?;
    tracing::info!(
        dir = %config.monitor.dir.display(),
        target_addr = %client.target(),
        ssl = config.nzbget.ssl,
        dashboard = config.monitor.dashboard,
        "Starting nzbguard"
    );

    let mut controller = Controller::new(probe, client, config.thresholds);
    if config.monitor.dashboard {
        let mut view = Dashboard::enter(&config.monitor.dir)?;
        controller.run(&mut view).await
    } else {
        let mut view = ConsoleView::stdout();
        controller.run(&mut view).await
    }
}
