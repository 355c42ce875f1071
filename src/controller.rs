//! Threshold controller: the pause/resume decision loop.
//!
//! Two states, `Unpaused` (initial) and `Paused`. Each polling cycle takes one
//! free-space reading in whole GB and:
//!
//! - `Unpaused` and reading `< pause_gb`   -> `pausedownload`, become `Paused`
//! - `Paused` and reading `> unpause_gb`   -> `resumedownload`, become `Unpaused`
//! - anything else                         -> no call, state unchanged
//!
//! The gap between the two thresholds is the hysteresis band. State is held
//! in memory only and starts as `Unpaused` on every launch, whatever NZBGet's
//! actual state is.
//!
//! Any probe or remote error is returned to the caller untouched. The daemon
//! exits on it and expects to be restarted by its supervisor.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{ThresholdConfig, POLL_INTERVAL};
use crate::disk::{DiskSpaceSource, DiskUsage};
use crate::error::Result;
use crate::rpc::{Action, RemoteControlClient};
use crate::view::{Flow, StatusView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Unpaused,
    Paused,
}

impl ControllerState {
    pub fn is_paused(&self) -> bool {
        matches!(self, ControllerState::Paused)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Unpaused => write!(f, "unpaused"),
            ControllerState::Paused => write!(f, "paused"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Pause,
    Resume,
}

impl Transition {
    pub fn action(&self) -> Action {
        match self {
            Transition::Pause => Action::PauseDownload,
            Transition::Resume => Action::ResumeDownload,
        }
    }

    /// State the controller lands in once the remote call succeeds.
    pub fn target(&self) -> ControllerState {
        match self {
            Transition::Pause => ControllerState::Paused,
            Transition::Resume => ControllerState::Unpaused,
        }
    }
}

/// Pure transition rule. `available_gb` is whole gigabytes, truncated.
pub fn decide(
    state: ControllerState,
    available_gb: u64,
    thresholds: &ThresholdConfig,
) -> Option<Transition> {
    match state {
        ControllerState::Unpaused if available_gb < thresholds.pause_gb => Some(Transition::Pause),
        ControllerState::Paused if available_gb > thresholds.unpause_gb => {
            Some(Transition::Resume)
        }
        _ => None,
    }
}

/// Outcome of one polling cycle, handed to the status view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub usage: DiskUsage,
    /// State after the cycle.
    pub state: ControllerState,
    pub transition: Option<Transition>,
    /// Remote acknowledgment, present only when a call was made.
    pub ack: Option<bool>,
    pub thresholds: ThresholdConfig,
}

impl CycleReport {
    pub fn available_gb(&self) -> u64 {
        self.usage.available_gb()
    }

    /// Line announcing the transition taken this cycle, if any.
    pub fn transition_line(&self) -> Option<String> {
        let free = self.available_gb();
        self.transition.map(|t| match t {
            Transition::Pause => format!(
                "Pausing downloads: current free disk space is {free} GB. Threshold to pause ({} GB) reached.",
                self.thresholds.pause_gb
            ),
            Transition::Resume => format!(
                "Resuming downloads: current free disk space is {free} GB. Threshold to unpause ({} GB) reached.",
                self.thresholds.unpause_gb
            ),
        })
    }

    /// Steady-state line naming the threshold that governs the next transition.
    pub fn status_line(&self) -> String {
        let free = self.available_gb();
        match self.state {
            ControllerState::Paused => format!(
                "Downloads paused, current free disk space is {free} GB. Threshold to unpause ({} GB) has not been reached.",
                self.thresholds.unpause_gb
            ),
            ControllerState::Unpaused => format!(
                "Nothing to see here, current free disk space is {free} GB. Threshold to pause ({} GB) has not been reached.",
                self.thresholds.pause_gb
            ),
        }
    }
}

/// Owns the paused/unpaused state and its two collaborators.
pub struct Controller<D, R> {
    probe: D,
    client: R,
    thresholds: ThresholdConfig,
    state: ControllerState,
    interval: Duration,
}

impl<D, R> Controller<D, R>
where
    D: DiskSpaceSource,
    R: RemoteControlClient,
{
    pub fn new(probe: D, client: R, thresholds: ThresholdConfig) -> Self {
        Self {
            probe,
            client,
            thresholds,
            state: ControllerState::default(),
            interval: POLL_INTERVAL,
        }
    }

    /// Override the wait between cycles. Tests only; the daemon always uses [`POLL_INTERVAL`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Probe, evaluate, and act once. Does not wait.
    ///
    /// On error the state is left as it was before the cycle.
    pub async fn poll_once(&mut self) -> Result<CycleReport> {
        let usage = self.probe.usage()?;
        let available_gb = usage.available_gb();

        let transition = decide(self.state, available_gb, &self.thresholds);
        let mut ack = None;

        if let Some(t) = transition {
            let action = t.action();
            match t {
                Transition::Pause => info!(
                    free_gb = available_gb,
                    pause_gb = self.thresholds.pause_gb,
                    "pause threshold reached, pausing downloads"
                ),
                Transition::Resume => info!(
                    free_gb = available_gb,
                    unpause_gb = self.thresholds.unpause_gb,
                    "unpause threshold reached, resuming downloads"
                ),
            }

            let acknowledged = self.client.call(action).await?;
            if !acknowledged {
                warn!(method = action.method(), "remote did not acknowledge action");
            }
            self.state = t.target();
            ack = Some(acknowledged);
        } else {
            debug!(free_gb = available_gb, state = %self.state, "no threshold crossed");
        }

        Ok(CycleReport {
            usage,
            state: self.state,
            transition,
            ack,
            thresholds: self.thresholds,
        })
    }

    /// Run polling cycles until the view asks to quit or an error occurs.
    pub async fn run(&mut self, view: &mut dyn StatusView) -> Result<()> {
        info!(
            path = %self.probe.path().display(),
            pause_gb = self.thresholds.pause_gb,
            unpause_gb = self.thresholds.unpause_gb,
            interval_secs = self.interval.as_secs(),
            "threshold controller started"
        );

        loop {
            let report = self.poll_once().await?;
            view.show(&report)?;
            if view.idle(self.interval).await? == Flow::Quit {
                info!("quit requested, stopping controller");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuardError;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    const TOTAL_GB: u64 = 500;

    fn thresholds() -> ThresholdConfig {
        ThresholdConfig {
            pause_gb: 10,
            unpause_gb: 50,
        }
    }

    /// Returns scripted readings in order; errors once they run out.
    struct ScriptedProbe {
        readings: Mutex<VecDeque<u64>>,
        path: PathBuf,
    }

    impl ScriptedProbe {
        fn new(readings: &[u64]) -> Self {
            Self {
                readings: Mutex::new(readings.iter().copied().collect()),
                path: PathBuf::from("/data"),
            }
        }
    }

    impl DiskSpaceSource for ScriptedProbe {
        fn usage(&self) -> Result<DiskUsage> {
            match self.readings.lock().unwrap().pop_front() {
                Some(gb) => Ok(DiskUsage::from_gb(gb, TOTAL_GB)),
                None => Err(GuardError::Io {
                    path: self.path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no more readings"),
                }),
            }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    #[derive(Clone)]
    struct RecordingClient {
        calls: Arc<Mutex<Vec<Action>>>,
        ack: bool,
        fail: bool,
    }

    impl RecordingClient {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                ack: true,
                fail: false,
            }
        }

        fn calls(&self) -> Vec<Action> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl RemoteControlClient for RecordingClient {
        async fn call(&self, action: Action) -> Result<bool> {
            self.calls.lock().unwrap().push(action);
            if self.fail {
                return Err(GuardError::Protocol("remote error: boom".into()));
            }
            Ok(self.ack)
        }
    }

    /// Records every report and quits after `cycles` idles.
    struct CountingView {
        reports: Vec<CycleReport>,
        cycles: usize,
    }

    #[async_trait::async_trait]
    impl StatusView for CountingView {
        fn show(&mut self, report: &CycleReport) -> Result<()> {
            self.reports.push(report.clone());
            Ok(())
        }

        async fn idle(&mut self, _interval: Duration) -> Result<Flow> {
            if self.reports.len() >= self.cycles {
                Ok(Flow::Quit)
            } else {
                Ok(Flow::Continue)
            }
        }
    }

    fn controller(
        readings: &[u64],
        client: &RecordingClient,
    ) -> Controller<ScriptedProbe, RecordingClient> {
        Controller::new(ScriptedProbe::new(readings), client.clone(), thresholds())
            .with_interval(Duration::ZERO)
    }

    #[test]
    fn test_decide_below_pause_when_unpaused() {
        for gb in 0..10 {
            assert_eq!(
                decide(ControllerState::Unpaused, gb, &thresholds()),
                Some(Transition::Pause)
            );
        }
    }

    #[test]
    fn test_decide_above_unpause_when_paused() {
        for gb in [51, 55, 1000, u64::MAX] {
            assert_eq!(
                decide(ControllerState::Paused, gb, &thresholds()),
                Some(Transition::Resume)
            );
        }
    }

    #[test]
    fn test_decide_band_is_idle_in_both_states() {
        for gb in 10..=50 {
            assert_eq!(decide(ControllerState::Unpaused, gb, &thresholds()), None);
            assert_eq!(decide(ControllerState::Paused, gb, &thresholds()), None);
        }
    }

    #[test]
    fn test_decide_boundary_already_reached() {
        assert_eq!(decide(ControllerState::Paused, 3, &thresholds()), None);
        assert_eq!(decide(ControllerState::Unpaused, 80, &thresholds()), None);
    }

    #[tokio::test]
    async fn test_initial_state_is_unpaused() {
        let client = RecordingClient::new();
        let ctl = controller(&[], &client);
        assert_eq!(ctl.state(), ControllerState::Unpaused);
    }

    #[tokio::test]
    async fn test_scenario_pause_at_8gb() {
        let client = RecordingClient::new();
        let mut ctl = controller(&[8], &client);

        let report = ctl.poll_once().await.unwrap();

        assert_eq!(client.calls(), vec![Action::PauseDownload]);
        assert_eq!(ctl.state(), ControllerState::Paused);
        assert_eq!(report.transition, Some(Transition::Pause));
        assert_eq!(report.ack, Some(true));
        assert_eq!(report.available_gb(), 8);
    }

    #[tokio::test]
    async fn test_scenario_stay_paused_at_30gb() {
        let client = RecordingClient::new();
        let mut ctl = controller(&[8, 30], &client);
        ctl.poll_once().await.unwrap();

        let report = ctl.poll_once().await.unwrap();

        assert_eq!(client.calls(), vec![Action::PauseDownload]);
        assert_eq!(ctl.state(), ControllerState::Paused);
        assert_eq!(report.transition, None);
        assert_eq!(report.ack, None);
    }

    #[tokio::test]
    async fn test_scenario_resume_at_55gb() {
        let client = RecordingClient::new();
        let mut ctl = controller(&[8, 55], &client);
        ctl.poll_once().await.unwrap();

        let report = ctl.poll_once().await.unwrap();

        assert_eq!(
            client.calls(),
            vec![Action::PauseDownload, Action::ResumeDownload]
        );
        assert_eq!(ctl.state(), ControllerState::Unpaused);
        assert_eq!(report.transition, Some(Transition::Resume));
    }

    #[tokio::test]
    async fn test_no_duplicate_calls_once_boundary_reached() {
        let client = RecordingClient::new();
        let mut ctl = controller(&[5, 4, 3, 9, 60, 70, 51], &client);

        for _ in 0..7 {
            ctl.poll_once().await.unwrap();
        }

        assert_eq!(
            client.calls(),
            vec![Action::PauseDownload, Action::ResumeDownload]
        );
        assert_eq!(ctl.state(), ControllerState::Unpaused);
    }

    #[tokio::test]
    async fn test_band_readings_never_call_from_unpaused() {
        let client = RecordingClient::new();
        let mut ctl = controller(&[10, 25, 50], &client);
        for _ in 0..3 {
            ctl.poll_once().await.unwrap();
        }
        assert!(client.calls().is_empty());
        assert_eq!(ctl.state(), ControllerState::Unpaused);
    }

    #[tokio::test]
    async fn test_false_ack_still_transitions() {
        let mut client = RecordingClient::new();
        client.ack = false;
        let mut ctl = controller(&[1], &client);

        let report = ctl.poll_once().await.unwrap();

        assert_eq!(report.ack, Some(false));
        assert_eq!(ctl.state(), ControllerState::Paused);
    }

    #[tokio::test]
    async fn test_remote_error_propagates_and_keeps_state() {
        let mut client = RecordingClient::new();
        client.fail = true;
        let mut ctl = controller(&[1], &client);

        let err = ctl.poll_once().await.unwrap_err();

        assert!(matches!(err, GuardError::Protocol(_)));
        assert_eq!(ctl.state(), ControllerState::Unpaused);
        assert_eq!(client.calls(), vec![Action::PauseDownload]);
    }

    #[tokio::test]
    async fn test_probe_error_propagates_without_call() {
        let client = RecordingClient::new();
        let mut ctl = controller(&[], &client);

        let err = ctl.poll_once().await.unwrap_err();

        assert!(matches!(err, GuardError::Io { .. }));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_when_view_quits() {
        let client = RecordingClient::new();
        let mut ctl = controller(&[40, 8, 20, 60], &client);
        let mut view = CountingView {
            reports: Vec::new(),
            cycles: 4,
        };

        ctl.run(&mut view).await.unwrap();

        let states: Vec<_> = view.reports.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![
                ControllerState::Unpaused,
                ControllerState::Paused,
                ControllerState::Paused,
                ControllerState::Unpaused,
            ]
        );
        assert_eq!(
            client.calls(),
            vec![Action::PauseDownload, Action::ResumeDownload]
        );
    }

    #[tokio::test]
    async fn test_run_is_fatal_on_probe_error() {
        let client = RecordingClient::new();
        let mut ctl = controller(&[30, 30], &client);
        let mut view = CountingView {
            reports: Vec::new(),
            cycles: usize::MAX,
        };

        let err = ctl.run(&mut view).await.unwrap_err();

        assert!(matches!(err, GuardError::Io { .. }));
        assert_eq!(view.reports.len(), 2);
    }

    #[test]
    fn test_status_lines() {
        let mut report = CycleReport {
            usage: DiskUsage::from_gb(8, TOTAL_GB),
            state: ControllerState::Paused,
            transition: Some(Transition::Pause),
            ack: Some(true),
            thresholds: thresholds(),
        };
        assert_eq!(
            report.transition_line().unwrap(),
            "Pausing downloads: current free disk space is 8 GB. Threshold to pause (10 GB) reached."
        );
        assert_eq!(
            report.status_line(),
            "Downloads paused, current free disk space is 8 GB. Threshold to unpause (50 GB) has not been reached."
        );

        report.usage = DiskUsage::from_gb(55, TOTAL_GB);
        report.state = ControllerState::Unpaused;
        report.transition = Some(Transition::Resume);
        assert_eq!(
            report.transition_line().unwrap(),
            "Resuming downloads: current free disk space is 55 GB. Threshold to unpause (50 GB) reached."
        );
        assert_eq!(
            report.status_line(),
            "Nothing to see here, current free disk space is 55 GB. Threshold to pause (10 GB) has not been reached."
        );

        report.transition = None;
        assert!(report.transition_line().is_none());
    }
}
