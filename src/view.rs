//! Status output between polling cycles.

use std::io::{self, Write};
use std::time::Duration;

use crate::controller::CycleReport;
use crate::error::{GuardError, Result};

/// Whether the controller should keep polling after an idle period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Renders cycle reports and owns the wait between cycles.
#[async_trait::async_trait]
pub trait StatusView: Send {
    fn show(&mut self, report: &CycleReport) -> Result<()>;

    /// Wait out `interval`. Only interactive views ever return [`Flow::Quit`].
    async fn idle(&mut self, interval: Duration) -> Result<Flow>;
}

/// Plain status lines, one block per cycle.
pub struct ConsoleView<W> {
    out: W,
}

impl ConsoleView<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> ConsoleView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_report(&mut self, report: &CycleReport) -> io::Result<()> {
        if let Some(line) = report.transition_line() {
            writeln!(self.out, "{line}")?;
        }
        if let Some(ack) = report.ack {
            writeln!(self.out, "{ack}")?;
        }
        writeln!(self.out, "{}", report.status_line())?;
        self.out.flush()
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> StatusView for ConsoleView<W> {
    fn show(&mut self, report: &CycleReport) -> Result<()> {
        self.write_report(report).map_err(GuardError::Terminal)
    }

    async fn idle(&mut self, interval: Duration) -> Result<Flow> {
        tokio::time::sleep(interval).await;
        Ok(Flow::Continue)
    }
}
