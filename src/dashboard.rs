//! Terminal dashboard: a single gauge of disk usage, coloured by controller state.
//!
//! Takes over the terminal (raw mode + alternate screen) for its lifetime and
//! restores it on drop. Between cycles it waits on the crossterm event queue,
//! which doubles as the quit mechanism: `q`, `Esc` or Ctrl-C end the loop.

use std::io::{self, Stdout, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};

use crate::controller::{ControllerState, CycleReport};
use crate::error::{GuardError, Result};
use crate::view::{Flow, StatusView};

const FILLED: char = '█';
const EMPTY: char = '░';

pub struct Dashboard {
    out: Stdout,
    title: String,
    last: Option<CycleReport>,
}

impl Dashboard {
    /// Switch the terminal into dashboard mode.
    pub fn enter(dir: &Path) -> Result<Self> {
        let mut out = io::stdout();
        terminal::enable_raw_mode().map_err(GuardError::Terminal)?;
        execute!(out, EnterAlternateScreen, Hide).map_err(GuardError::Terminal)?;
        Ok(Self {
            out,
            title: format!(" nzbguard: {} ", dir.display()),
            last: None,
        })
    }

    fn draw(&mut self) -> io::Result<()> {
        let (width, _) = terminal::size()?;
        let inner = width.saturating_sub(2) as usize;

        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        queue!(self.out, Print(top_border(&self.title, inner)))?;

        if let Some(report) = &self.last {
            let percent = report.usage.percent_used();
            queue!(
                self.out,
                MoveTo(0, 1),
                Print('│'),
                SetForegroundColor(state_color(report.state)),
                Print(gauge_bar(percent, inner)),
                ResetColor,
                Print('│'),
                MoveTo(0, 2),
                Print(bottom_border(inner)),
                MoveTo(1, 3),
                SetForegroundColor(state_color(report.state)),
                Print(gauge_label(report)),
                ResetColor,
                MoveTo(1, 4),
                Print(report.status_line()),
            )?;
        } else {
            queue!(self.out, MoveTo(0, 2), Print(bottom_border(inner)))?;
        }

        queue!(self.out, MoveTo(1, 6), Print("press q to quit"))?;
        self.out.flush()
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

#[async_trait::async_trait]
impl StatusView for Dashboard {
    fn show(&mut self, report: &CycleReport) -> Result<()> {
        self.last = Some(report.clone());
        self.draw().map_err(GuardError::Terminal)
    }

    async fn idle(&mut self, interval: Duration) -> Result<Flow> {
        let deadline = Instant::now() + interval;
        loop {
            let input = tokio::task::spawn_blocking(move || next_input(deadline))
                .await
                .map_err(|e| GuardError::Terminal(io::Error::new(io::ErrorKind::Other, e)))?
                .map_err(GuardError::Terminal)?;

            match input {
                Input::Elapsed => return Ok(Flow::Continue),
                Input::Quit => return Ok(Flow::Quit),
                Input::Resize => self.draw().map_err(GuardError::Terminal)?,
            }
        }
    }
}

enum Input {
    Elapsed,
    Quit,
    Resize,
}

/// Block on the event queue until `deadline`, a quit key, or a resize.
fn next_input(deadline: Instant) -> io::Result<Input> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || !event::poll(remaining)? {
            return Ok(Input::Elapsed);
        }
        match event::read()? {
            Event::Key(key) if is_quit_key(&key) => return Ok(Input::Quit),
            Event::Resize(_, _) => return Ok(Input::Resize),
            _ => {}
        }
    }
}

fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn state_color(state: ControllerState) -> Color {
    match state {
        ControllerState::Paused => Color::Red,
        ControllerState::Unpaused => Color::Green,
    }
}

fn gauge_bar(percent: u8, width: usize) -> String {
    let percent = percent.min(100) as usize;
    let filled = width * percent / 100;
    let mut bar = String::with_capacity(width * FILLED.len_utf8());
    bar.extend(std::iter::repeat(FILLED).take(filled));
    bar.extend(std::iter::repeat(EMPTY).take(width - filled));
    bar
}

fn gauge_label(report: &CycleReport) -> String {
    let used_gb = report.usage.total_gb().saturating_sub(report.available_gb());
    format!(
        "{}% used ({} / {} GB), downloads {}",
        report.usage.percent_used(),
        used_gb,
        report.usage.total_gb(),
        report.state
    )
}

fn top_border(title: &str, inner: usize) -> String {
    let title: String = title.chars().take(inner).collect();
    let pad = inner - title.chars().count();
    format!("┌{title}{}┐", "─".repeat(pad))
}

fn bottom_border(inner: usize) -> String {
    format!("└{}┘", "─".repeat(inner))
}
