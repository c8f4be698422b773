//! Progress reporting for downloads and stage upgrades.
//!
//! The loader only talks to the [`LoaderUi`] trait. Concrete windows live outside
//! this crate; what lives here are the plumbing pieces: combinators, a tracing
//! backend, a transcript writer for headless runs, and the forked helper-process
//! channel in [`forked`].

pub mod forked;
pub mod protocol;

pub use forked::{ForkedUi, HelperCommand};
pub use protocol::{serve, UiMessage};

use crate::config::{UiConfig, UiMode};
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Progress UI callbacks, invoked in order: `start`, any number of size/progress
/// updates, then `complete`.
pub trait LoaderUi: Send {
    fn start(&mut self);
    fn set_download_size(&mut self, bytes: u32);
    fn set_downloaded(&mut self, bytes: u32);
    fn complete(&mut self);
}

impl<U: LoaderUi + ?Sized> LoaderUi for Box<U> {
    fn start(&mut self) {
        (**self).start()
    }

    fn set_download_size(&mut self, bytes: u32) {
        (**self).set_download_size(bytes)
    }

    fn set_downloaded(&mut self, bytes: u32) {
        (**self).set_downloaded(bytes)
    }

    fn complete(&mut self) {
        (**self).complete()
    }
}

/// One observed UI callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Start,
    DownloadSize(u32),
    Downloaded(u32),
    Complete,
}

impl fmt::Display for UiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiEvent::Start => write!(f, "start"),
            UiEvent::DownloadSize(bytes) => write!(f, "download_size {}", bytes),
            UiEvent::Downloaded(bytes) => write!(f, "downloaded {}", bytes),
            UiEvent::Complete => write!(f, "complete"),
        }
    }
}

impl FromStr for UiEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let kind = parts.next().ok_or_else(|| "empty event".to_string())?;
        let bytes = || -> Result<u32, String> {
            s.split_whitespace()
                .nth(1)
                .ok_or_else(|| format!("missing byte count in {:?}", s))?
                .parse()
                .map_err(|e| format!("invalid byte count in {:?}: {}", s, e))
        };
        match kind {
            "start" => Ok(UiEvent::Start),
            "download_size" => Ok(UiEvent::DownloadSize(bytes()?)),
            "downloaded" => Ok(UiEvent::Downloaded(bytes()?)),
            "complete" => Ok(UiEvent::Complete),
            other => Err(format!("unknown event {:?}", other)),
        }
    }
}

/// State of one update-and-load run as seen by a UI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSession {
    pub expected: Option<u32>,
    pub transferred: u32,
    pub completed: bool,
}

impl ProgressSession {
    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Start => *self = ProgressSession::default(),
            UiEvent::DownloadSize(bytes) => self.expected = Some(bytes),
            UiEvent::Downloaded(bytes) => self.transferred = bytes,
            UiEvent::Complete => self.completed = true,
        }
    }

    /// Percentage transferred, when the expected size is known and non-zero
    pub fn percent(&self) -> Option<u8> {
        match self.expected {
            Some(expected) if expected > 0 => {
                let pct = (self.transferred as u64 * 100) / expected as u64;
                Some(pct.min(100) as u8)
            }
            _ => None,
        }
    }
}

/// Discards every callback
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUi;

impl LoaderUi for NoopUi {
    fn start(&mut self) {}
    fn set_download_size(&mut self, _bytes: u32) {}
    fn set_downloaded(&mut self, _bytes: u32) {}
    fn complete(&mut self) {}
}

/// Reports progress through `tracing`
#[derive(Debug, Default)]
pub struct TracingUi {
    session: ProgressSession,
}

impl TracingUi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoaderUi for TracingUi {
    fn start(&mut self) {
        self.session.apply(UiEvent::Start);
        info!("Update started");
    }

    fn set_download_size(&mut self, bytes: u32) {
        self.session.apply(UiEvent::DownloadSize(bytes));
        info!(bytes, "Download size");
    }

    fn set_downloaded(&mut self, bytes: u32) {
        self.session.apply(UiEvent::Downloaded(bytes));
        match self.session.percent() {
            Some(percent) => info!(bytes, percent, "Downloaded"),
            None => info!(bytes, "Downloaded"),
        }
    }

    fn complete(&mut self) {
        self.session.apply(UiEvent::Complete);
        info!(transferred = self.session.transferred, "Update complete");
    }
}

/// Keeps every callback in memory; clones share the same log
#[derive(Debug, Default, Clone)]
pub struct RecordingUi {
    events: Arc<Mutex<Vec<UiEvent>>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }
}

impl LoaderUi for RecordingUi {
    fn start(&mut self) {
        self.events.lock().push(UiEvent::Start);
    }

    fn set_download_size(&mut self, bytes: u32) {
        self.events.lock().push(UiEvent::DownloadSize(bytes));
    }

    fn set_downloaded(&mut self, bytes: u32) {
        self.events.lock().push(UiEvent::Downloaded(bytes));
    }

    fn complete(&mut self) {
        self.events.lock().push(UiEvent::Complete);
    }
}

/// Appends one line per callback to a file, flushing after each line
pub struct TranscriptUi {
    file: Option<File>,
}

impl TranscriptUi {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self { file: Some(file) })
    }

    fn record(&mut self, event: UiEvent) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(file, "{}", event).and_then(|_| file.flush()) {
            warn!(error = %e, "Failed to write UI transcript, disabling it");
            self.file = None;
        }
    }

    /// Parse a transcript written by this UI
    pub fn read_events(path: &Path) -> io::Result<Vec<UiEvent>> {
        std::fs::read_to_string(path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                line.parse()
                    .map_err(|e: String| io::Error::new(io::ErrorKind::InvalidData, e))
            })
            .collect()
    }
}

impl LoaderUi for TranscriptUi {
    fn start(&mut self) {
        self.record(UiEvent::Start);
    }

    fn set_download_size(&mut self, bytes: u32) {
        self.record(UiEvent::DownloadSize(bytes));
    }

    fn set_downloaded(&mut self, bytes: u32) {
        self.record(UiEvent::Downloaded(bytes));
    }

    fn complete(&mut self) {
        self.record(UiEvent::Complete);
    }
}

/// Forwards every callback to each inner UI in order
#[derive(Default)]
pub struct FanoutUi {
    uis: Vec<Box<dyn LoaderUi>>,
}

impl FanoutUi {
    pub fn new(uis: Vec<Box<dyn LoaderUi>>) -> Self {
        Self { uis }
    }

    pub fn push(&mut self, ui: Box<dyn LoaderUi>) {
        self.uis.push(ui);
    }
}

impl LoaderUi for FanoutUi {
    fn start(&mut self) {
        self.uis.iter_mut().for_each(|ui| ui.start());
    }

    fn set_download_size(&mut self, bytes: u32) {
        self.uis.iter_mut().for_each(|ui| ui.set_download_size(bytes));
    }

    fn set_downloaded(&mut self, bytes: u32) {
        self.uis.iter_mut().for_each(|ui| ui.set_downloaded(bytes));
    }

    fn complete(&mut self) {
        self.uis.iter_mut().for_each(|ui| ui.complete());
    }
}

/// Rate-limits `set_downloaded`. The most recent value held back by the limit
/// is delivered right before `complete`.
pub struct ThrottledUi<U> {
    inner: U,
    interval: Duration,
    last_update: Option<Instant>,
    held_back: Option<u32>,
}

impl<U: LoaderUi> ThrottledUi<U> {
    pub fn new(inner: U, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            last_update: None,
            held_back: None,
        }
    }

    pub fn into_inner(self) -> U {
        self.inner
    }
}

impl<U: LoaderUi> LoaderUi for ThrottledUi<U> {
    fn start(&mut self) {
        self.inner.start();
    }

    fn set_download_size(&mut self, bytes: u32) {
        self.inner.set_download_size(bytes);
    }

    fn set_downloaded(&mut self, bytes: u32) {
        let now = Instant::now();
        if let Some(last) = self.last_update {
            if now.duration_since(last) <= self.interval {
                self.held_back = Some(bytes);
                return;
            }
        }
        self.last_update = Some(now);
        self.held_back = None;
        self.inner.set_downloaded(bytes);
    }

    fn complete(&mut self) {
        if let Some(bytes) = self.held_back.take() {
            self.inner.set_downloaded(bytes);
        }
        self.inner.complete();
    }
}

/// A UI shared between a stage and the stages it loads, so later stages can
/// relay progress through the window their parent already opened.
#[derive(Clone)]
pub struct SharedUi {
    inner: Arc<Mutex<Box<dyn LoaderUi>>>,
}

impl SharedUi {
    pub fn new(ui: Box<dyn LoaderUi>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ui)),
        }
    }
}

impl Default for SharedUi {
    fn default() -> Self {
        Self::new(Box::new(NoopUi))
    }
}

impl LoaderUi for SharedUi {
    fn start(&mut self) {
        self.inner.lock().start();
    }

    fn set_download_size(&mut self, bytes: u32) {
        self.inner.lock().set_download_size(bytes);
    }

    fn set_downloaded(&mut self, bytes: u32) {
        self.inner.lock().set_downloaded(bytes);
    }

    fn complete(&mut self) {
        self.inner.lock().complete();
    }
}

/// UI selected by the `[ui]` configuration section
pub fn from_config(config: &UiConfig) -> Box<dyn LoaderUi> {
    match config.mode {
        UiMode::Log => Box::new(TracingUi::new()),
        UiMode::None => Box::new(NoopUi),
        UiMode::Forked => match HelperCommand::current_exe() {
            Ok(command) => Box::new(ThrottledUi::new(
                ForkedUi::new(command).with_exit_grace(config.helper_grace()),
                config.throttle(),
            )),
            Err(e) => {
                warn!(error = %e, "Cannot locate UI helper executable, logging progress instead");
                Box::new(TracingUi::new())
            }
        },
    }
}
