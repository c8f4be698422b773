//! Progress UI hosted in a separate helper process.
//!
//! Some hosts cannot run a windowing toolkit in the same process as the code being
//! loaded. [`ForkedUi`] spawns a throwaway helper that only runs the UI and drives
//! it over the helper's stdin using [`crate::ui::protocol`]. Progress reporting is
//! best effort: if the helper cannot be started or stops accepting input, the
//! channel is torn down and later updates are dropped.

use crate::ui::protocol::UiMessage;
use crate::ui::LoaderUi;
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// How long a completed helper gets to exit on its own before it is killed
pub const DEFAULT_EXIT_GRACE: Duration = Duration::from_secs(5);

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Program and arguments used to launch the UI helper
#[derive(Debug, Clone)]
pub struct HelperCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl HelperCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// The running executable's `ui-helper` subcommand
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg("ui-helper"))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn spawn(&self) -> io::Result<Child> {
        debug!(program = %self.program.display(), args = ?self.args, "Starting UI helper");
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
    }
}

struct HelperChannel {
    child: Child,
    stdin: ChildStdin,
}

impl HelperChannel {
    fn open(command: &HelperCommand) -> io::Result<Self> {
        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "helper stdin unavailable"))?;

        if let Some(stderr) = child.stderr.take() {
            let spawned = thread::Builder::new()
                .name("ui-helper-log-forwarder".to_string())
                .spawn(move || forward_helper_log(stderr));
            if let Err(e) = spawned {
                warn!(error = %e, "Failed to start UI helper log forwarder");
            }
        }

        Ok(Self { child, stdin })
    }

    fn destroy(mut self) {
        drop(self.stdin);
        if let Err(e) = self.child.kill() {
            debug!(error = %e, "UI helper already gone");
        }
        let _ = self.child.wait();
    }
}

fn forward_helper_log(stderr: impl io::Read) {
    for line in BufReader::new(stderr).lines() {
        match line {
            Ok(line) => error!(target: "stageloader::ui::helper", "{}", line),
            Err(e) => {
                warn!(error = %e, "Error in UI helper log forwarding");
                break;
            }
        }
    }
}

/// [`LoaderUi`] that relays every callback to a helper process
pub struct ForkedUi {
    command: HelperCommand,
    exit_grace: Duration,
    channel: Option<HelperChannel>,
    reaper: Option<JoinHandle<Option<ExitStatus>>>,
}

impl ForkedUi {
    pub fn new(command: HelperCommand) -> Self {
        Self {
            command,
            exit_grace: DEFAULT_EXIT_GRACE,
            channel: None,
            reaper: None,
        }
    }

    pub fn with_exit_grace(mut self, grace: Duration) -> Self {
        self.exit_grace = grace;
        self
    }

    /// Whether a helper is currently connected
    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Block until the helper started by the last `complete` has been reaped.
    ///
    /// Returns the helper's exit status, or `None` if it was killed after the
    /// grace period, never started, or could not be waited on.
    pub fn wait_for_exit(&mut self) -> Option<ExitStatus> {
        self.reaper.take()?.join().ok().flatten()
    }

    fn send(&mut self, message: UiMessage) {
        let Some(channel) = self.channel.as_mut() else {
            return;
        };
        if let Err(e) = message.write_to(&mut channel.stdin) {
            warn!(?message, error = %e, "UI helper stopped accepting updates, disabling it");
            if let Some(channel) = self.channel.take() {
                channel.destroy();
            }
        }
    }
}

impl LoaderUi for ForkedUi {
    fn start(&mut self) {
        if self.channel.is_some() {
            return;
        }
        match HelperChannel::open(&self.command) {
            Ok(channel) => self.channel = Some(channel),
            Err(e) => warn!(error = %e, "Failed to start UI helper process"),
        }
    }

    fn set_download_size(&mut self, bytes: u32) {
        self.send(UiMessage::SetDownloadSize(bytes));
    }

    fn set_downloaded(&mut self, bytes: u32) {
        self.send(UiMessage::SetDownloaded(bytes));
    }

    fn complete(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };
        if let Err(e) = UiMessage::Complete.write_to(&mut channel.stdin) {
            warn!(error = %e, "Failed to send completion to UI helper");
        }

        let grace = self.exit_grace;
        let spawned = thread::Builder::new()
            .name("ui-helper-reaper".to_string())
            .spawn(move || reap(channel, grace));
        match spawned {
            Ok(handle) => self.reaper = Some(handle),
            Err(e) => warn!(error = %e, "Failed to start UI helper reaper"),
        }
    }
}

impl Drop for ForkedUi {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.destroy();
        }
    }
}

fn reap(channel: HelperChannel, grace: Duration) -> Option<ExitStatus> {
    let HelperChannel { mut child, stdin } = channel;
    // closing stdin is end-of-input for the helper
    drop(stdin);

    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%status, "UI helper exited");
                return Some(status);
            }
            Ok(None) if Instant::now() < deadline => thread::sleep(REAP_POLL_INTERVAL),
            Ok(None) => {
                warn!(grace_secs = grace.as_secs(), "UI helper did not exit in time, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to wait for UI helper");
                return None;
            }
        }
    }
}
