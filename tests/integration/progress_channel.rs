//! Progress frames relayed to a real `stageloader ui-helper` process

use crate::integration::test_utils::env_lock;
use stageloader::ui::{ForkedUi, HelperCommand, LoaderUi, TranscriptUi, UiEvent, UiMessage};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;

const HELPER: &str = env!("CARGO_BIN_EXE_stageloader");

fn helper_command(transcript: &Path) -> HelperCommand {
    HelperCommand::new(HELPER)
        .arg("ui-helper")
        .arg("--transcript")
        .arg(transcript.as_os_str())
}

#[test]
fn test_events_cross_the_process_boundary_in_order() {
    let _guard = env_lock();
    let temp = TempDir::new().unwrap();
    let transcript = temp.path().join("transcript.log");

    let mut ui = ForkedUi::new(helper_command(&transcript)).with_exit_grace(Duration::from_secs(10));
    ui.start();
    assert!(ui.is_connected());
    ui.set_download_size(1000);
    ui.set_downloaded(500);
    ui.set_downloaded(1000);
    ui.complete();

    let status = ui.wait_for_exit().expect("helper exit status");
    assert!(status.success());
    assert_eq!(
        TranscriptUi::read_events(&transcript).unwrap(),
        vec![
            UiEvent::Start,
            UiEvent::DownloadSize(1000),
            UiEvent::Downloaded(500),
            UiEvent::Downloaded(1000),
            UiEvent::Complete,
        ]
    );
}

#[test]
fn test_closed_stdin_completes_helper() {
    let _guard = env_lock();
    let temp = TempDir::new().unwrap();
    let transcript = temp.path().join("transcript.log");

    let mut child = Command::new(HELPER)
        .arg("ui-helper")
        .arg("--transcript")
        .arg(&transcript)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    stdin
        .write_all(&UiMessage::SetDownloadSize(42).encode())
        .unwrap();
    drop(stdin);

    assert!(child.wait().unwrap().success());
    assert_eq!(
        TranscriptUi::read_events(&transcript).unwrap(),
        vec![UiEvent::Start, UiEvent::DownloadSize(42), UiEvent::Complete]
    );
}

#[test]
fn test_truncated_frame_fails_helper_after_completing() {
    let _guard = env_lock();
    let temp = TempDir::new().unwrap();
    let transcript = temp.path().join("transcript.log");

    let mut child = Command::new(HELPER)
        .arg("ui-helper")
        .arg("--transcript")
        .arg(&transcript)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(&[1, 0, 0]).unwrap();
    drop(stdin);

    assert!(!child.wait().unwrap().success());
    assert_eq!(
        TranscriptUi::read_events(&transcript).unwrap(),
        vec![UiEvent::Start, UiEvent::Complete]
    );
}

#[test]
fn test_compare_subcommand() {
    let output = Command::new(HELPER)
        .args(["compare", "1.2.3", "1.2.3-rc.1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), ">");
}
