//! PTY session tests against real child processes

use nix::sys::signal::Signal;
use ptyhost_pty::{ChildStatus, PtySession, SessionBuilder};
use ptyhost_test_utils::{init_test_logging, TerminalCapture, TestFixtures};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn session_running(fixtures: &TestFixtures, body: &str) -> SessionBuilder {
    let script = fixtures
        .create_test_script("shell.sh", body)
        .expect("Should write script");
    SessionBuilder::new().shell(script).size_source(None)
}

#[test]
fn test_shell_output_reaches_master() {
    init_test_logging();
    let fixtures = TestFixtures::new().unwrap();
    let session = session_running(&fixtures, "echo ready-$((1 + 1))")
        .build()
        .expect("Should spawn shell");

    let mut capture = TerminalCapture::new();
    capture
        .wait_for(session.master().unwrap(), "ready-2", TIMEOUT)
        .unwrap();
}

#[test]
fn test_input_written_to_master_reaches_shell() {
    init_test_logging();
    let session = SessionBuilder::new()
        .shell("/bin/sh")
        .size_source(None)
        .build()
        .expect("Should spawn shell");

    session.write(b"echo from-$((40 + 2))\n").unwrap();

    let mut capture = TerminalCapture::new();
    capture
        .wait_for(session.master().unwrap(), "from-42", TIMEOUT)
        .unwrap();
}

#[test]
fn test_slave_echo_is_disabled() {
    init_test_logging();
    let fixtures = TestFixtures::new().unwrap();
    let session = session_running(&fixtures, "stty -a; echo done")
        .build()
        .unwrap();

    let mut capture = TerminalCapture::new();
    capture
        .wait_for(session.master().unwrap(), "done", TIMEOUT)
        .unwrap();
    assert!(capture.text().contains("-echo "), "stty output: {}", capture.text());
}

#[test]
fn test_initial_and_resized_geometry() {
    init_test_logging();
    let fixtures = TestFixtures::new().unwrap();
    let session = session_running(&fixtures, "stty size; read line; stty size")
        .dimensions(33, 101)
        .build()
        .unwrap();
    let master = session.master().unwrap();

    let mut capture = TerminalCapture::new();
    capture.wait_for(master, "33 101", TIMEOUT).unwrap();

    session.resize_to(44, 120).unwrap();
    session.write(b"\n").unwrap();
    capture.wait_for(master, "44 120", TIMEOUT).unwrap();
}

#[test]
fn test_interrupt_reaches_foreground_job() {
    init_test_logging();
    let fixtures = TestFixtures::new().unwrap();
    let mut session = session_running(
        &fixtures,
        "trap 'echo got-int; exit 3' INT\necho armed\nwhile :; do sleep 0.1; done",
    )
    .build()
    .unwrap();

    let mut capture = TerminalCapture::new();
    capture
        .wait_for(session.master().unwrap(), "armed", TIMEOUT)
        .unwrap();

    session.signal(Signal::SIGINT).unwrap();
    capture
        .wait_for(session.master().unwrap(), "got-int", TIMEOUT)
        .unwrap();

    // Wait for the slave to hang up so the trap has run to completion
    capture.drain(session.master().unwrap(), TIMEOUT).unwrap();
    assert!(capture.is_closed());

    session.close().unwrap();
    assert_eq!(session.status(), Some(ChildStatus::Exited(3)));
}

#[test]
fn test_close_escalates_for_stubborn_child() {
    init_test_logging();
    let fixtures = TestFixtures::new().unwrap();
    let mut session = session_running(
        &fixtures,
        "trap '' TERM HUP\necho stubborn\nwhile :; do sleep 0.1; done",
    )
    .reap_grace(Duration::from_millis(100))
    .build()
    .unwrap();

    let mut capture = TerminalCapture::new();
    capture
        .wait_for(session.master().unwrap(), "stubborn", TIMEOUT)
        .unwrap();

    session.close().unwrap();
    assert_eq!(session.status(), Some(ChildStatus::Signaled(Signal::SIGKILL)));
    assert!(session.pid().is_none());
}

#[test]
fn test_open_uses_fallback_geometry_without_terminal() {
    init_test_logging();
    let fixtures = TestFixtures::new().unwrap();
    let script = fixtures.create_test_script("size.sh", "stty size").unwrap();

    // stdout of a test binary is usually a pipe; either way a size is set
    let session = PtySession::open(&script).unwrap();

    let mut capture = TerminalCapture::new();
    capture.drain(session.master().unwrap(), Duration::from_millis(500)).unwrap();
    let text = capture.text();
    let mut parts = text.split_whitespace().map(|n| n.parse::<u16>().unwrap_or(0));
    assert!(parts.next().unwrap_or(0) > 0, "unexpected size output: {text}");
    assert!(parts.next().unwrap_or(0) > 0, "unexpected size output: {text}");
}
