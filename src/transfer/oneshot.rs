//! The password-authenticated one-shot remote-exec helper.
//!
//! Simple fire-and-forget commands on the gateway (staging directory
//! creation, cleanup) need no interactive driving, so they run through
//! `sshpass` + `ssh` as a plain subprocess with a wall-clock bound instead
//! of a PTY session.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::config::TransferConfig;
use crate::credential::Credential;

use super::HopFailure;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Run `remote_command` on the gateway, bounded by `timeout`.
pub fn gateway_exec(
    config: &TransferConfig,
    credential: &Credential,
    remote_command: &str,
    timeout: Duration,
) -> Result<(), HopFailure> {
    let mut cmd = Command::new("sshpass");
    cmd.arg("-p")
        .arg(credential.expose())
        .arg("ssh")
        .args(&config.ssh_options)
        .arg(&config.gateway)
        .arg(remote_command)
        .stdin(Stdio::null());

    tracing::debug!(gateway = %config.gateway, command = remote_command, "one-shot remote exec");
    run_with_timeout(cmd, timeout)
}

/// Spawn the command and poll until it exits or the deadline passes.
/// On deadline the child is killed and the hop fails as timed out.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<(), HopFailure> {
    let mut child = cmd.spawn().map_err(HopFailure::Io)?;
    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait().map_err(HopFailure::Io)? {
            Some(status) if status.success() => return Ok(()),
            Some(status) => {
                return Err(match status.code() {
                    Some(code) => HopFailure::Exited { code: code as u32 },
                    None => HopFailure::Signaled,
                });
            }
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(HopFailure::TimedOut {
                    tail: String::new(),
                });
            }
            None => std::thread::sleep(POLL_INTERVAL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script).stdout(Stdio::null());
        cmd
    }

    #[test]
    fn zero_exit_is_success() {
        assert!(run_with_timeout(sh("true"), Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn nonzero_exit_reports_the_code() {
        match run_with_timeout(sh("exit 3"), Duration::from_secs(5)) {
            Err(HopFailure::Exited { code }) => assert_eq!(code, 3),
            other => panic!("expected Exited, got {other:?}"),
        }
    }

    #[test]
    fn deadline_kills_the_child() {
        let start = Instant::now();
        let result = run_with_timeout(sh("sleep 30"), Duration::from_millis(300));
        assert!(matches!(result, Err(HopFailure::TimedOut { .. })));
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
