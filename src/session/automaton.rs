//! The expect/respond state machine driving one spawned interactive process.
//!
//! The automaton polls the stream on a short tick instead of blocking for
//! the full timeout, so it can tell "no event yet, but output is still
//! arriving" apart from "truly stuck": any output resets the idle clock
//! (and widens the budget to the copy timeout the first time), while silence
//! past the current budget ends the session as [`SessionOutcome::TimedOut`].

use std::io;
use std::time::{Duration, Instant};

use crate::credential::Credential;

use super::classify::{SessionEvent, classify};
use super::relay::SessionOutput;

/// Terminal result of driving one spawned process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The shell prompt came back: the command completed.
    Success,
    /// The credential was rejected.
    AuthRejected,
    /// Host key verification failed.
    HostKeyRejected,
    /// A key passphrase prompt intercepted password auth.
    KeyAuthBlocked,
    /// No terminal event within the idle budget. Carries trailing output
    /// for diagnostics.
    TimedOut { tail: String },
    /// The stream ended. Normal completion for one-shot copy commands.
    Eof,
}

/// One chunk read attempt against the live stream.
#[derive(Debug)]
pub enum ReadChunk {
    /// Output arrived.
    Data(String),
    /// Nothing arrived within the poll interval.
    Idle,
    /// The stream is closed.
    Eof,
}

/// The byte stream and input channel of one spawned process.
///
/// The automaton is the sole reader and writer for the lifetime of the
/// process. The production implementation wraps a PTY; tests script one.
pub trait SessionStream {
    /// Wait up to `timeout` for the next chunk of output.
    fn read_chunk(&mut self, timeout: Duration) -> ReadChunk;

    /// Send one line of input (a newline is appended).
    fn send_line(&mut self, line: &str) -> io::Result<()>;
}

/// Idle-time policy for one automaton run.
#[derive(Debug, Clone, Copy)]
pub struct SessionBudgets {
    /// Tolerated silence before any activity has been observed.
    pub initial: Duration,
    /// Tolerated silence once the transfer is believed to be running.
    pub copy: Duration,
    /// Poll interval.
    pub tick: Duration,
}

impl Default for SessionBudgets {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(30),
            copy: Duration::from_secs(600),
            tick: Duration::from_secs(2),
        }
    }
}

impl SessionBudgets {
    /// Budgets for a long-running bulk copy.
    pub fn copy_transfer() -> Self {
        Self {
            copy: Duration::from_secs(1200),
            ..Self::default()
        }
    }

    /// Budgets for quick control commands (login, mkdir, exit).
    pub fn control() -> Self {
        Self {
            initial: Duration::from_secs(10),
            copy: Duration::from_secs(60),
            ..Self::default()
        }
    }
}

/// Cap on the trailing output kept for timeout diagnostics.
const TAIL_LIMIT: usize = 4096;

/// Drives one spawned process through the prompt vocabulary until a
/// terminal outcome is reached.
pub struct Automaton<'a> {
    label: &'a str,
    credential: &'a Credential,
    budgets: SessionBudgets,
}

impl<'a> Automaton<'a> {
    pub fn new(label: &'a str, credential: &'a Credential, budgets: SessionBudgets) -> Self {
        Self {
            label,
            credential,
            budgets,
        }
    }

    /// Run until a terminal outcome. Output is relayed through `output`,
    /// which is flushed and cleared before returning.
    pub fn drive(
        &self,
        stream: &mut dyn SessionStream,
        output: &mut SessionOutput,
    ) -> io::Result<SessionOutcome> {
        // Unconsumed output since the last handled event.
        let mut scan = String::new();
        let mut tail = String::new();
        let mut last_activity = Instant::now();
        let mut budget = self.budgets.initial;

        let outcome = loop {
            match stream.read_chunk(self.budgets.tick) {
                ReadChunk::Data(chunk) => {
                    output.write(&chunk);
                    push_tail(&mut tail, &chunk);
                    scan.push_str(&chunk);
                    last_activity = Instant::now();
                    // Any observed output is taken as transfer progress;
                    // from here on only the wide budget applies. Sporadic
                    // noise from a hung command defeats this heuristic.
                    budget = self.budgets.copy;

                    match classify(&scan) {
                        Some(SessionEvent::PasswordPrompt) => {
                            stream.send_line(self.credential.expose())?;
                            scan.clear();
                        }
                        Some(SessionEvent::HostKeyConfirm) => {
                            stream.send_line("yes")?;
                            scan.clear();
                        }
                        Some(SessionEvent::PermissionDenied) => {
                            break SessionOutcome::AuthRejected;
                        }
                        Some(SessionEvent::HostKeyFailed) => {
                            break SessionOutcome::HostKeyRejected;
                        }
                        Some(SessionEvent::PassphrasePrompt) => {
                            break SessionOutcome::KeyAuthBlocked;
                        }
                        Some(SessionEvent::ShellPrompt) => {
                            break SessionOutcome::Success;
                        }
                        None => {}
                    }
                }
                ReadChunk::Idle => {
                    let idle = last_activity.elapsed();
                    if idle > budget {
                        tracing::warn!(
                            step = self.label,
                            idle_secs = idle.as_secs(),
                            "session idle budget exhausted"
                        );
                        break SessionOutcome::TimedOut { tail };
                    }
                    output.idle_tick(self.label, idle);
                }
                ReadChunk::Eof => break SessionOutcome::Eof,
            }
        };

        output.finish();
        tracing::debug!(step = self.label, outcome = discriminant_name(&outcome), "session finished");
        Ok(outcome)
    }
}

fn push_tail(tail: &mut String, chunk: &str) {
    tail.push_str(chunk);
    if tail.len() > TAIL_LIMIT {
        let cut = tail.len() - TAIL_LIMIT;
        let boundary = (cut..tail.len())
            .find(|i| tail.is_char_boundary(*i))
            .unwrap_or(tail.len());
        tail.drain(..boundary);
    }
}

fn discriminant_name(outcome: &SessionOutcome) -> &'static str {
    match outcome {
        SessionOutcome::Success => "success",
        SessionOutcome::AuthRejected => "auth_rejected",
        SessionOutcome::HostKeyRejected => "host_key_rejected",
        SessionOutcome::KeyAuthBlocked => "key_auth_blocked",
        SessionOutcome::TimedOut { .. } => "timed_out",
        SessionOutcome::Eof => "eof",
    }
}
