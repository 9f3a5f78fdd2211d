//! PTY-backed [`SessionStream`] implementation.
//!
//! ssh only prompts for a password when it believes it is talking to a
//! terminal, so every interactive process is spawned onto its own
//! pseudo-terminal. A dedicated reader thread feeds decoded chunks into a
//! bounded channel; `read_chunk` is then a plain bounded-timeout receive,
//! which gives the automaton its poll tick without non-blocking I/O.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use portable_pty::{CommandBuilder, ExitStatus, MasterPty, PtySize, native_pty_system};
use thiserror::Error;

use super::automaton::{ReadChunk, SessionStream};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to allocate a pty: {0}")]
    Pty(anyhow::Error),

    #[error("failed to spawn {program}: {cause}")]
    Spawn {
        program: String,
        cause: anyhow::Error,
    },

    #[error("i/o error driving session: {0}")]
    Io(#[from] std::io::Error),
}

/// One spawned interactive process and its exclusively-owned PTY pair.
pub struct PtySession {
    // Held for the lifetime of the child; dropping it closes the PTY.
    _master: Box<dyn MasterPty + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    chunks: Receiver<String>,
}

impl PtySession {
    /// Spawn `program` with `args` on a fresh PTY.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, SessionError> {
        let pty = native_pty_system();
        let pair = pty
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(SessionError::Pty)?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        let child = pair.slave.spawn_command(cmd).map_err(|cause| {
            SessionError::Spawn {
                program: program.to_string(),
                cause,
            }
        })?;
        // The slave side lives on in the child; keeping it open here would
        // hold the PTY open past child exit and mask EOF.
        drop(pair.slave);

        let mut reader = pair.master.try_clone_reader().map_err(SessionError::Pty)?;
        let writer = pair.master.take_writer().map_err(SessionError::Pty)?;

        let (tx, rx) = bounded::<String>(64);
        thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                        if tx.send(chunk).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        tracing::debug!(program, "spawned interactive session");
        Ok(Self {
            _master: pair.master,
            child,
            writer,
            chunks: rx,
        })
    }

    /// Wait for the child to exit and return its status.
    pub fn wait(&mut self) -> Result<ExitStatus, SessionError> {
        Ok(self.child.wait()?)
    }

    /// Kill the child if it is still running.
    pub fn terminate(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
    }
}

impl SessionStream for PtySession {
    fn read_chunk(&mut self, timeout: Duration) -> ReadChunk {
        match self.chunks.recv_timeout(timeout) {
            Ok(data) => ReadChunk::Data(data),
            Err(RecvTimeoutError::Timeout) => ReadChunk::Idle,
            Err(RecvTimeoutError::Disconnected) => ReadChunk::Eof,
        }
    }

    fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        // Content is never logged here: it can be the credential.
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.terminate();
    }
}
