//! Session automaton: drives one spawned interactive process (a remote login
//! shell or a one-shot copy command) through a finite prompt vocabulary until
//! a terminal outcome is reached.
//!
//! - **classify**: pure, ordered classification of buffered output
//! - **automaton**: the polling loop and idle-budget policy
//! - **pty**: the production [`SessionStream`] backed by a pseudo-terminal
//! - **relay**: line reformatting and the stderr liveness spinner

mod automaton;
mod classify;
mod pty;
mod relay;

pub use automaton::{Automaton, ReadChunk, SessionBudgets, SessionOutcome, SessionStream};
pub use classify::{SessionEvent, classify};
pub use pty::{PtySession, SessionError};
pub use relay::{LineFormatter, SessionOutput, passthrough};
