//! Executes one hop by spawning the corresponding process and handing it to
//! the session automaton.

use crate::config::TransferConfig;
use crate::credential::Credential;
use crate::session::{
    Automaton, LineFormatter, PtySession, SessionBudgets, SessionOutcome, SessionOutput,
    SessionStream,
};

use super::HopFailure;
use super::hop::{Hop, HopAction};
use super::oneshot;

/// Runs hops. The production implementation spawns real processes; tests
/// substitute a recorder.
pub trait HopDriver {
    fn run(&mut self, hop: &Hop, credential: &Credential) -> Result<(), HopFailure>;
}

/// The real driver: PTY sessions for interactive hops, the one-shot helper
/// for fire-and-forget commands.
pub struct ProcessDriver<'a> {
    config: &'a TransferConfig,
    formatter: LineFormatter,
}

impl<'a> ProcessDriver<'a> {
    pub fn new(config: &'a TransferConfig, formatter: LineFormatter) -> Self {
        Self { config, formatter }
    }

    fn run_gateway_session(
        &self,
        label: &str,
        setup: &[String],
        sync_command: &str,
        credential: &Credential,
    ) -> Result<(), HopFailure> {
        let mut args = self.config.ssh_options.clone();
        args.push(self.config.gateway.clone());
        let mut session = PtySession::spawn("ssh", &args)?;

        let result = (|| {
            // Login: password prompt or an already-authenticated shell.
            self.drive(label, &mut session, credential, SessionBudgets::control())
                .and_then(require_prompt)?;

            for command in setup {
                session.send_line(command)?;
                self.drive(label, &mut session, credential, SessionBudgets::control())
                    .and_then(require_prompt)?;
            }

            session.send_line(sync_command)?;
            self.drive(
                label,
                &mut session,
                credential,
                SessionBudgets::copy_transfer(),
            )
            .and_then(require_prompt)?;

            session.send_line("exit")?;
            // The session closing down is the expected ending here.
            let outcome =
                self.drive(label, &mut session, credential, SessionBudgets::control())?;
            match outcome {
                SessionOutcome::Success | SessionOutcome::Eof => Ok(()),
                other => Err(HopFailure::from_outcome(other)),
            }
        })();

        if result.is_err() {
            session.terminate();
        }
        result
    }

    fn run_local_sync(
        &self,
        label: &str,
        program: &str,
        args: &[String],
        credential: &Credential,
    ) -> Result<(), HopFailure> {
        let mut session = PtySession::spawn(program, args)?;
        let outcome = self.drive(
            label,
            &mut session,
            credential,
            SessionBudgets::copy_transfer(),
        )?;

        match outcome {
            // A directly spawned copy normally ends by closing its stream.
            SessionOutcome::Success | SessionOutcome::Eof => {
                let status = session.wait()?;
                if status.success() {
                    Ok(())
                } else {
                    Err(HopFailure::Exited {
                        code: status.exit_code(),
                    })
                }
            }
            other => {
                session.terminate();
                Err(HopFailure::from_outcome(other))
            }
        }
    }

    fn drive(
        &self,
        label: &str,
        session: &mut PtySession,
        credential: &Credential,
        budgets: SessionBudgets,
    ) -> Result<SessionOutcome, HopFailure> {
        let mut output = SessionOutput::terminal(self.formatter);
        let outcome = Automaton::new(label, credential, budgets).drive(session, &mut output)?;
        Ok(outcome)
    }
}

/// Inside a login session only the returning prompt completes a command.
fn require_prompt(outcome: SessionOutcome) -> Result<(), HopFailure> {
    match outcome {
        SessionOutcome::Success => Ok(()),
        SessionOutcome::Eof => Err(HopFailure::UnexpectedEof),
        other => Err(HopFailure::from_outcome(other)),
    }
}

impl HopDriver for ProcessDriver<'_> {
    fn run(&mut self, hop: &Hop, credential: &Credential) -> Result<(), HopFailure> {
        match &hop.action {
            HopAction::GatewaySession {
                setup,
                sync_command,
            } => self.run_gateway_session(&hop.label, setup, sync_command, credential),
            HopAction::LocalSync { program, args } => {
                self.run_local_sync(&hop.label, program, args, credential)
            }
            HopAction::RemoteExec { command, timeout } => {
                oneshot::gateway_exec(self.config, credential, command, *timeout)
            }
        }
    }
}
