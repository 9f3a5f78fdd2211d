//! Transfer orchestrator: composes the fixed hop sequences for the two
//! supported directions and aborts on the first fatal hop failure.
//!
//! Every direction certifies the configured paths, checks the external
//! tools, and resolves the credential before any hop runs. Hops execute
//! strictly sequentially; the terminal cleanup hop is best-effort and only
//! warns, since by then the transferred data already exists at its
//! destination. Partial progress is never rolled back: the syncs are
//! checksum-based and re-running the same direction is idempotent.

pub mod driver;
pub mod hop;
pub mod oneshot;
pub mod sync_tool;

use colored::Colorize;
use thiserror::Error;

use crate::config::TransferConfig;
use crate::credential::{self, Credential, CredentialError};
use crate::preflight::{self, PreflightError};
use crate::session::{SessionError, SessionOutcome};
use crate::validate::{self, ValidationError};

use driver::{HopDriver, ProcessDriver};
use hop::Hop;
use sync_tool::{Rsync, SyncTool};

/// Why a single hop did not complete.
#[derive(Debug, Error)]
pub enum HopFailure {
    #[error("permission denied (password rejected)")]
    AuthRejected,

    #[error("host key verification failed")]
    HostKeyRejected,

    #[error("ssh key passphrase prompt detected; disable key auth or allow password auth")]
    KeyAuthBlocked,

    #[error("timed out waiting for session output; output so far:\n{tail}")]
    TimedOut { tail: String },

    #[error("session ended before the command completed")]
    UnexpectedEof,

    #[error("process exited with code {code}")]
    Exited { code: u32 },

    #[error("process was killed by a signal")]
    Signaled,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl HopFailure {
    /// Map an automaton outcome that the caller treats as failure.
    pub fn from_outcome(outcome: SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::AuthRejected => Self::AuthRejected,
            SessionOutcome::HostKeyRejected => Self::HostKeyRejected,
            SessionOutcome::KeyAuthBlocked => Self::KeyAuthBlocked,
            SessionOutcome::TimedOut { tail } => Self::TimedOut { tail },
            SessionOutcome::Eof => Self::UnexpectedEof,
            // Callers only convert non-success outcomes.
            SessionOutcome::Success => Self::UnexpectedEof,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("{step} failed: {source}")]
    Step {
        step: String,
        #[source]
        source: HopFailure,
    },
}

/// Pull the shared exercise directories from Scirouter to the local root.
pub fn pull(config: &TransferConfig) -> Result<(), TransferError> {
    let tool = Rsync;
    validate::validate_transfer_paths(config)?;
    preflight::require_tools(&["ssh", "sshpass", tool.program()])?;
    let credential = credential::resolve(config.password.as_ref())?;

    announce("Pulling", config);
    let plan = hop::pull_plan(config, &tool);
    let mut driver = ProcessDriver::new(config, tool.format_line());
    execute_plan(&plan, &mut driver, &credential)?;

    println!("{}", "Pull complete.".green().bold());
    announce("Pulled", config);
    Ok(())
}

/// Push the local exercise directories up to Scirouter.
pub fn push(config: &TransferConfig) -> Result<(), TransferError> {
    let tool = Rsync;
    let local_paths = validate::validate_transfer_paths(config)?;
    preflight::require_local_dirs(&local_paths)?;
    preflight::require_tools(&["ssh", "sshpass", tool.program()])?;
    let credential = credential::resolve(config.password.as_ref())?;

    announce("Pushing", config);
    let plan = hop::push_plan(config, &tool, &local_paths);
    let mut driver = ProcessDriver::new(config, tool.format_line());
    execute_plan(&plan, &mut driver, &credential)?;

    println!("{}", "Push complete.".green().bold());
    announce("Pushed", config);
    Ok(())
}

/// Run hops strictly in order, short-circuiting on the first fatal failure.
fn execute_plan(
    plan: &[Hop],
    driver: &mut dyn HopDriver,
    credential: &Credential,
) -> Result<(), TransferError> {
    for hop in plan {
        println!("{}", hop.label.bold());
        match driver.run(hop, credential) {
            Ok(()) => {}
            Err(failure) if hop.best_effort => {
                tracing::warn!(step = %hop.label, error = %failure, "best-effort step failed");
                println!(
                    "{} {} did not finish: {failure}",
                    "warning:".yellow().bold(),
                    hop.label
                );
            }
            Err(failure) => {
                return Err(TransferError::Step {
                    step: hop.label.clone(),
                    source: failure,
                });
            }
        }
    }
    Ok(())
}

/// Name the directory set being moved, before and after the transfer.
fn announce(verb: &str, config: &TransferConfig) {
    println!("{verb} exercise directories:");
    for name in &config.exercise_dirs {
        println!("  - {name}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::hop::HopAction;
    use std::path::PathBuf;
    use std::time::Duration;

    /// Records the hops it was asked to run; fails the configured ones.
    struct Recorder {
        fail_labels: Vec<&'static str>,
        ran: Vec<String>,
    }

    impl Recorder {
        fn new(fail_labels: Vec<&'static str>) -> Self {
            Self {
                fail_labels,
                ran: Vec::new(),
            }
        }
    }

    impl HopDriver for Recorder {
        fn run(&mut self, hop: &Hop, _credential: &Credential) -> Result<(), HopFailure> {
            self.ran.push(hop.label.clone());
            if self.fail_labels.iter().any(|l| hop.label.contains(l)) {
                Err(HopFailure::AuthRejected)
            } else {
                Ok(())
            }
        }
    }

    fn hop(label: &str, best_effort: bool) -> Hop {
        Hop {
            label: label.to_string(),
            action: HopAction::RemoteExec {
                command: "true".into(),
                timeout: Duration::from_secs(1),
            },
            best_effort,
        }
    }

    fn credential() -> Credential {
        Credential::new("pw".into())
    }

    #[test]
    fn first_fatal_failure_stops_the_plan() {
        let plan = vec![
            hop("Step 1", false),
            hop("Step 2", false),
            hop("Step 3: Cleanup", true),
        ];
        let mut driver = Recorder::new(vec!["Step 1"]);
        let err = execute_plan(&plan, &mut driver, &credential()).unwrap_err();
        assert_eq!(driver.ran, vec!["Step 1"], "later hops must not run");
        match err {
            TransferError::Step { step, source } => {
                assert_eq!(step, "Step 1");
                assert!(matches!(source, HopFailure::AuthRejected));
            }
            other => panic!("expected Step error, got {other}"),
        }
    }

    #[test]
    fn best_effort_failure_is_downgraded_to_a_warning() {
        let plan = vec![hop("Step 1", false), hop("Step 2: Cleanup", true)];
        let mut driver = Recorder::new(vec!["Cleanup"]);
        execute_plan(&plan, &mut driver, &credential()).unwrap();
        assert_eq!(driver.ran.len(), 2);
    }

    #[test]
    fn successful_plan_runs_every_hop_in_order() {
        let plan = vec![hop("Step 1", false), hop("Step 2", false), hop("Step 3", true)];
        let mut driver = Recorder::new(vec![]);
        execute_plan(&plan, &mut driver, &credential()).unwrap();
        assert_eq!(driver.ran, vec!["Step 1", "Step 2", "Step 3"]);
    }

    #[test]
    fn invalid_configuration_fails_before_any_hop_or_prompt() {
        // Bad shared suffix; a pre-set password proves no prompt is needed,
        // and validation failing first means none would be attempted.
        let config = TransferConfig {
            gateway: "orion".into(),
            cluster: "scirouter".into(),
            gateway_home: PathBuf::from("/home/parallel/parlab16"),
            cluster_shared: PathBuf::from("/srv/cluster/other"),
            local_root: PathBuf::from("/home/u/parallel"),
            exercise_dirs: vec!["lab1".into()],
            ssh_options: vec![],
            password: Some(Credential::new("pw".into())),
        };
        assert!(matches!(
            pull(&config),
            Err(TransferError::Validation(ValidationError::NotShared { .. }))
        ));
        assert!(matches!(
            push(&config),
            Err(TransferError::Validation(ValidationError::NotShared { .. }))
        ));
    }

    #[test]
    fn outcome_mapping_names_the_specific_rejection() {
        assert!(matches!(
            HopFailure::from_outcome(SessionOutcome::AuthRejected),
            HopFailure::AuthRejected
        ));
        assert!(matches!(
            HopFailure::from_outcome(SessionOutcome::HostKeyRejected),
            HopFailure::HostKeyRejected
        ));
        assert!(matches!(
            HopFailure::from_outcome(SessionOutcome::KeyAuthBlocked),
            HopFailure::KeyAuthBlocked
        ));
        let failure = HopFailure::from_outcome(SessionOutcome::TimedOut {
            tail: "last output".into(),
        });
        assert!(failure.to_string().contains("last output"));
    }
}
