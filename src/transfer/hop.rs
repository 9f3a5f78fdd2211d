//! Hop construction: the fixed step sequences for each direction.
//!
//! A hop is one directed copy (or cleanup) operation between two hosts in
//! the relay chain, labelled for progress and error reporting. Hops are
//! built here as plain data and executed elsewhere, so the sequencing rules
//! (order, which step is best-effort) are testable without spawning
//! anything.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::TransferConfig;

use super::sync_tool::SyncTool;

/// What a hop actually does when executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HopAction {
    /// Log into the gateway, run the setup commands, then drive the sync
    /// command under automaton control until the prompt returns.
    GatewaySession {
        setup: Vec<String>,
        sync_command: String,
    },
    /// Spawn the copy tool locally and drive it to completion.
    LocalSync { program: String, args: Vec<String> },
    /// Fire-and-forget command on the gateway via the one-shot helper.
    RemoteExec { command: String, timeout: Duration },
}

/// One directed transfer operation, consumed once.
#[derive(Debug, Clone)]
pub struct Hop {
    /// User-facing step label, also used in failure reports.
    pub label: String,
    pub action: HopAction,
    /// Failure of a best-effort hop degrades to a warning.
    pub best_effort: bool,
}

impl Hop {
    fn fatal(label: impl Into<String>, action: HopAction) -> Self {
        Self {
            label: label.into(),
            action,
            best_effort: false,
        }
    }

    fn best_effort(label: impl Into<String>, action: HopAction) -> Self {
        Self {
            label: label.into(),
            action,
            best_effort: true,
        }
    }
}

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(120);
const MKDIR_TIMEOUT: Duration = Duration::from_secs(600);

/// The ssh invocation handed to the copy tool's `-e` option.
fn ssh_command(config: &TransferConfig) -> String {
    let mut parts = vec!["ssh".to_string()];
    parts.extend(config.ssh_options.iter().cloned());
    shell_words::join(&parts)
}

fn staging_display(config: &TransferConfig) -> String {
    config.gateway_staging().display().to_string()
}

/// Pull: Scirouter → Orion staging → local root, then staging cleanup.
pub fn pull_plan(config: &TransferConfig, tool: &dyn SyncTool) -> Vec<Hop> {
    let staging = staging_display(config);
    let ssh = ssh_command(config);

    let remote_sources: Vec<String> = config
        .exercise_dirs
        .iter()
        .map(|name| {
            format!(
                "{}:{}/{}",
                config.cluster,
                config.cluster_shared.display(),
                name
            )
        })
        .collect();
    let remote_sync = remote_command(tool, &ssh, &remote_sources, &format!("{staging}/"));

    let local_sources: Vec<String> = config
        .exercise_dirs
        .iter()
        .map(|name| format!("{}:{staging}/{name}", config.gateway))
        .collect();

    vec![
        Hop::fatal(
            "Step 1: Orion pulling from Scirouter",
            HopAction::GatewaySession {
                setup: vec![format!("mkdir -p {staging}")],
                sync_command: remote_sync,
            },
        ),
        Hop::fatal(
            "Step 2: Pulling from Orion to local",
            HopAction::LocalSync {
                program: tool.program().to_string(),
                args: tool.sync_args(
                    &ssh,
                    &local_sources,
                    &config.local_root.display().to_string(),
                ),
            },
        ),
        Hop::best_effort(
            "Step 3: Cleanup on Orion",
            HopAction::RemoteExec {
                command: format!("rm -rf {staging}"),
                timeout: CLEANUP_TIMEOUT,
            },
        ),
    ]
}

/// Push: local root → Orion staging → Scirouter, then staging cleanup.
pub fn push_plan(
    config: &TransferConfig,
    tool: &dyn SyncTool,
    local_paths: &[PathBuf],
) -> Vec<Hop> {
    let staging = staging_display(config);
    let ssh = ssh_command(config);

    let local_sources: Vec<String> = local_paths
        .iter()
        .map(|p| p.display().to_string())
        .collect();

    let staged_sources: Vec<String> = config
        .exercise_dirs
        .iter()
        .map(|name| format!("{staging}/{name}"))
        .collect();
    let remote_sync = remote_command(
        tool,
        &ssh,
        &staged_sources,
        &format!("{}:{}/", config.cluster, config.cluster_shared.display()),
    );

    vec![
        Hop::fatal(
            "Step 1: Preparing Orion staging directory",
            HopAction::RemoteExec {
                command: format!("mkdir -p {staging}"),
                timeout: MKDIR_TIMEOUT,
            },
        ),
        Hop::fatal(
            "Step 2: Pushing from local to Orion",
            HopAction::LocalSync {
                program: tool.program().to_string(),
                args: tool.sync_args(
                    &ssh,
                    &local_sources,
                    &format!("{}:{staging}/", config.gateway),
                ),
            },
        ),
        Hop::fatal(
            "Step 3: Orion pushing to Scirouter",
            HopAction::GatewaySession {
                setup: Vec::new(),
                sync_command: remote_sync,
            },
        ),
        Hop::best_effort(
            "Step 4: Cleanup on Orion",
            HopAction::RemoteExec {
                command: format!("rm -rf {staging}"),
                timeout: CLEANUP_TIMEOUT,
            },
        ),
    ]
}

/// The full copy-tool command line as typed at the gateway shell.
fn remote_command(tool: &dyn SyncTool, ssh: &str, sources: &[String], dest: &str) -> String {
    let mut argv = vec![tool.program().to_string()];
    argv.extend(tool.sync_args(ssh, sources, dest));
    shell_words::join(&argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::sync_tool::Rsync;
    use std::path::PathBuf;

    fn config() -> TransferConfig {
        TransferConfig {
            gateway: "parlab16@orion".into(),
            cluster: "scirouter".into(),
            gateway_home: PathBuf::from("/home/parallel/parlab16"),
            cluster_shared: PathBuf::from("/srv/cluster/shared"),
            local_root: PathBuf::from("/home/u/parallel"),
            exercise_dirs: vec!["lab1".into(), "lab2".into()],
            ssh_options: vec!["-o".into(), "StrictHostKeyChecking=no".into()],
            password: None,
        }
    }

    #[test]
    fn pull_plan_sequences_relay_copy_cleanup() {
        let plan = pull_plan(&config(), &Rsync);
        assert_eq!(plan.len(), 3);
        assert!(plan[0].label.contains("Orion pulling from Scirouter"));
        assert!(!plan[0].best_effort);
        assert!(!plan[1].best_effort);
        assert!(plan[2].best_effort, "cleanup must be best-effort");
        assert!(matches!(plan[2].action, HopAction::RemoteExec { .. }));
    }

    #[test]
    fn pull_remote_sync_reads_every_source_into_staging() {
        let plan = pull_plan(&config(), &Rsync);
        let HopAction::GatewaySession {
            setup,
            sync_command,
        } = &plan[0].action
        else {
            panic!("step 1 must be a gateway session");
        };
        assert_eq!(setup, &["mkdir -p /home/parallel/parlab16/shared"]);
        assert!(sync_command.starts_with("rsync"));
        assert!(sync_command.contains("--checksum"));
        assert!(sync_command.contains("scirouter:/srv/cluster/shared/lab1"));
        assert!(sync_command.contains("scirouter:/srv/cluster/shared/lab2"));
        assert!(sync_command.ends_with("/home/parallel/parlab16/shared/"));
    }

    #[test]
    fn pull_local_sync_lands_in_the_local_root() {
        let plan = pull_plan(&config(), &Rsync);
        let HopAction::LocalSync { program, args } = &plan[1].action else {
            panic!("step 2 must be a local sync");
        };
        assert_eq!(program, "rsync");
        assert!(args.contains(&"--checksum".to_string()));
        assert!(
            args.contains(
                &"parlab16@orion:/home/parallel/parlab16/shared/lab1".to_string()
            )
        );
        assert_eq!(args.last().unwrap(), "/home/u/parallel");
    }

    #[test]
    fn push_plan_mirrors_the_order_and_cleans_up_last() {
        let locals = vec![
            PathBuf::from("/home/u/parallel/lab1"),
            PathBuf::from("/home/u/parallel/lab2"),
        ];
        let plan = push_plan(&config(), &Rsync, &locals);
        assert_eq!(plan.len(), 4);
        assert!(matches!(
            plan[0].action,
            HopAction::RemoteExec { ref command, .. } if command.starts_with("mkdir -p")
        ));
        let HopAction::LocalSync { args, .. } = &plan[1].action else {
            panic!("step 2 must be a local sync");
        };
        assert!(args.contains(&"/home/u/parallel/lab1".to_string()));
        assert_eq!(
            args.last().unwrap(),
            "parlab16@orion:/home/parallel/parlab16/shared/"
        );
        let HopAction::GatewaySession { sync_command, .. } = &plan[2].action else {
            panic!("step 3 must be a gateway session");
        };
        assert!(sync_command.contains("/home/parallel/parlab16/shared/lab1"));
        assert!(sync_command.ends_with("scirouter:/srv/cluster/shared/"));
        assert!(plan[3].best_effort);
    }

    #[test]
    fn every_sync_is_checksum_based_so_reruns_are_idempotent() {
        let locals = vec![PathBuf::from("/home/u/parallel/lab1")];
        for plan in [
            pull_plan(&config(), &Rsync),
            push_plan(&config(), &Rsync, &locals),
        ] {
            for hop in &plan {
                match &hop.action {
                    HopAction::GatewaySession { sync_command, .. } => {
                        assert!(sync_command.contains("--checksum"), "{}", hop.label);
                    }
                    HopAction::LocalSync { args, .. } => {
                        assert!(args.contains(&"--checksum".to_string()), "{}", hop.label);
                    }
                    HopAction::RemoteExec { .. } => {}
                }
            }
        }
    }

    #[test]
    fn ssh_options_are_quoted_into_the_transport_command() {
        let plan = pull_plan(&config(), &Rsync);
        let HopAction::LocalSync { args, .. } = &plan[1].action else {
            panic!();
        };
        let e = args
            .iter()
            .position(|a| a == "-e")
            .expect("-e transport option present");
        assert_eq!(args[e + 1], "ssh -o StrictHostKeyChecking=no");
    }
}
