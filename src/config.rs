//! Environment-backed configuration for the relay.
//!
//! All required settings come from the process environment, optionally
//! pre-seeded from a `.env` file in the working directory (existing process
//! variables always win). This is the only module that reads ambient
//! environment state; everything downstream receives an immutable
//! [`TransferConfig`].
//!
//! Required keys:
//!
//! ```text
//! ORION             gateway host (user@host or an ssh config alias)
//! SCIROUTER         restricted cluster host, reachable only from the gateway
//! ORION_HOME        staging directory on the gateway (absolute)
//! SCIROUTER_SHARED  shared directory on the cluster host (absolute, .../shared)
//! LOCAL_PARALLEL    local staging root (resolved against the cwd if relative)
//! EXERCISE_DIRS     whitespace-separated directory names to move
//! SSH_OPTIONS       whitespace-separated options passed to every ssh invocation
//! ```
//!
//! `PASSWORD` is optional; when absent the password is prompted interactively
//! at transfer time.

use std::path::PathBuf;

use thiserror::Error;

use crate::credential::Credential;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("setting {0} must not be empty")]
    Empty(&'static str),
}

/// Immutable transfer configuration, constructed once per invocation.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Gateway host identifier (Orion).
    pub gateway: String,
    /// Restricted cluster-facing host identifier (Scirouter).
    pub cluster: String,
    /// Home directory on the gateway; staging lives at `<gateway_home>/shared`.
    pub gateway_home: PathBuf,
    /// Shared directory on the cluster host.
    pub cluster_shared: PathBuf,
    /// Local staging root the exercise directories live under.
    pub local_root: PathBuf,
    /// Names of the exercise directories subject to transfer.
    pub exercise_dirs: Vec<String>,
    /// Options passed to every ssh invocation (e.g. `-o StrictHostKeyChecking=no`).
    pub ssh_options: Vec<String>,
    /// Pre-supplied password, if any. Prompted for at transfer time otherwise.
    pub password: Option<Credential>,
}

impl TransferConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Seeds missing variables only; never overrides what is already set.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Separated from [`from_env`](Self::from_env) so the loader is testable
    /// without mutating process state.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let gateway = require(&get, "ORION")?;
        let cluster = require(&get, "SCIROUTER")?;
        let gateway_home = PathBuf::from(require(&get, "ORION_HOME")?);
        let cluster_shared = PathBuf::from(require(&get, "SCIROUTER_SHARED")?);

        let local_root = {
            let raw = PathBuf::from(require(&get, "LOCAL_PARALLEL")?);
            if raw.is_absolute() {
                raw
            } else {
                std::env::current_dir().unwrap_or_default().join(raw)
            }
        };

        let exercise_dirs = split_list(&require(&get, "EXERCISE_DIRS")?);
        let ssh_options = split_list(&require(&get, "SSH_OPTIONS")?);
        let password = get("PASSWORD")
            .filter(|p| !p.is_empty())
            .map(Credential::new);

        tracing::debug!(
            gateway = %gateway,
            cluster = %cluster,
            dirs = exercise_dirs.len(),
            "loaded transfer configuration"
        );

        Ok(Self {
            gateway,
            cluster,
            gateway_home,
            cluster_shared,
            local_root,
            exercise_dirs,
            ssh_options,
            password,
        })
    }

    /// Staging directory on the gateway that every hop funnels through.
    pub fn gateway_staging(&self) -> PathBuf {
        self.gateway_home.join("shared")
    }
}

fn require(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    match get(name) {
        None => Err(ConfigError::Missing(name)),
        Some(v) if v.trim().is_empty() => Err(ConfigError::Empty(name)),
        Some(v) => Ok(v),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("ORION", "parlab16@orion.example"),
            ("SCIROUTER", "parlab16@scirouter"),
            ("ORION_HOME", "/home/parallel/parlab16"),
            ("SCIROUTER_SHARED", "/srv/cluster/shared"),
            ("LOCAL_PARALLEL", "/home/u/parallel"),
            ("EXERCISE_DIRS", "lab1 lab2"),
            ("SSH_OPTIONS", "-o StrictHostKeyChecking=no"),
        ])
    }

    fn lookup<'a>(env: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        |name| env.get(name).map(|v| v.to_string())
    }

    #[test]
    fn loads_complete_configuration() {
        let env = full_env();
        let cfg = TransferConfig::from_lookup(lookup(&env)).unwrap();
        assert_eq!(cfg.gateway, "parlab16@orion.example");
        assert_eq!(cfg.exercise_dirs, vec!["lab1", "lab2"]);
        assert_eq!(cfg.ssh_options.len(), 3);
        assert_eq!(
            cfg.gateway_staging(),
            PathBuf::from("/home/parallel/parlab16/shared")
        );
        assert!(cfg.password.is_none());
    }

    #[test]
    fn missing_key_is_named() {
        let mut env = full_env();
        env.remove("SCIROUTER");
        let err = TransferConfig::from_lookup(lookup(&env)).unwrap_err();
        assert_eq!(err.to_string(), "missing required setting: SCIROUTER");
    }

    #[test]
    fn empty_value_is_rejected() {
        let mut env = full_env();
        env.insert("EXERCISE_DIRS", "   ");
        let err = TransferConfig::from_lookup(lookup(&env)).unwrap_err();
        assert!(err.to_string().contains("EXERCISE_DIRS"));
    }

    #[test]
    fn empty_password_counts_as_unset() {
        let mut env = full_env();
        env.insert("PASSWORD", "");
        let cfg = TransferConfig::from_lookup(lookup(&env)).unwrap();
        assert!(cfg.password.is_none());
    }

    #[test]
    fn relative_local_root_is_anchored_to_cwd() {
        let mut env = full_env();
        env.insert("LOCAL_PARALLEL", "parallel");
        let cfg = TransferConfig::from_lookup(lookup(&env)).unwrap();
        assert!(cfg.local_root.is_absolute());
        assert!(cfg.local_root.ends_with("parallel"));
    }
}
