//! The SSH password, held in memory for the lifetime of one invocation.

use std::fmt;

use dialoguer::Password;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("a password is required")]
    Empty,
}

/// A single secret, supplied once and reused for every hop.
///
/// Never persisted, never logged; the backing storage is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: String) -> Self {
        Self(secret)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Return the pre-supplied credential, or prompt for one without echoing.
pub fn resolve(preset: Option<&Credential>) -> Result<Credential, CredentialError> {
    if let Some(cred) = preset {
        return Ok(cred.clone());
    }
    let secret = Password::new().with_prompt("SSH password").interact()?;
    if secret.is_empty() {
        return Err(CredentialError::Empty);
    }
    Ok(Credential::new(secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_reveals_the_secret() {
        let cred = Credential::new("hunter2".into());
        assert_eq!(format!("{cred:?}"), "Credential(<redacted>)");
    }

    #[test]
    fn preset_credential_is_reused_without_prompting() {
        let preset = Credential::new("hunter2".into());
        let resolved = resolve(Some(&preset)).unwrap();
        assert_eq!(resolved.expose(), "hunter2");
    }
}
