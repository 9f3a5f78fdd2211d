//! Ordered classification of raw session output.
//!
//! The remote side speaks no protocol, only an ad-hoc character stream, so
//! the automaton recognizes a fixed prompt vocabulary. Classification is a
//! pure function from buffered-output-so-far to an optional event, decoupled
//! from the polling loop so it is testable with literal strings.

use once_cell::sync::Lazy;
use regex::Regex;

/// An event recognized in the output stream, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// `password:` — the remote side wants the credential.
    PasswordPrompt,
    /// `continue connecting` — first-contact host key confirmation.
    HostKeyConfirm,
    /// `permission denied` — the credential was rejected.
    PermissionDenied,
    /// `host key verification failed`.
    HostKeyFailed,
    /// `enter passphrase` — key-based auth is intercepting password auth.
    PassphrasePrompt,
    /// `$` or `#` at the end of the buffer: a shell prompt came back.
    ShellPrompt,
}

static PATTERNS: Lazy<Vec<(Regex, SessionEvent)>> = Lazy::new(|| {
    let re = |p| Regex::new(p).expect("static pattern");
    vec![
        (re(r"(?i)password:"), SessionEvent::PasswordPrompt),
        (re(r"continue connecting"), SessionEvent::HostKeyConfirm),
        (re(r"(?i)permission denied"), SessionEvent::PermissionDenied),
        (
            re(r"(?i)host key verification failed"),
            SessionEvent::HostKeyFailed,
        ),
        (re(r"(?i)enter passphrase"), SessionEvent::PassphrasePrompt),
    ]
});

/// Classify the unconsumed output buffer, first matching pattern wins.
///
/// Returns `None` when nothing in the buffer is recognized; the caller keeps
/// accumulating, so a prompt split across two reads still matches once the
/// second half arrives.
pub fn classify(buffer: &str) -> Option<SessionEvent> {
    for (pattern, event) in PATTERNS.iter() {
        if pattern.is_match(buffer) {
            return Some(*event);
        }
    }
    if ends_with_prompt_marker(buffer) {
        return Some(SessionEvent::ShellPrompt);
    }
    None
}

/// A shell prompt shows up as `$` or `#` (usually followed by a space) as
/// the last meaningful byte of output.
fn ends_with_prompt_marker(buffer: &str) -> bool {
    let trimmed = buffer.trim_end_matches([' ', '\t', '\r', '\n']);
    matches!(trimmed.chars().next_back(), Some('$' | '#'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_prompt_is_case_insensitive() {
        assert_eq!(classify("Password:"), Some(SessionEvent::PasswordPrompt));
        assert_eq!(
            classify("parlab16@orion's password:"),
            Some(SessionEvent::PasswordPrompt)
        );
    }

    #[test]
    fn host_key_first_contact() {
        let banner = "The authenticity of host 'orion' can't be established.\n\
                      Are you sure you want to continue connecting (yes/no/[fingerprint])?";
        assert_eq!(classify(banner), Some(SessionEvent::HostKeyConfirm));
    }

    #[test]
    fn rejections_are_recognized() {
        assert_eq!(
            classify("Permission denied (password)."),
            Some(SessionEvent::PermissionDenied)
        );
        assert_eq!(
            classify("Host key verification failed."),
            Some(SessionEvent::HostKeyFailed)
        );
        assert_eq!(
            classify("Enter passphrase for key '/home/u/.ssh/id_ed25519':"),
            Some(SessionEvent::PassphrasePrompt)
        );
    }

    #[test]
    fn prompt_marker_at_buffer_end() {
        assert_eq!(classify("parlab16@orion:~$ "), Some(SessionEvent::ShellPrompt));
        assert_eq!(classify("root@orion:~# \r\n"), Some(SessionEvent::ShellPrompt));
        // A dollar sign mid-line is not a prompt.
        assert_eq!(classify("cost was $5 total\n"), None);
    }

    #[test]
    fn password_outranks_prompt_marker() {
        // Both are present; the earlier pattern wins.
        assert_eq!(
            classify("parlab16@orion:~$ ssh scirouter\npassword:"),
            Some(SessionEvent::PasswordPrompt)
        );
    }

    #[test]
    fn progress_noise_matches_nothing() {
        assert_eq!(classify("lab1/main.c\n      1,024 100%\n"), None);
        assert_eq!(classify(""), None);
    }
}
