//! The injected bulk-copy strategy.
//!
//! The orchestrator and automaton never hardcode the external copy tool;
//! they receive a [`SyncTool`] that knows the tool's argv shape and how to
//! reformat its per-file notices. rsync is the production strategy; the
//! older scp-based variants of this workflow fit the same seam.

use crate::session::LineFormatter;

/// An external bulk synchronization tool invoked as an opaque subprocess.
pub trait SyncTool {
    /// Binary name, also used for preflight lookup.
    fn program(&self) -> &'static str;

    /// Argv (excluding the program) for a recursive, checksum-based sync of
    /// `sources` into `dest` over the given ssh transport command.
    fn sync_args(&self, ssh_command: &str, sources: &[String], dest: &str) -> Vec<String>;

    /// Per-line rewrite applied to the tool's output before it reaches the
    /// operator.
    fn format_line(&self) -> LineFormatter;
}

/// rsync with checksum comparison, so re-running a direction is idempotent:
/// unchanged files are reported, not re-copied.
pub struct Rsync;

impl SyncTool for Rsync {
    fn program(&self) -> &'static str {
        "rsync"
    }

    fn sync_args(&self, ssh_command: &str, sources: &[String], dest: &str) -> Vec<String> {
        let mut args = vec![
            "-r".to_string(),
            "--checksum".to_string(),
            // Per-file completion notices, including "is uptodate" skips.
            "--info=NAME2".to_string(),
            "-e".to_string(),
            ssh_command.to_string(),
        ];
        args.extend(sources.iter().cloned());
        args.push(dest.to_string());
        args
    }

    fn format_line(&self) -> LineFormatter {
        format_rsync_line
    }
}

/// Rewrite rsync's "uptodate" notices into a shorter skipped form; all other
/// lines pass through, blanks are dropped.
pub fn format_rsync_line(line: &str) -> Option<String> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() {
        return None;
    }
    if let Some(name) = line.strip_suffix(" is uptodate") {
        return Some(format!("Skipped (unchanged): {name}"));
    }
    Some(line.to_string())
}
