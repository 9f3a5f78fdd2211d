//! Line-oriented relay of session output to the operator.
//!
//! Output arrives in arbitrary chunks; completed lines are passed through a
//! per-tool formatter and printed as they finish, while a stderr spinner
//! shows liveness during silent stretches. The spinner is always erased
//! before any line is printed and before a terminal outcome is returned, so
//! it never corrupts interleaved program output.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Per-tool rewrite of one completed output line.
///
/// Returning `None` drops the line (used for blank lines).
pub type LineFormatter = fn(&str) -> Option<String>;

/// Pass lines through untouched, dropping blanks.
pub fn passthrough(line: &str) -> Option<String> {
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Buffers partial lines and emits each completed one through the formatter.
struct LineBuffer {
    pending: String,
    format: LineFormatter,
    sink: Box<dyn FnMut(&str) + Send>,
}

impl LineBuffer {
    fn write(&mut self, data: &str) {
        self.pending.push_str(data);
        while let Some(pos) = self.pending.find('\n') {
            let rest = self.pending.split_off(pos + 1);
            let line = std::mem::replace(&mut self.pending, rest);
            self.emit(line.trim_end_matches(['\n', '\r']));
        }
    }

    /// Flush a trailing partial line at stream end.
    fn flush(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(line.trim_end_matches('\r'));
        }
    }

    fn emit(&mut self, line: &str) {
        if let Some(formatted) = (self.format)(line) {
            (self.sink)(&formatted);
        }
    }
}

/// The session's view of the controlling terminal: relayed lines plus the
/// polling spinner. Exactly one of these exists per driven session.
pub struct SessionOutput {
    spinner: ProgressBar,
    lines: LineBuffer,
}

impl SessionOutput {
    /// Relay to the real terminal: lines to stdout, spinner to stderr.
    pub fn terminal(format: LineFormatter) -> Self {
        let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        spinner.set_style(
            ProgressStyle::with_template("{msg} {spinner}").expect("static template"),
        );
        let pb = spinner.clone();
        Self {
            spinner,
            lines: LineBuffer {
                pending: String::new(),
                format,
                // suspend() erases the spinner for the duration of the print.
                sink: Box::new(move |line: &str| {
                    let line = line.to_string();
                    pb.suspend(|| println!("{line}"));
                }),
            },
        }
    }

    /// Capture relayed lines instead of printing them. Test seam.
    pub fn captured(format: LineFormatter) -> (Self, Arc<Mutex<Vec<String>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink_target = Arc::clone(&captured);
        let out = Self {
            spinner: ProgressBar::hidden(),
            lines: LineBuffer {
                pending: String::new(),
                format,
                sink: Box::new(move |line: &str| {
                    sink_target.lock().expect("capture lock").push(line.to_string());
                }),
            },
        };
        (out, captured)
    }

    /// Feed a chunk of raw output.
    pub fn write(&mut self, data: &str) {
        self.lines.write(data);
    }

    /// Redraw the liveness indicator while polling without a match.
    pub fn idle_tick(&self, label: &str, idle: Duration) {
        self.spinner
            .set_message(format!("{label}... {}s", idle.as_secs()));
        self.spinner.tick();
    }

    /// Flush any trailing partial line and erase the spinner.
    pub fn finish(&mut self) {
        self.lines.flush();
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(chunks: &[&str]) -> Vec<String> {
        let (mut out, lines) = SessionOutput::captured(passthrough);
        for chunk in chunks {
            out.write(chunk);
        }
        out.finish();
        let lines = lines.lock().unwrap().clone();
        lines
    }

    #[test]
    fn lines_split_across_chunks_are_reassembled() {
        assert_eq!(collect(&["hel", "lo\nwor", "ld\n"]), vec!["hello", "world"]);
    }

    #[test]
    fn trailing_partial_line_is_flushed_at_end() {
        assert_eq!(collect(&["done, no newline"]), vec!["done, no newline"]);
    }

    #[test]
    fn carriage_returns_are_stripped_and_blanks_dropped() {
        assert_eq!(collect(&["a\r\n\r\nb\n"]), vec!["a", "b"]);
    }
}
