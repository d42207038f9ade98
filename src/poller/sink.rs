use std::fmt::Display;
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::feed::Entry;
use crate::util::single_line;

/// Append-only text output, one line per call.
pub trait Sink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Writes lines to stdout. Diagnostics go to stderr through `tracing`, so
/// stdout carries nothing but entries and error lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn emit(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "Failed to write to stdout");
        }
    }
}

/// Collects lines in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Everything emitted so far, leaving the sink empty.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Sink for MemorySink {
    fn emit(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.to_string());
    }
}

/// `<feed>\t<title> <link>`, flattened to one line.
pub fn entry_line(feed: &str, entry: &Entry) -> String {
    let title = single_line(&entry.title);
    match entry.link.as_deref().map(single_line) {
        Some(link) if !link.is_empty() => format!("{feed}\t{title} {link}"),
        _ => format!("{feed}\t{title}"),
    }
}

pub fn error_line(err: &impl Display) -> String {
    format!("error: {err}")
}
