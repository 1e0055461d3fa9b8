//! Where SAY output goes.

use std::io::Write;
use std::sync::Mutex;

pub trait OutputSink: Send + Sync {
    /// Writes one line of SAY output. The sink adds the line ending.
    fn write(&self, text: &str);
}

#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", text);
    }
}

/// Collects lines in memory. Used by tests and by hosts that render output themselves.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }
}

impl OutputSink for BufferSink {
    fn write(&self, text: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text.to_string());
    }
}
