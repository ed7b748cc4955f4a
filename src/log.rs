use chrono::Local;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

const MAX_LINES: usize = 1000;

/// Bounded, shareable pane of forwarded tool output.
#[derive(Clone)]
pub struct LogPane {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogPane {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, line: &str) {
        let stamped = format!("[{}] {}", Local::now().format("%H:%M:%S"), line);
        let mut lines = self.lines.lock().unwrap_or_else(|p| p.into_inner());
        lines.push(stamped);
        if lines.len() > MAX_LINES {
            let excess = lines.len() - MAX_LINES;
            lines.drain(..excess);
        }
    }

    /// Push every line of a raw output chunk.
    pub fn push_chunk(&self, chunk: &str) {
        for line in chunk.lines().filter(|l| !l.trim().is_empty()) {
            self.push(line);
        }
    }

    pub fn get(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

impl Default for LogPane {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global tracing subscriber. `PKGFRONT_LOG` takes precedence
/// over `verbose`.
pub fn init(verbose: bool) {
    let default = if verbose { "pkgfront=debug" } else { "pkgfront=warn" };
    let filter = EnvFilter::try_from_env("PKGFRONT_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
