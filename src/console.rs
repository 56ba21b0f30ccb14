//! Switches for tool output on stdout and stderr.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::status::ReturnCode;

/// Output stream of tool messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// Per-stream output switches. Both streams start enabled.
#[derive(Debug)]
pub struct Console {
    stdout: AtomicBool,
    stderr: AtomicBool,
}

impl Default for Console {
    fn default() -> Self {
        Self {
            stdout: AtomicBool::new(true),
            stderr: AtomicBool::new(true),
        }
    }
}

impl Console {
    /// Create a console with both streams enabled.
    pub fn new() -> Self {
        Self::default()
    }

    fn switch(&self, stream: Stream) -> &AtomicBool {
        match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        }
    }

    /// Let tool messages through on `stream`. Non-zero when applied.
    pub fn enable(&self, stream: Stream) -> ReturnCode {
        self.switch(stream).store(true, Ordering::Relaxed);
        tracing::debug!(?stream, "console enabled");
        ReturnCode::from_bool(true)
    }

    /// Silence tool messages on `stream`. Non-zero when applied.
    pub fn disable(&self, stream: Stream) -> ReturnCode {
        self.switch(stream).store(false, Ordering::Relaxed);
        tracing::debug!(?stream, "console disabled");
        ReturnCode::from_bool(true)
    }

    /// Check whether `stream` is enabled.
    pub fn is_enabled(&self, stream: Stream) -> bool {
        self.switch(stream).load(Ordering::Relaxed)
    }

    /// Write a tool message to `stream` if it is enabled.
    ///
    /// Returns whether the message was emitted.
    pub fn write(&self, stream: Stream, message: &str) -> bool {
        if !self.is_enabled(stream) {
            return false;
        }
        let written = match stream {
            Stream::Stdout => std::io::stdout().lock().write_all(message.as_bytes()),
            Stream::Stderr => std::io::stderr().lock().write_all(message.as_bytes()),
        };
        if let Err(e) = written {
            tracing::warn!(?stream, error = %e, "console write failed");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switches() {
        let console = Console::new();
        assert!(console.is_enabled(Stream::Stdout));

        assert!(console.disable(Stream::Stdout).truthy());
        assert!(!console.is_enabled(Stream::Stdout));
        assert!(console.is_enabled(Stream::Stderr));
        assert!(!console.write(Stream::Stdout, "silenced\n"));

        assert!(console.enable(Stream::Stdout).truthy());
        assert!(console.is_enabled(Stream::Stdout));
    }
}
