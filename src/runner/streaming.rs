//! Live output callbacks for running commands
//!
//! A [`CommandRunner`](crate::runner::CommandRunner) delivers every line a
//! child process prints to an optional [`OutputCallback`] as soon as it is
//! read, before the process exits.
//!
//! # Example
//!
//! ```
//! use pipeline_runner::runner::{OutputCallback, OutputStream};
//!
//! struct Printer;
//!
//! impl OutputCallback for Printer {
//!     fn on_line(&self, stream: OutputStream, line: &str) {
//!         match stream {
//!             OutputStream::Stdout => println!("{}", line),
//!             OutputStream::Stderr => eprintln!("{}", line),
//!         }
//!     }
//! }
//! ```

use crate::runner::OutputStream;
use std::sync::Mutex;

/// Receives output lines while a command runs
///
/// This trait is object-safe and is used as `&dyn OutputCallback`.
pub trait OutputCallback: Send + Sync {
    fn on_line(&self, stream: OutputStream, line: &str);
}

/// Callback that records every line, for tests and buffering
#[derive(Debug, Default)]
pub struct CollectingCallback {
    lines: Mutex<Vec<(OutputStream, String)>>,
}

impl CollectingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines received so far
    pub fn lines(&self) -> Vec<(OutputStream, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl OutputCallback for CollectingCallback {
    fn on_line(&self, stream: OutputStream, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((stream, line.to_string()));
        }
    }
}
