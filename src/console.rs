//! Operator-facing output.
//!
//! Diagnostics go through `tracing`; what the person at the terminal is meant
//! to read goes through a [`Console`]. A single console is built in `main`
//! and handed to whoever needs to talk to the operator.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SPINNER_TICK: Duration = Duration::from_millis(100);

/// Severity of a console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

impl Level {
    fn marker(&self) -> &'static str {
        match self {
            Level::Success => "✓ ",
            Level::Info => "",
            Level::Warning => "~ ",
            Level::Error => "✗ ",
        }
    }
}

/// Operator console.
#[derive(Debug, Clone, Default)]
pub struct Console {
    verbose: bool,
    buffer: Option<Arc<Mutex<Vec<(Level, String)>>>>,
}

impl Console {
    /// Console printing to the terminal.
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            buffer: None,
        }
    }

    /// Console recording lines in memory instead of printing them.
    pub fn buffered() -> Self {
        Self {
            verbose: false,
            buffer: Some(Arc::default()),
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        self.emit(Level::Success, msg.as_ref());
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.emit(Level::Info, msg.as_ref());
    }

    pub fn warning(&self, msg: impl AsRef<str>) {
        self.emit(Level::Warning, msg.as_ref());
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.emit(Level::Error, msg.as_ref());
    }

    /// Lines recorded by a [`Console::buffered`] console.
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.buffer
            .as_ref()
            .and_then(|b| b.lock().ok().map(|lines| lines.clone()))
            .unwrap_or_default()
    }

    /// Starts an indeterminate spinner that clears itself when dropped.
    pub fn waiter(&self, msg: impl Into<String>) -> Waiter {
        let msg = msg.into();
        if self.buffer.is_some() {
            self.emit(Level::Info, &msg);
            return Waiter { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(msg);
        bar.enable_steady_tick(SPINNER_TICK);
        Waiter { bar: Some(bar) }
    }

    fn emit(&self, level: Level, msg: &str) {
        if let Some(buffer) = &self.buffer {
            if let Ok(mut lines) = buffer.lock() {
                lines.push((level, msg.to_string()));
            }
            return;
        }

        match level {
            Level::Success | Level::Info => println!("{}{}", level.marker(), msg),
            Level::Warning | Level::Error => eprintln!("{}{}", level.marker(), msg),
        }
    }
}

/// Spinner guard returned by [`Console::waiter`].
pub struct Waiter {
    bar: Option<ProgressBar>,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
