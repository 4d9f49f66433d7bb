//! Interactive prompts: hidden password entry and external editing.
//!
//! Behind a trait so the client can be driven by scripted input in tests.

use crate::constants::DEFAULT_EDITOR;
use crate::error::{Error, Result};
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use std::io::{BufRead, Write};
use std::process::Command;
use tracing::debug;

/// Source of operator input.
pub trait Terminal: Send + Sync {
    /// Prompts for a secret without echoing it. `None` if nothing could be
    /// read.
    fn password(&self, prompt: &str) -> Option<String>;

    /// Lets the operator edit `text` and returns the result.
    fn edit(&self, text: &str) -> Result<String>;
}

/// The process's controlling terminal and `$EDITOR`.
#[derive(Debug, Default)]
pub struct InteractiveTerminal;

impl Terminal for InteractiveTerminal {
    fn password(&self, prompt: &str) -> Option<String> {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{}: ", prompt);
        let _ = stderr.flush();

        let stdin = std::io::stdin();
        let guard = EchoGuard::disable(&stdin);

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line);

        drop(guard);
        let _ = writeln!(stderr);

        match read {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    fn edit(&self, text: &str) -> Result<String> {
        let editor = std::env::var("EDITOR").unwrap_or_else(|_| DEFAULT_EDITOR.to_string());

        let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
        file.write_all(text.as_bytes())?;
        file.flush()?;

        debug!("Opening {} with {}", file.path().display(), editor);

        // Through the shell so `EDITOR="code --wait"` works.
        let status = Command::new("sh")
            .arg("-c")
            .arg(format!("{} \"$1\"", editor))
            .arg("sh")
            .arg(file.path())
            .status()
            .map_err(|e| Error::EditorFailed {
                editor: editor.clone(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(Error::EditorFailed {
                editor,
                reason: status.to_string(),
            });
        }

        Ok(std::fs::read_to_string(file.path())?)
    }
}

/// Turns terminal echo off until dropped.
struct EchoGuard<'a> {
    stdin: &'a std::io::Stdin,
    original: Option<Termios>,
}

impl<'a> EchoGuard<'a> {
    fn disable(stdin: &'a std::io::Stdin) -> Self {
        let original = termios::tcgetattr(stdin).ok();
        if let Some(original) = &original {
            let mut silent = original.clone();
            silent.local_flags.remove(LocalFlags::ECHO);
            if let Err(e) = termios::tcsetattr(stdin, SetArg::TCSANOW, &silent) {
                debug!("Could not disable echo: {}", e);
            }
        }
        Self { stdin, original }
    }
}

impl Drop for EchoGuard<'_> {
    fn drop(&mut self) {
        if let Some(original) = &self.original {
            let _ = termios::tcsetattr(self.stdin, SetArg::TCSANOW, original);
        }
    }
}
