//! # Vault Manager
//!
//! Secrets travel inside the image, sealed with a password only the operator
//! knows. The vault goes through these states:
//!
//! ```text
//!  build time                          run time
//! ───────────────────────────────     ──────────────────────────────────────────
//! assemble ─► seal ─► contract.vault   open ─► materialize ─► run ─► release
//!  (files,     (password)               (password)  (temp dir,          (remove
//!   envs)                                            0600 files)         dir)
//! ```
//!
//! ## Ephemeral Filesystem
//!
//! Decrypted files are written to a private temporary directory, one file per
//! secret under a random UUID name, and bind-mounted read-write at their
//! destination. [`VaultFs::release`] removes the directory and reports a
//! failure loudly, since plaintext secrets may then remain on disk. Dropping
//! a [`VaultFs`] without releasing it still removes the directory.

use crate::config::SecretsConfig;
use crate::console::Console;
use crate::constants::VAULT_FS_PREFIX;
use crate::contract::{VolumeBinding, VolumeMode, Volumes};
use crate::crypto::{b64decode, b64encode, cipher_structured, uncipher_structured};
use crate::error::{Error, Result};
use crate::terminal::Terminal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};
use zeroize::Zeroizing;

const PASSWORD_PROMPT: &str = "Vault password";

/// Decrypted vault content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vault {
    pub files: Vec<VaultFile>,
    pub envs: BTreeMap<String, String>,
}

/// A secret file: in-container destination and base64 content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultFile {
    pub location: String,
    pub file: String,
}

impl Vault {
    /// Reads every configured secret file and collects the secret envs.
    pub fn assemble(secrets: &SecretsConfig) -> Result<Self> {
        let mut vault = Vault::default();

        for secret in &secrets.files {
            let raw = Zeroizing::new(std::fs::read(&secret.src).map_err(|e| {
                Error::SecretFileUnreadable {
                    path: secret.src.clone(),
                    reason: e.to_string(),
                }
            })?);
            vault.files.push(VaultFile {
                location: secret.dest.clone(),
                file: b64encode(&raw),
            });
        }

        for env in &secrets.envs {
            vault.envs.insert(env.name.clone(), env.value.clone());
        }

        Ok(vault)
    }
}

/// Prompts for a password and seals the configured secrets.
pub fn create_vault(
    secrets: &SecretsConfig,
    terminal: &dyn Terminal,
    console: &Console,
) -> Result<String> {
    console.info("Remember secret strength is proportional to password strength.");
    console.info("Most of the time, a strong password is a long password.");

    let password = Zeroizing::new(
        terminal
            .password(PASSWORD_PROMPT)
            .ok_or_else(|| Error::VaultCreation("no password entered".to_string()))?,
    );

    let vault = Vault::assemble(secrets)?;
    debug!(
        "Sealing {} file(s) and {} env var(s)",
        vault.files.len(),
        vault.envs.len()
    );

    cipher_structured(&password, &vault)
        .ok_or_else(|| Error::VaultCreation("encryption failed".to_string()))
}

/// Prompts for the password and opens a sealed vault.
///
/// Any failure is reported as a warning and yields `None`.
pub fn open_vault(token: &str, terminal: &dyn Terminal, console: &Console) -> Option<Vault> {
    let Some(password) = terminal.password(PASSWORD_PROMPT).map(Zeroizing::new) else {
        console.warning("No password entered, skipping vault");
        return None;
    };

    let vault = uncipher_structured::<Vault>(&password, token);
    if vault.is_none() {
        console.warning("Invalid password or corrupted vault");
    }
    vault
}

/// Temporary directory holding decrypted secret files.
#[derive(Debug)]
pub struct VaultFs {
    dir: Option<TempDir>,
}

impl VaultFs {
    /// Writes each file under a fresh unique name and returns its bindings.
    pub fn materialize(files: &[VaultFile]) -> Result<(Self, Volumes)> {
        let dir = tempfile::Builder::new().prefix(VAULT_FS_PREFIX).tempdir()?;
        let mut volumes = Volumes::new();

        for entry in files {
            let content = Zeroizing::new(b64decode(&entry.file).ok_or_else(|| {
                Error::Serialization(format!("secret for {} is not valid base64", entry.location))
            })?);

            let path = dir.path().join(uuid::Uuid::new_v4().to_string());
            let mut out = OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(&path)?;
            out.write_all(&content)?;

            volumes.insert(
                path.to_string_lossy().into_owned(),
                VolumeBinding::new(&entry.location, VolumeMode::Rw),
            );
        }

        debug!("Materialized {} secret file(s)", volumes.len());
        Ok((Self { dir: Some(dir) }, volumes))
    }

    /// Directory holding the files, until released.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Removes the directory. Returns `false` (after warning) on failure.
    pub fn release(mut self, console: &Console) -> bool {
        let Some(dir) = self.dir.take() else {
            return true;
        };
        let path = dir.path().to_path_buf();

        match dir.close() {
            Ok(()) => {
                debug!("Released {}", path.display());
                true
            }
            Err(e) => {
                debug!("Removing {} failed: {}", path.display(), e);
                console.warning(format!("Could not properly remove {}.", path.display()));
                console.warning("Sensitive data might remain on disk.");
                false
            }
        }
    }
}

/// Releases `handle` if there is one.
pub fn release(handle: Option<VaultFs>, console: &Console) -> bool {
    handle.is_none_or(|fs| fs.release(console))
}

impl Drop for VaultFs {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(
                    "Could not remove {}: {}. Sensitive data might remain on disk.",
                    path.display(),
                    e
                );
            }
        }
    }
}
