//! # Runtime Contract
//!
//! The runtime contract is everything `kitt run` needs to start a session,
//! serialized as JSON into the `kitt-config` image label at build time:
//!
//! ```json
//! {
//!   "entrypoint": "fixuid -q",
//!   "bind_volumes": { "/var/run/docker.sock": { "bind": "/var/run/docker.sock", "mode": "rw" } },
//!   "forward_x11": false,
//!   "dind": true,
//!   "hostname": "kitt",
//!   "command": "bash",
//!   "user": "user",
//!   "vault": "<sealed token>",
//!   "version": "v0.4.0"
//! }
//! ```
//!
//! Labels written by older releases may omit fields, carry `null` values or
//! an empty `vault` string. Reading is lenient: every missing or null field
//! falls back to its default and an empty vault means "no vault".
//!
//! Secret file bindings are never part of `bind_volumes`. They only exist at
//! run time, once the vault has been opened.

use crate::constants::{
    CONFIG_LABEL, DEFAULT_COMMAND, DEFAULT_ENTRYPOINT, DEFAULT_FLAG_VOLUME_MODE, DEFAULT_HOSTNAME,
    DEFAULT_USER, HOME_PLACEHOLDER, MODE_READ_ONLY, MODE_READ_WRITE,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Host path to in-container binding.
pub type Volumes = BTreeMap<String, VolumeBinding>;

/// Bind mount access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeMode {
    Ro,
    Rw,
}

impl VolumeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeMode::Ro => MODE_READ_ONLY,
            VolumeMode::Rw => MODE_READ_WRITE,
        }
    }
}

impl FromStr for VolumeMode {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            MODE_READ_ONLY => Ok(VolumeMode::Ro),
            MODE_READ_WRITE => Ok(VolumeMode::Rw),
            _ => Err(()),
        }
    }
}

impl fmt::Display for VolumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how a host path is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub bind: String,
    pub mode: VolumeMode,
}

impl VolumeBinding {
    pub fn new(bind: impl Into<String>, mode: VolumeMode) -> Self {
        Self {
            bind: bind.into(),
            mode,
        }
    }
}

/// Runtime contract stored in the `kitt-config` label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeContract {
    #[serde(default = "default_entrypoint", deserialize_with = "or_default_entrypoint")]
    pub entrypoint: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bind_volumes: Volumes,
    #[serde(default, deserialize_with = "null_as_default")]
    pub forward_x11: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dind: bool,
    #[serde(default = "default_hostname", deserialize_with = "or_default_hostname")]
    pub hostname: String,
    #[serde(default = "default_command", deserialize_with = "or_default_command")]
    pub command: String,
    #[serde(default = "default_user", deserialize_with = "or_default_user")]
    pub user: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty"
    )]
    pub vault: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
}

impl Default for RuntimeContract {
    fn default() -> Self {
        Self {
            entrypoint: default_entrypoint(),
            bind_volumes: Volumes::new(),
            forward_x11: false,
            dind: false,
            hostname: default_hostname(),
            command: default_command(),
            user: default_user(),
            vault: None,
            version: crate::version(),
        }
    }
}

impl RuntimeContract {
    /// Parses a contract from its label value.
    pub fn from_label(value: &str) -> Result<Self> {
        serde_json::from_str(value).map_err(|e| Error::InvalidContract(e.to_string()))
    }

    /// Extracts the contract from an image's labels.
    ///
    /// `image` is only used for the error message.
    pub fn from_labels(labels: &HashMap<String, String>, image: &str) -> Result<Self> {
        let value = labels
            .get(CONFIG_LABEL)
            .ok_or_else(|| Error::NotKittImage(image.to_string()))?;
        Self::from_label(value)
    }

    /// Compact JSON label value.
    pub fn to_label(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Label map to attach to a build.
    pub fn to_labels(&self) -> Result<HashMap<String, String>> {
        Ok(HashMap::from([(CONFIG_LABEL.to_string(), self.to_label()?)]))
    }

    /// Indented JSON for display and editing.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Parses a `host:bind[:mode]` volume flag.
///
/// Mode defaults to `ro` and must be `ro` or `rw`.
pub fn parse_volume(volume: &str) -> Result<(String, VolumeBinding)> {
    let chunks: Vec<&str> = volume.split(':').collect();
    let (host, bind, mode) = match chunks.as_slice() {
        [host, bind] => (*host, *bind, DEFAULT_FLAG_VOLUME_MODE),
        [host, bind, mode] => (*host, *bind, *mode),
        _ => return Err(Error::InvalidVolume(volume.to_string())),
    };

    let mode = mode.parse().map_err(|_| Error::InvalidVolumeMode {
        volume: volume.to_string(),
        mode: mode.to_string(),
    })?;

    Ok((host.to_string(), VolumeBinding::new(bind, mode)))
}

/// Replaces `$HOME` in a host path with `home`.
pub fn expand_home(path: &str, home: Option<&str>) -> String {
    match home {
        Some(home) if path.contains(HOME_PLACEHOLDER) => path.replace(HOME_PLACEHOLDER, home),
        _ => path.to_string(),
    }
}

// -----------------------------------------------------------------------------
// Lenient field readers
// -----------------------------------------------------------------------------

fn default_entrypoint() -> String {
    DEFAULT_ENTRYPOINT.to_string()
}

fn default_hostname() -> String {
    DEFAULT_HOSTNAME.to_string()
}

fn default_command() -> String {
    DEFAULT_COMMAND.to_string()
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

fn or_default_entrypoint<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(non_empty(d)?.unwrap_or_else(default_entrypoint))
}

fn or_default_hostname<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(non_empty(d)?.unwrap_or_else(default_hostname))
}

fn or_default_command<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(non_empty(d)?.unwrap_or_else(default_command))
}

fn or_default_user<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(non_empty(d)?.unwrap_or_else(default_user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_mode_parse() {
        assert_eq!("ro".parse::<VolumeMode>(), Ok(VolumeMode::Ro));
        assert_eq!("rw".parse::<VolumeMode>(), Ok(VolumeMode::Rw));
        assert!("RW".parse::<VolumeMode>().is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(
            expand_home("$HOME/.ssh", Some("/home/alice")),
            "/home/alice/.ssh"
        );
        assert_eq!(expand_home("$HOME/.ssh", None), "$HOME/.ssh");
        assert_eq!(expand_home("/etc/hosts", Some("/home/alice")), "/etc/hosts");
    }
}
