//! # Configuration Loader
//!
//! Loads the kitt build configuration: the built-in defaults shipped inside
//! the binary, deep-overridden by an optional user document.
//!
//! ## Layering
//!
//! ```text
//! static/default.toml ──┐
//!                       ├─► merge(user, default) ─► KittConfig (typed)
//! user file (TOML/JSON)─┘
//! ```
//!
//! The user document is parsed as TOML first and as JSON when that fails.
//! Both documents are merged as untyped trees so that the empty-value rule
//! (see [`merge`]) applies uniformly, then deserialized once into
//! [`KittConfig`].

use crate::constants::{
    DEFAULT_BASE_IMAGE, DEFAULT_COMMAND, DEFAULT_CONFIG_VOLUME_MODE, DEFAULT_HOSTNAME, DEFAULT_USER,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Built-in configuration document.
pub const DEFAULT_CONFIG: &str = include_str!("../static/default.toml");

// =============================================================================
// Typed Configuration
// =============================================================================

/// Fully merged build configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KittConfig {
    /// Image and user setup.
    pub workspace: Workspace,
    /// Runtime toggles recorded in the contract.
    pub options: Options,
    /// Plugin sections in declaration order.
    pub plugins: Map<String, Value>,
    /// Secrets sealed into the image vault.
    pub secrets: Option<SecretsConfig>,
}

/// `[workspace]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workspace {
    pub image: String,
    pub user: String,
    pub hostname: String,
    pub default_shell: String,
    pub tools: Vec<String>,
    pub envs: Vec<EnvVar>,
    pub volumes: Vec<WorkspaceVolume>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            image: DEFAULT_BASE_IMAGE.to_string(),
            user: DEFAULT_USER.to_string(),
            hostname: DEFAULT_HOSTNAME.to_string(),
            default_shell: DEFAULT_COMMAND.to_string(),
            tools: Vec::new(),
            envs: Vec::new(),
            volumes: Vec::new(),
        }
    }
}

/// A `NAME = value` environment declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Volume declared in the workspace.
///
/// `host` and `bind` are optional at parse time: entries missing either are
/// skipped with a warning at build time rather than failing the whole config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceVolume {
    pub host: Option<String>,
    pub bind: Option<String>,
    pub mode: Option<String>,
}

impl WorkspaceVolume {
    /// Mode to apply, falling back to `rw`.
    pub fn mode_or_default(&self) -> &str {
        self.mode.as_deref().unwrap_or(DEFAULT_CONFIG_VOLUME_MODE)
    }
}

/// `[options]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub forward_x11: bool,
    pub docker_in_docker: bool,
}

/// `[secrets]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub files: Vec<SecretFile>,
    pub envs: Vec<EnvVar>,
}

impl SecretsConfig {
    /// True when there is nothing to seal.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.envs.is_empty()
    }
}

/// Host file sealed into the vault and mounted at `dest` at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretFile {
    pub src: PathBuf,
    pub dest: String,
}

impl KittConfig {
    /// Converts a merged document into the typed configuration.
    pub fn from_document(document: Value) -> Result<Self> {
        serde_json::from_value(document).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Secrets worth sealing, if any.
    pub fn secrets(&self) -> Option<&SecretsConfig> {
        self.secrets.as_ref().filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Loads the configuration, merging the file at `path` over the defaults.
pub fn load(path: Option<&Path>) -> Result<KittConfig> {
    KittConfig::from_document(Value::Object(load_document(path)?))
}

/// Loads the merged configuration as an untyped document.
pub fn load_document(path: Option<&Path>) -> Result<Map<String, Value>> {
    let defaults = default_document()?;
    let Some(path) = path else {
        return Ok(defaults);
    };

    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let user = parse_document(&text).map_err(|reason| Error::ConfigParse {
        path: path.to_path_buf(),
        reason,
    })?;

    debug!("Merging {} over default config", path.display());
    Ok(merge(user, defaults))
}

/// Parses the built-in defaults.
pub fn default_document() -> Result<Map<String, Value>> {
    match toml::from_str::<Map<String, Value>>(DEFAULT_CONFIG) {
        Ok(doc) if !doc.is_empty() => Ok(doc),
        Ok(_) => Err(Error::DefaultConfig("document is empty".to_string())),
        Err(e) => Err(Error::DefaultConfig(e.to_string())),
    }
}

/// Parses a user document: TOML first, JSON on failure.
///
/// An empty document is rejected; the error string carries both parser
/// messages when neither format applies.
pub fn parse_document(text: &str) -> std::result::Result<Map<String, Value>, String> {
    let document = match toml::from_str::<Map<String, Value>>(text) {
        Ok(doc) => doc,
        Err(toml_err) => {
            debug!("Not TOML, trying JSON: {}", toml_err);
            serde_json::from_str::<Map<String, Value>>(text)
                .map_err(|json_err| format!("toml: {}; json: {}", toml_err.message(), json_err))?
        }
    };

    if document.is_empty() {
        return Err("document is empty".to_string());
    }
    Ok(document)
}

// =============================================================================
// Merging
// =============================================================================

/// Deep-merges `src` into `dest` and returns `dest`.
///
/// For each key of `src`:
/// - both sides are mappings: merge recursively;
/// - `dest` has the key and `src`'s value is empty (`""`, `[]`, `[""]`):
///   keep `dest`'s value;
/// - otherwise `src`'s value wins.
///
/// Keys only present in `dest` are untouched.
pub fn merge(src: Map<String, Value>, mut dest: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in src {
        match (dest.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(inner)) => {
                *existing = merge(inner, std::mem::take(existing));
            }
            (Some(_), value) if is_empty_value(&value) => {}
            (_, value) => {
                dest.insert(key, value);
            }
        }
    }
    dest
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => match items.as_slice() {
            [] => true,
            [Value::String(s)] => s.is_empty(),
            _ => false,
        },
        _ => false,
    }
}
