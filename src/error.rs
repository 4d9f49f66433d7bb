//! Error types for kitt.
//!
//! Every variant here is fatal for the command that produced it. Degraded
//! but continuable states (a vault that will not open, a missing host group,
//! a temp directory that refuses to go away) never become an [`Error`]; they
//! are logged as warnings where they happen.

use std::path::PathBuf;

/// Result type alias for kitt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that terminate a kitt command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// The built-in default configuration could not be parsed.
    #[error("could not load default config: {0}")]
    DefaultConfig(String),

    /// User configuration file does not exist.
    #[error("config file {path} does not exist")]
    ConfigNotFound { path: PathBuf },

    /// User configuration file exists but cannot be read.
    #[error("config file {path} is not readable: {reason}")]
    ConfigUnreadable { path: PathBuf, reason: String },

    /// User configuration is neither valid TOML nor valid JSON.
    #[error("config file {path} cannot be parsed: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    /// Merged configuration does not match the expected shape.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Driver settings file exists and overwriting was not requested.
    #[error("settings file {path} already exists, use --force to overwrite")]
    SettingsExist { path: PathBuf },

    /// No per-user configuration directory on this platform.
    #[error("cannot locate the user configuration directory")]
    NoConfigDir,

    // =========================================================================
    // Plugin Errors
    // =========================================================================
    /// Plugin name is not part of the registry.
    #[error("unknown plugin \"{0}\"")]
    UnknownPlugin(String),

    /// Plugin section is missing data or has the wrong shape.
    #[error("cannot render plugin \"{name}\": {reason}")]
    PluginConfig { name: String, reason: String },

    // =========================================================================
    // Volume / Flag Errors
    // =========================================================================
    /// Volume flag is not `host:bind[:mode]`.
    #[error("invalid volume \"{0}\": expected host:bind[:mode]")]
    InvalidVolume(String),

    /// Volume mode is neither `ro` nor `rw`.
    #[error("unknown volume mode \"{mode}\" in \"{volume}\"")]
    InvalidVolumeMode { volume: String, mode: String },

    /// Local account named by `--user` does not exist.
    #[error("could not get \"{0}\" user infos")]
    UserNotFound(String),

    // =========================================================================
    // Image Errors
    // =========================================================================
    /// Image is not present locally.
    #[error("image {0} not found")]
    ImageNotFound(String),

    /// Image exists but has no runtime contract label.
    #[error("image {0} is not a kitt image")]
    NotKittImage(String),

    /// Runtime contract label does not parse.
    #[error("invalid runtime contract: {0}")]
    InvalidContract(String),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// Engine binary cannot be started.
    #[error("container engine {engine} unavailable: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    /// Engine command exited with a failure.
    #[error("{operation} failed: {reason}")]
    EngineCommand { operation: String, reason: String },

    // =========================================================================
    // Vault Errors
    // =========================================================================
    /// A configured secret source file cannot be read.
    #[error("secret file {path} is not readable: {reason}")]
    SecretFileUnreadable { path: PathBuf, reason: String },

    /// Vault could not be sealed.
    #[error("could not create vault: {0}")]
    VaultCreation(String),

    // =========================================================================
    // Interaction Errors
    // =========================================================================
    /// External editor exited with a failure.
    #[error("editor \"{editor}\" failed: {reason}")]
    EditorFailed { editor: String, reason: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// One-line message without low-level engine output.
    ///
    /// Engine failures carry the engine's stderr in their full message,
    /// which is only worth showing in verbose mode.
    pub fn short_message(&self) -> String {
        match self {
            Error::EngineCommand { operation, .. } => {
                format!("{} failed (run with -v for details)", operation)
            }
            Error::EngineUnavailable { engine, .. } => {
                format!("container engine {} unavailable (run with -v for details)", engine)
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
