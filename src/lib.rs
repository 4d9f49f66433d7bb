//! # kitt
//!
//! **Portable developer shells on top of Docker or Podman**
//!
//! kitt turns a declarative configuration file into a container image and
//! later starts interactive sessions from that image alone. Everything a
//! session needs (hostname, volumes, user, display forwarding, encrypted
//! secrets) is serialized into an image label at build time, so the
//! configuration file is never needed again at run time.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                               kitt                                  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │                        KittClient                           │    │
//! │  │  build │ run │ list │ remove │ prune │ refresh │ pull │ push │    │
//! │  │                     inspect │ patch                         │    │
//! │  └─────────────────────────────────────────────────────────────┘    │
//! │         │                     │                      │              │
//! │  ┌──────┴───────┐   ┌─────────┴────────┐   ┌─────────┴────────┐     │
//! │  │ config       │   │ contract         │   │ vault            │     │
//! │  │ plugins      │   │ kitt-config label│   │ seal / open      │     │
//! │  │ composer     │   │ volume flags     │   │ ephemeral FS     │     │
//! │  └──────────────┘   └──────────────────┘   └─────────┬────────┘     │
//! │                                                      │              │
//! │                                            ┌─────────┴────────┐     │
//! │                                            │ crypto           │     │
//! │                                            │ Argon2id +       │     │
//! │                                            │ XChaCha20-Poly   │     │
//! │                                            └──────────────────┘     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                     ImageManager (engine seam)                      │
//! │  ┌────────────────────────────────────────────────────────────┐     │
//! │  │ CliImageManager ── Dialect: DockerDialect │ PodmanDialect  │     │
//! │  └────────────────────────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Image Round Trip
//!
//! ```text
//!   build                                  run
//!   ─────                                  ───
//!   default.toml ◄─ merge ─ user config    labels["kitt-config"]
//!        │                                      │
//!        ▼                                      ▼
//!   Dockerfile + RuntimeContract ──────►   RuntimeContract
//!        │          (label)                     │
//!        ▼                                      ▼
//!   engine build                           [vault ─► temp files] ─► engine run
//! ```
//!
//! # Secrets
//!
//! Secret files and environment variables are sealed with a password-derived
//! key and stored in the contract's `vault` field. They are decrypted only
//! for the lifetime of a `run`: files land in a private temporary directory
//! that is removed when the session ends, and environment values reach the
//! engine through its process environment, never its argument list.
//!
//! # Example
//!
//! ```rust,ignore
//! use kitt::{Console, InteractiveTerminal, KittClient, RunExtras, Settings, engine};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> kitt::Result<()> {
//!     let manager = engine::for_driver(Settings::load().driver);
//!     let client = KittClient::new(manager, Console::new(false), Arc::new(InteractiveTerminal));
//!
//!     client.build("devops", Some("devops.toml".as_ref())).await?;
//!     client.run("devops", &RunExtras::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod composer;
pub mod config;
pub mod console;
pub mod constants;
pub mod contract;
pub mod crypto;
pub mod driver;
pub mod engine;
pub mod error;
pub mod plugins;
pub mod terminal;
pub mod vault;

// Re-exports
pub use client::{KittClient, RunExtras, set_driver};
pub use composer::{ComposeContext, Composer};
pub use config::KittConfig;
pub use console::Console;
pub use contract::{RuntimeContract, VolumeBinding, VolumeMode, Volumes};
pub use driver::{Driver, Settings};
pub use engine::{BuildRequest, ImageManager, RunOptions};
pub use error::{Error, Result};
pub use plugins::Plugin;
pub use terminal::{InteractiveTerminal, Terminal};
pub use vault::{Vault, VaultFile, VaultFs};

/// Tool version as recorded in contracts, e.g. `v0.4.0`.
pub fn version() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}
