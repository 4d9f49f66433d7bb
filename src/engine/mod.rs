//! Container engine abstraction.
//!
//! [`ImageManager`] is the only seam between kitt and the engine. The real
//! implementation, [`CliImageManager`], drives the engine's command line;
//! engine-specific behavior lives in a [`Dialect`] chosen once from the
//! driver settings.
//!
//! ```text
//! KittClient ──► dyn ImageManager ──► CliImageManager ──► docker | podman
//!                                          │
//!                                          └─ Dialect (DockerDialect | PodmanDialect)
//! ```

pub mod cli;
pub mod dialect;

pub use self::cli::{CliImageManager, CommandOutput};
pub use self::dialect::{Dialect, DockerDialect, PodmanDialect};

use crate::contract::Volumes;
use crate::driver::Driver;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// Image build parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildRequest {
    /// Repository, e.g. `kitt`.
    pub name: String,
    /// Tag within the repository.
    pub tag: String,
    /// Build specification text.
    pub dockerfile: String,
    /// Labels attached to the resulting image.
    pub labels: HashMap<String, String>,
    /// Squash layers if the engine supports it.
    pub squash: bool,
    /// Always pull the base image.
    pub pull: bool,
}

/// Interactive container parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub name: String,
    pub tag: String,
    pub hostname: String,
    pub volumes: Volumes,
    /// Passed through the engine process environment, never as arguments.
    pub env: BTreeMap<String, String>,
    pub cap_add: Vec<String>,
    /// Hostname to address.
    pub extra_hosts: BTreeMap<String, String>,
    pub command: String,
    /// `uid:gid`.
    pub user: String,
    pub group_add: Vec<u32>,
}

/// Engine operations kitt relies on.
///
/// Image references are `name:tag`. Operations that reach the engine fail
/// with [`crate::Error::EngineUnavailable`] when it cannot be started and
/// [`crate::Error::EngineCommand`] when it reports a failure.
#[async_trait]
pub trait ImageManager: Send + Sync {
    /// Engine this manager talks to.
    fn driver(&self) -> Driver;

    /// Host socket exposed to docker-in-docker sessions.
    fn engine_socket(&self) -> PathBuf;

    /// Whether builds can squash layers.
    async fn can_squash(&self) -> bool;

    /// Builds and tags an image.
    async fn build(&self, request: &BuildRequest) -> Result<()>;

    /// Runs an interactive, auto-removed container attached to the current
    /// terminal and returns its exit code.
    async fn run(&self, options: &RunOptions) -> Result<i32>;

    /// Tags present in `repository`.
    async fn list(&self, repository: &str) -> Result<Vec<String>>;

    /// Removes `name:tag`.
    async fn remove(&self, name: &str, tag: &str) -> Result<()>;

    /// Removes every image in `repository`, then dangling images.
    async fn prune(&self, repository: &str) -> Result<()>;

    /// Re-pulls the origin of every image in `repository` and re-tags it.
    /// Returns the refreshed origin references.
    async fn refresh(&self, repository: &str) -> Result<Vec<String>>;

    /// Pulls `repository:tag`, tagging it `alias:tag` when given.
    async fn pull(&self, repository: &str, tag: &str, alias: Option<&str>) -> Result<()>;

    /// Pushes `name:tag` as `repository:tag`, removing the temporary tag
    /// afterwards.
    async fn push(&self, repository: &str, name: &str, tag: &str) -> Result<()>;

    /// Whether `name:tag` exists locally.
    async fn stat(&self, name: &str, tag: &str) -> Result<bool>;

    /// Labels of `name:tag`.
    async fn labels(&self, name: &str, tag: &str) -> Result<HashMap<String, String>>;
}

/// Builds the image manager for `driver`.
pub fn for_driver(driver: Driver) -> Arc<dyn ImageManager> {
    let dialect: Box<dyn Dialect> = match driver {
        Driver::Docker => Box::new(DockerDialect),
        Driver::Podman => Box::new(PodmanDialect),
    };
    Arc::new(CliImageManager::new(dialect))
}

/// `name:tag`.
pub fn reference(name: &str, tag: &str) -> String {
    format!("{}:{}", name, tag)
}
