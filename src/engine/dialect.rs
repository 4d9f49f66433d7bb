//! Engine dialects.
//!
//! Docker and Podman accept the same command line for everything kitt does,
//! except for a handful of details collected here.

use crate::constants::ENGINE_SOCKET_BIND;
use crate::driver::Driver;
use std::path::PathBuf;

/// Engine-specific command line details.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    fn driver(&self) -> Driver;

    /// Executable to invoke.
    fn binary(&self) -> &'static str {
        self.driver().binary()
    }

    /// Command whose output tells whether squashing is supported, or `None`
    /// if it always is.
    fn squash_probe(&self) -> Option<Vec<&'static str>>;

    /// Interprets the output of [`Dialect::squash_probe`].
    fn squash_supported(&self, probe_output: &str) -> bool {
        probe_output.trim() == "true"
    }

    /// Extra `run` flags.
    fn run_flags(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Host engine socket to expose to docker-in-docker sessions.
    fn engine_socket(&self) -> PathBuf;
}

/// Docker: squash is an experimental daemon feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerDialect;

impl Dialect for DockerDialect {
    fn driver(&self) -> Driver {
        Driver::Docker
    }

    fn squash_probe(&self) -> Option<Vec<&'static str>> {
        Some(vec!["info", "--format", "{{json .ExperimentalBuild}}"])
    }

    fn engine_socket(&self) -> PathBuf {
        PathBuf::from(ENGINE_SOCKET_BIND)
    }
}

/// Podman: rootless, squash always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct PodmanDialect;

impl Dialect for PodmanDialect {
    fn driver(&self) -> Driver {
        Driver::Podman
    }

    fn squash_probe(&self) -> Option<Vec<&'static str>> {
        None
    }

    // Keep the host uid inside the user namespace so bind mounts stay owned
    // by the operator.
    fn run_flags(&self) -> Vec<&'static str> {
        vec!["--userns=keep-id"]
    }

    fn engine_socket(&self) -> PathBuf {
        let runtime_dir = dirs::runtime_dir().unwrap_or_else(|| {
            PathBuf::from(format!("/run/user/{}", nix::unistd::getuid().as_raw()))
        });
        runtime_dir.join("podman").join("podman.sock")
    }
}
