//! Engine driven through its command line.
//!
//! Every operation is one or more `docker`/`podman` invocations. Output is
//! captured except for `run`, which hands the terminal to the container.

use super::{BuildRequest, Dialect, ImageManager, RunOptions, reference};
use crate::driver::Driver;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument, trace};

/// Captured output of an engine invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// [`ImageManager`] invoking the engine executable.
#[derive(Debug)]
pub struct CliImageManager {
    dialect: Box<dyn Dialect>,
}

impl CliImageManager {
    pub fn new(dialect: Box<dyn Dialect>) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Runs the engine with `args` and captures its output.
    #[instrument(skip(self, args), fields(engine = self.dialect.binary()))]
    pub async fn execute(&self, operation: &str, args: &[String]) -> Result<CommandOutput> {
        trace!("{} {}", self.dialect.binary(), args.join(" "));

        let output = Command::new(self.dialect.binary())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.unavailable(e))?;

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };
        debug!("{} exited with {}", operation, output.exit_code);
        Ok(output)
    }

    /// Like [`CliImageManager::execute`] but a non-zero exit is an error.
    pub async fn execute_checked(&self, operation: &str, args: &[String]) -> Result<CommandOutput> {
        let output = self.execute(operation, args).await?;
        if !output.success() {
            return Err(Error::EngineCommand {
                operation: operation.to_string(),
                reason: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Arguments for `build`, given the Dockerfile and context locations.
    pub fn build_args(
        &self,
        request: &BuildRequest,
        squash: bool,
        dockerfile: &Path,
        context: &Path,
    ) -> Vec<String> {
        let mut args = vec!["build".to_string()];
        if request.pull {
            args.push("--pull".to_string());
        }
        args.push("--rm".to_string());
        args.push("--no-cache".to_string());
        if squash {
            args.push("--squash".to_string());
        }
        args.push("-t".to_string());
        args.push(reference(&request.name, &request.tag));
        args.push("-f".to_string());
        args.push(dockerfile.to_string_lossy().into_owned());
        args.push(context.to_string_lossy().into_owned());
        args
    }

    /// Arguments for `run`. Environment values are not included.
    pub fn run_args(&self, options: &RunOptions) -> Vec<String> {
        let mut args: Vec<String> = ["run", "--rm", "-it", "--network", "host"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(self.dialect.run_flags().into_iter().map(String::from));

        args.push("--hostname".to_string());
        args.push(options.hostname.clone());

        for (host, binding) in &options.volumes {
            args.push("-v".to_string());
            args.push(format!("{}:{}:{}", host, binding.bind, binding.mode));
        }
        for name in options.env.keys() {
            args.push("-e".to_string());
            args.push(name.clone());
        }
        for cap in &options.cap_add {
            args.push("--cap-add".to_string());
            args.push(cap.clone());
        }
        for (host, address) in &options.extra_hosts {
            args.push("--add-host".to_string());
            args.push(format!("{}:{}", host, address));
        }
        for gid in &options.group_add {
            args.push("--group-add".to_string());
            args.push(gid.to_string());
        }
        if !options.user.is_empty() {
            args.push("--user".to_string());
            args.push(options.user.clone());
        }

        args.push(reference(&options.name, &options.tag));
        args.extend(command_argv(&options.command));
        args
    }

    async fn inspect_tags(&self, id: &str) -> Result<Vec<String>> {
        let output = self
            .execute_checked(
                "inspect",
                &strings(&["image", "inspect", "--format", "{{json .RepoTags}}", id]),
            )
            .await?;
        Ok(serde_json::from_str::<Option<Vec<String>>>(output.stdout.trim())?.unwrap_or_default())
    }

    fn unavailable(&self, e: std::io::Error) -> Error {
        Error::EngineUnavailable {
            engine: self.dialect.binary().to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl ImageManager for CliImageManager {
    fn driver(&self) -> Driver {
        self.dialect.driver()
    }

    fn engine_socket(&self) -> PathBuf {
        self.dialect.engine_socket()
    }

    async fn can_squash(&self) -> bool {
        let Some(probe) = self.dialect.squash_probe() else {
            return true;
        };
        match self.execute("info", &strings(&probe)).await {
            Ok(output) if output.success() => self.dialect.squash_supported(&output.stdout),
            Ok(output) => {
                debug!("Squash probe failed: {}", output.stderr.trim());
                false
            }
            Err(e) => {
                debug!("Squash probe failed: {}", e);
                false
            }
        }
    }

    async fn build(&self, request: &BuildRequest) -> Result<()> {
        let squash = request.squash && self.can_squash().await;

        let context = tempfile::Builder::new().prefix("kitt-build-").tempdir()?;
        let dockerfile = context.path().join("Dockerfile");
        std::fs::write(
            &dockerfile,
            format!(
                "{}\n{}",
                request.dockerfile.trim_end(),
                label_instructions(&request.labels)
            ),
        )?;

        let args = self.build_args(request, squash, &dockerfile, context.path());
        let output = self.execute_checked("build", &args).await?;
        trace!("build output:\n{}", output.stdout);
        Ok(())
    }

    async fn run(&self, options: &RunOptions) -> Result<i32> {
        let mut child = Command::new(self.dialect.binary())
            .args(self.run_args(options))
            .envs(&options.env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| self.unavailable(e))?;

        // The session owns the terminal; an interrupt must not take kitt
        // down before the caller gets to clean up.
        let status = loop {
            tokio::select! {
                status = child.wait() => break status?,
                _ = tokio::signal::ctrl_c() => debug!("Interrupt received during session"),
            }
        };

        let code = status.code().unwrap_or(-1);
        debug!("Session exited with {}", code);
        Ok(code)
    }

    async fn list(&self, repository: &str) -> Result<Vec<String>> {
        let output = self
            .execute_checked(
                "list",
                &strings(&["images", repository, "--format", "{{.Tag}}"]),
            )
            .await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|tag| !tag.is_empty() && *tag != "<none>")
            .map(String::from)
            .collect())
    }

    async fn remove(&self, name: &str, tag: &str) -> Result<()> {
        self.execute_checked("remove", &strings(&["rmi", &reference(name, tag)]))
            .await?;
        Ok(())
    }

    async fn prune(&self, repository: &str) -> Result<()> {
        for tag in self.list(repository).await? {
            self.remove(repository, &tag).await?;
        }
        self.execute_checked("prune", &strings(&["image", "prune", "-f"]))
            .await?;
        Ok(())
    }

    async fn refresh(&self, repository: &str) -> Result<Vec<String>> {
        let output = self
            .execute_checked(
                "refresh",
                &strings(&["images", repository, "--format", "{{.ID}}"]),
            )
            .await?;
        let ids: BTreeSet<&str> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect();

        let mut refreshed = Vec::new();
        for id in ids {
            let tags = self.inspect_tags(id).await?;
            let (local, origins): (Vec<&String>, Vec<&String>) = tags
                .iter()
                .partition(|t| tag_in_repository(t, repository).is_some());

            for origin in origins {
                debug!("Refreshing {} from {}", id, origin);
                self.execute_checked("pull", &strings(&["pull", origin]))
                    .await?;
                for alias in &local {
                    self.execute_checked("tag", &strings(&["tag", origin, alias]))
                        .await?;
                }
                refreshed.push(origin.clone());
            }
        }
        Ok(refreshed)
    }

    async fn pull(&self, repository: &str, tag: &str, alias: Option<&str>) -> Result<()> {
        let remote = reference(repository, tag);
        self.execute_checked("pull", &strings(&["pull", &remote]))
            .await?;
        if let Some(alias) = alias {
            self.execute_checked("tag", &strings(&["tag", &remote, &reference(alias, tag)]))
                .await?;
        }
        Ok(())
    }

    async fn push(&self, repository: &str, name: &str, tag: &str) -> Result<()> {
        let remote = reference(repository, tag);
        self.execute_checked("tag", &strings(&["tag", &reference(name, tag), &remote]))
            .await?;

        let pushed = self.execute_checked("push", &strings(&["push", &remote])).await;
        if let Err(e) = self.remove(repository, tag).await {
            debug!("Could not remove temporary tag {}: {}", remote, e);
        }
        pushed.map(|_| ())
    }

    async fn stat(&self, name: &str, tag: &str) -> Result<bool> {
        let output = self
            .execute("stat", &strings(&["image", "inspect", &reference(name, tag)]))
            .await?;
        Ok(output.success())
    }

    async fn labels(&self, name: &str, tag: &str) -> Result<HashMap<String, String>> {
        let image = reference(name, tag);
        let output = self
            .execute(
                "labels",
                &strings(&["image", "inspect", "--format", "{{json .Config.Labels}}", &image]),
            )
            .await?;
        if !output.success() {
            let stderr = output.stderr.trim();
            debug!("inspect {}: {}", image, stderr);
            if is_missing_image(stderr) {
                return Err(Error::ImageNotFound(image));
            }
            return Err(Error::EngineCommand {
                operation: "labels".to_string(),
                reason: stderr.to_string(),
            });
        }
        Ok(serde_json::from_str::<Option<HashMap<String, String>>>(output.stdout.trim())?
            .unwrap_or_default())
    }
}

/// `LABEL` instructions for `labels`, in key order.
pub fn label_instructions(labels: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = labels.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| format!("LABEL \"{}\"=\"{}\"\n", escape(key), escape(&labels[key])))
        .collect()
}

/// Returns the tag of `image` if it belongs to `repository`.
///
/// Podman reports local images as `localhost/<repository>`.
pub fn tag_in_repository<'a>(image: &'a str, repository: &str) -> Option<&'a str> {
    let (repo, tag) = image.rsplit_once(':')?;
    if tag.contains('/') {
        return None;
    }
    let repo = repo.strip_prefix("localhost/").unwrap_or(repo);
    (repo == repository).then_some(tag)
}

/// Container argv for a contract command.
///
/// Plain words are passed as is; anything using shell syntax (quotes,
/// expansions, operators) runs through `sh -c`.
pub fn command_argv(command: &str) -> Vec<String> {
    const SHELL_SYNTAX: &[char] = &[
        '\'', '"', '\\', '$', '`', '|', '&', ';', '<', '>', '(', ')', '*', '?', '~',
    ];
    if command.contains(SHELL_SYNTAX) {
        return vec!["sh".to_string(), "-c".to_string(), command.to_string()];
    }
    command.split_whitespace().map(String::from).collect()
}

/// Whether `image inspect` failed because the image does not exist.
///
/// Docker says "No such image"/"No such object"; podman says
/// "image not known" or "failed to find image".
fn is_missing_image(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    ["no such image", "no such object", "image not known", "failed to find image"]
        .iter()
        .any(|needle| stderr.contains(needle))
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('\n', "\\n")
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
