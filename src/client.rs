//! # Kitt Client
//!
//! Orchestrates every kitt command on top of an [`ImageManager`].
//!
//! ## Build
//!
//! ```text
//! config::load ─► plugins::compose_all ─► Composer::compose ─┐
//!                                                            ├─► ImageManager::build
//! volumes + [vault::create_vault] ─► RuntimeContract label ──┘      (kitt:<name>)
//! ```
//!
//! ## Run
//!
//! ```text
//! stat ─► labels ─► RuntimeContract ─► ids, groups, volumes ─► [open vault ─► VaultFs]
//!                                                                        │
//!                         release VaultFs ◄── ImageManager::run ◄────────┘
//! ```
//!
//! Volume flags and `--user` are validated before the engine is touched. The
//! ephemeral secret filesystem is released whether or not the session
//! succeeds.

use crate::composer::{ComposeContext, Composer};
use crate::config::{self, KittConfig};
use crate::console::Console;
use crate::constants::{
    CONFIG_LABEL, CONTAINER_CAPABILITIES, DEFAULT_ENTRYPOINT, DEPRECATED_TAG, DISPLAY_ENV,
    ENGINE_GROUP, ENGINE_SOCKET_BIND, ENGINE_SOCKET_PLACEHOLDER, HOST_ALIAS_ADDRESS,
    IMAGE_REPOSITORY, LEGACY_VAULT_LABEL, PATCH_TAG_SUFFIX,
};
use crate::contract::{
    RuntimeContract, VolumeBinding, VolumeMode, Volumes, expand_home, parse_volume,
};
use crate::driver::{Driver, Settings};
use crate::engine::{BuildRequest, ImageManager, RunOptions, reference};
use crate::error::{Error, Result};
use crate::plugins;
use crate::terminal::Terminal;
use crate::vault::{self, VaultFs, create_vault, open_vault};
use nix::unistd::{Group, User, getgid, getuid};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tracing::{debug, info};

/// Run-time additions on top of the image contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunExtras {
    /// Local account whose uid:gid the session runs as.
    pub run_as: Option<String>,
    /// Extra `host:bind[:mode]` volumes.
    pub volumes: Vec<String>,
    /// Force docker-in-docker group access.
    pub dind: bool,
}

/// Command handler.
pub struct KittClient {
    manager: Arc<dyn ImageManager>,
    console: Console,
    terminal: Arc<dyn Terminal>,
    composer: Composer,
}

impl KittClient {
    pub fn new(manager: Arc<dyn ImageManager>, console: Console, terminal: Arc<dyn Terminal>) -> Self {
        Self {
            manager,
            console,
            terminal,
            composer: Composer::default(),
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    // =========================================================================
    // build
    // =========================================================================

    /// Builds `kitt:<name>` from the config at `config_path` (defaults only
    /// when `None`) and returns the contract attached to it.
    pub async fn build(&self, name: &str, config_path: Option<&Path>) -> Result<RuntimeContract> {
        let config = config::load(config_path)?;
        let fragments = plugins::compose_all(&config.plugins)?;
        let dockerfile = self
            .composer
            .compose(&ComposeContext::from_config(&config, fragments));
        debug!("Rendered build specification:\n{}", dockerfile);

        let bind_volumes = self.build_volumes(&config);

        let vault = match config.secrets() {
            Some(secrets) => Some(create_vault(secrets, self.terminal.as_ref(), &self.console)?),
            None => None,
        };

        let contract = RuntimeContract {
            entrypoint: DEFAULT_ENTRYPOINT.to_string(),
            bind_volumes,
            forward_x11: config.options.forward_x11,
            dind: config.options.docker_in_docker,
            hostname: config.workspace.hostname.clone(),
            command: config.workspace.default_shell.clone(),
            user: config.workspace.user.clone(),
            vault,
            version: crate::version(),
        };

        if !self.manager.can_squash().await {
            self.console
                .warning("Engine cannot squash layers (Docker needs experimental mode).");
            self.console
                .warning("To significantly reduce image size, please consider enabling it.");
        }

        let request = BuildRequest {
            name: IMAGE_REPOSITORY.to_string(),
            tag: name.to_string(),
            dockerfile,
            labels: contract.to_labels()?,
            squash: true,
            pull: true,
        };

        {
            let _waiter = self.console.waiter("Building image");
            self.manager.build(&request).await?;
        }

        info!(image = %reference(IMAGE_REPOSITORY, name), "built");
        self.console.success("Build success !");
        Ok(contract)
    }

    fn build_volumes(&self, config: &KittConfig) -> Volumes {
        let mut volumes = Volumes::new();

        // The host socket differs per engine and user; `run` resolves it.
        if config.options.docker_in_docker {
            volumes.insert(
                ENGINE_SOCKET_PLACEHOLDER.to_string(),
                VolumeBinding::new(ENGINE_SOCKET_BIND, VolumeMode::Rw),
            );
        }

        for volume in &config.workspace.volumes {
            let host = volume.host.as_deref().filter(|h| !h.is_empty());
            let bind = volume.bind.as_deref().filter(|b| !b.is_empty());
            let (Some(host), Some(bind)) = (host, bind) else {
                self.console
                    .warning(format!("Bad volume format : \"{:?}\"", volume));
                continue;
            };
            let Ok(mode) = volume.mode_or_default().parse::<VolumeMode>() else {
                self.console.warning(format!(
                    "Unknown mode \"{}\" for volume {}, skipping",
                    volume.mode_or_default(),
                    host
                ));
                continue;
            };
            volumes.insert(host.to_string(), VolumeBinding::new(bind, mode));
        }

        volumes
    }

    // =========================================================================
    // run
    // =========================================================================

    /// Starts an interactive session in `kitt:<name>` and returns its exit
    /// code.
    pub async fn run(&self, name: &str, extras: &RunExtras) -> Result<i32> {
        let flag_volumes = extras
            .volumes
            .iter()
            .map(|v| parse_volume(v))
            .collect::<Result<Vec<_>>>()?;
        let (uid, gid) = resolve_ids(extras.run_as.as_deref())?;

        if !self.manager.stat(IMAGE_REPOSITORY, name).await? {
            self.console.info("Use `kitt pull` to fetch it first.");
            return Err(Error::ImageNotFound(reference(IMAGE_REPOSITORY, name)));
        }

        let contract = self.contract(name).await?;

        let mut groups = Vec::new();
        if contract.dind || extras.dind {
            match Group::from_name(ENGINE_GROUP) {
                Ok(Some(group)) => groups.push(group.gid.as_raw()),
                _ => self
                    .console
                    .warning(format!("Could not find host group \"{}\"", ENGINE_GROUP)),
            }
        }

        let home = dirs::home_dir().map(|h| h.to_string_lossy().into_owned());
        let socket = self.manager.engine_socket().to_string_lossy().into_owned();
        let resolve = |host: &str| {
            if host == ENGINE_SOCKET_PLACEHOLDER {
                socket.clone()
            } else {
                expand_home(host, home.as_deref())
            }
        };
        let mut volumes: Volumes = contract
            .bind_volumes
            .iter()
            .map(|(host, binding)| (resolve(host), binding.clone()))
            .collect();
        for (host, binding) in flag_volumes {
            volumes.insert(resolve(&host), binding);
        }

        let mut env = BTreeMap::new();
        let mut vault_fs: Option<VaultFs> = None;
        if let Some(token) = &contract.vault
            && let Some(opened) = open_vault(token, self.terminal.as_ref(), &self.console)
        {
            env.extend(opened.envs);
            if !opened.files.is_empty() {
                let (fs, bindings) = VaultFs::materialize(&opened.files)?;
                vault_fs = Some(fs);
                volumes.extend(bindings);
            }
        }

        if contract.forward_x11 {
            self.forward_x11(&contract.hostname, uid, &mut env).await;
        }

        let options = RunOptions {
            name: IMAGE_REPOSITORY.to_string(),
            tag: name.to_string(),
            hostname: contract.hostname.clone(),
            volumes,
            env,
            cap_add: CONTAINER_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            extra_hosts: BTreeMap::from([(
                contract.hostname.clone(),
                HOST_ALIAS_ADDRESS.to_string(),
            )]),
            command: contract.command.clone(),
            user: format!("{}:{}", uid, gid),
            group_add: groups,
        };

        let result = self.manager.run(&options).await;
        vault::release(vault_fs, &self.console);
        result
    }

    async fn forward_x11(&self, hostname: &str, uid: u32, env: &mut BTreeMap<String, String>) {
        match std::env::var(DISPLAY_ENV) {
            Ok(display) => {
                env.insert(DISPLAY_ENV.to_string(), display);
            }
            Err(_) => {
                self.console
                    .warning("X11 forwarding requested but DISPLAY is not set");
                return;
            }
        }

        // Root is usually missing from the X server access list.
        if uid == 0 {
            let status = tokio::process::Command::new("xhost")
                .arg(format!("+local:{}", hostname))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            debug!("xhost: {:?}", status);
        }
    }

    // =========================================================================
    // image management
    // =========================================================================

    /// Prints and returns the local kitt image names.
    pub async fn list(&self) -> Result<Vec<String>> {
        let names = self.manager.list(IMAGE_REPOSITORY).await?;
        for name in &names {
            self.console.info(format!("➜ {}", name));
        }
        Ok(names)
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        self.manager.remove(IMAGE_REPOSITORY, name).await?;
        self.console.success("Done !");
        Ok(())
    }

    pub async fn prune(&self) -> Result<()> {
        {
            let _waiter = self.console.waiter("Pruning kitt images");
            self.manager.prune(IMAGE_REPOSITORY).await?;
        }
        self.console.success("Prune done !");
        Ok(())
    }

    pub async fn refresh(&self) -> Result<Vec<String>> {
        let refreshed = {
            let _waiter = self.console.waiter("Refreshing local images");
            self.manager.refresh(IMAGE_REPOSITORY).await?
        };
        for origin in &refreshed {
            self.console.info(format!("➜ {}", origin));
        }
        self.console.success("Refresh done !");
        Ok(refreshed)
    }

    /// Pulls `<repository>:<tag>` and aliases it as `kitt:<tag>`.
    pub async fn pull(&self, repository: &str, tag: &str) -> Result<()> {
        if tag == DEPRECATED_TAG {
            self.console.warning("Tag \"latest\" is deprecated.");
            self.console
                .warning("Use kitt image descriptor instead (Ex. \"devops\").");
        }

        {
            let _waiter = self
                .console
                .waiter(format!("Pulling image {} from registry", tag));
            self.manager
                .pull(repository, tag, Some(IMAGE_REPOSITORY))
                .await?;
        }

        let labels = self.manager.labels(IMAGE_REPOSITORY, tag).await?;
        if !labels.contains_key(CONFIG_LABEL) {
            self.console.warning("Image does not look like a kitt image");
        }

        self.console.success("Pull done !");
        Ok(())
    }

    /// Pushes `kitt:<name>` to `<repository>:<name>`.
    pub async fn push(&self, repository: &str, name: &str) -> Result<()> {
        let repository = repository.trim_end_matches('/');

        if !self.manager.stat(IMAGE_REPOSITORY, name).await? {
            return Err(Error::ImageNotFound(reference(IMAGE_REPOSITORY, name)));
        }

        {
            let _waiter = self.console.waiter(format!("Pushing image {}", name));
            self.manager
                .push(repository, IMAGE_REPOSITORY, name)
                .await?;
        }

        self.console.success("Push done !");
        Ok(())
    }

    // =========================================================================
    // contract
    // =========================================================================

    /// Prints the runtime contract of `kitt:<name>`.
    pub async fn inspect(&self, name: &str) -> Result<RuntimeContract> {
        let contract = self.contract(name).await?;
        self.console.info(contract.to_pretty_json()?);
        Ok(contract)
    }

    /// Edits the contract of `kitt:<name>` and builds `kitt:<name>-patch`
    /// from it.
    ///
    /// The vault is kept out of the editor and carried over as is, unless
    /// `drop_vault` is set.
    pub async fn patch(&self, name: &str, drop_vault: bool) -> Result<RuntimeContract> {
        let labels = self.manager.labels(IMAGE_REPOSITORY, name).await?;
        let mut contract = contract_from_labels(&labels, &reference(IMAGE_REPOSITORY, name))?;
        let vault = contract.vault.take();

        let edited = self.terminal.edit(&contract.to_pretty_json()?)?;
        let mut patched = RuntimeContract::from_label(&edited)?;

        patched.vault = if drop_vault {
            if vault.is_some() {
                self.console.warning("Vault dropped from patched image");
            }
            None
        } else {
            vault
        };

        // The patched image inherits every label of its base. Blank the
        // legacy vault so only the contract decides what survives.
        let mut patch_labels = patched.to_labels()?;
        if labels.contains_key(LEGACY_VAULT_LABEL) {
            patch_labels.insert(LEGACY_VAULT_LABEL.to_string(), String::new());
        }

        let tag = format!("{}{}", name, PATCH_TAG_SUFFIX);
        let request = BuildRequest {
            name: IMAGE_REPOSITORY.to_string(),
            tag: tag.clone(),
            dockerfile: format!("FROM {}", reference(IMAGE_REPOSITORY, name)),
            labels: patch_labels,
            squash: false,
            pull: false,
        };

        {
            let _waiter = self
                .console
                .waiter(format!("Building patched image \"{}\"", tag));
            self.manager.build(&request).await?;
        }

        self.console.success("Patch success !");
        Ok(patched)
    }

    async fn contract(&self, name: &str) -> Result<RuntimeContract> {
        let labels = self.manager.labels(IMAGE_REPOSITORY, name).await?;
        contract_from_labels(&labels, &reference(IMAGE_REPOSITORY, name))
    }
}

fn contract_from_labels(labels: &HashMap<String, String>, image: &str) -> Result<RuntimeContract> {
    let mut contract = RuntimeContract::from_labels(labels, image)?;

    // Older images kept the vault in its own label.
    if contract.vault.is_none()
        && let Some(token) = labels.get(LEGACY_VAULT_LABEL)
        && !token.trim().is_empty()
    {
        debug!(image = %image, "using legacy vault label");
        contract.vault = Some(token.clone());
    }

    Ok(contract)
}

/// Writes the driver preference to `path`, or the default location.
pub fn set_driver(
    driver: Driver,
    force: bool,
    path: Option<PathBuf>,
    console: &Console,
) -> Result<PathBuf> {
    let path = path
        .or_else(Settings::default_path)
        .ok_or(Error::NoConfigDir)?;
    Settings { driver }.save_to(&path, force)?;
    console.success(format!("Driver set to {}", driver));
    Ok(path)
}

/// uid and gid the session runs as.
fn resolve_ids(run_as: Option<&str>) -> Result<(u32, u32)> {
    let Some(name) = run_as else {
        return Ok((getuid().as_raw(), getgid().as_raw()));
    };
    match User::from_name(name) {
        Ok(Some(user)) => Ok((user.uid.as_raw(), user.gid.as_raw())),
        Ok(None) => Err(Error::UserNotFound(name.to_string())),
        Err(e) => {
            debug!("User lookup failed: {}", e);
            Err(Error::UserNotFound(name.to_string()))
        }
    }
}
