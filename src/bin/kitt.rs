//! kitt - portable developer shells
//!
//! ## Usage
//!
//! ```sh
//! kitt build devops.toml devops        # build kitt:devops
//! kitt run devops -v ~/src:/src:rw     # start a session
//! kitt push registry.example.com/me/devops devops
//! kitt pull registry.example.com/me/devops devops
//! kitt inspect devops                  # show the runtime contract
//! kitt patch devops                    # edit it, build kitt:devops-patch
//! kitt config --driver podman          # switch engine
//! ```

use clap::{Parser, Subcommand};
use kitt::{
    Console, Driver, InteractiveTerminal, KittClient, RunExtras, Settings, engine, set_driver,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// =============================================================================
// CLI Parsing
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "kitt")]
#[command(about = "Portable developer shells")]
#[command(version)]
struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build an image from a config file
    Build {
        /// Config file (TOML or JSON)
        config: PathBuf,
        /// Image name
        name: String,
    },

    /// Start an interactive session
    Run {
        /// Image name
        name: String,

        /// Extra volume, host:bind[:ro|rw] (read-only by default)
        #[arg(short = 'v', long = "volume")]
        volumes: Vec<String>,

        /// Run as this local user's uid:gid
        #[arg(short, long)]
        user: Option<String>,

        /// Grant access to the host engine socket group
        #[arg(long)]
        dind: bool,

        /// Pull the image first
        #[arg(short, long, requires = "registry")]
        pull: bool,

        /// Registry repository to pull from
        #[arg(short, long)]
        registry: Option<String>,
    },

    /// Pull an image from a registry
    Pull {
        /// Registry repository, e.g. registry.example.com/me/kitt
        registry: String,
        /// Image name (tag)
        name: String,
    },

    /// Push an image to a registry
    Push {
        /// Registry repository
        registry: String,
        /// Image name
        name: String,
    },

    /// List local images
    List,

    /// Remove a local image
    Remove {
        /// Image name
        name: String,
    },

    /// Remove every local kitt image
    Prune,

    /// Re-pull local images from where they came from
    Refresh,

    /// Show an image's runtime contract
    Inspect {
        /// Image name
        name: String,
    },

    /// Edit an image's runtime contract without rebuilding
    Patch {
        /// Image name
        name: String,

        /// Leave the vault out of the patched image
        #[arg(long)]
        drop_vault: bool,
    },

    /// Configure the container engine
    Config {
        /// Engine to use
        #[arg(long, value_enum)]
        driver: Driver,

        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },

    /// Print the version
    Version,
}

// =============================================================================
// Entry Point
// =============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "kitt=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let console = Console::new(cli.verbose > 0);

    match dispatch(cli.command, &console).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if console.is_verbose() {
                console.error(e.to_string());
            } else {
                console.error(e.short_message());
            }
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands, console: &Console) -> kitt::Result<()> {
    match command {
        Commands::Version => {
            console.info(kitt::version());
            return Ok(());
        }
        Commands::Config { driver, force } => {
            set_driver(driver, force, None, console)?;
            return Ok(());
        }
        _ => {}
    }

    let settings = Settings::load();
    tracing::debug!("Using {} driver", settings.driver);
    let client = KittClient::new(
        engine::for_driver(settings.driver),
        console.clone(),
        Arc::new(InteractiveTerminal),
    );

    match command {
        Commands::Build { config, name } => client.build(&name, Some(&config)).await.map(|_| ()),
        Commands::Run {
            name,
            volumes,
            user,
            dind,
            pull,
            registry,
        } => {
            if pull && let Some(registry) = &registry {
                client.pull(registry, &name).await?;
            }
            let extras = RunExtras {
                run_as: user,
                volumes,
                dind,
            };
            client.run(&name, &extras).await.map(|_| ())
        }
        Commands::Pull { registry, name } => client.pull(&registry, &name).await,
        Commands::Push { registry, name } => client.push(&registry, &name).await,
        Commands::List => client.list().await.map(|_| ()),
        Commands::Remove { name } => client.remove(&name).await,
        Commands::Prune => client.prune().await,
        Commands::Refresh => client.refresh().await.map(|_| ()),
        Commands::Inspect { name } => client.inspect(&name).await.map(|_| ()),
        Commands::Patch { name, drop_vault } => client.patch(&name, drop_vault).await.map(|_| ()),
        Commands::Version | Commands::Config { .. } => Ok(()),
    }
}
