//! corecli - command-line client for citadel.

mod commands;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use citadel_core::operations::DEFAULT_MEMORY;

#[derive(Parser, Debug)]
#[command(name = "corecli", version, about = "Command-line client for citadel")]
pub struct Cli {
    /// Zone to operate in; overrides the zone in the config file
    #[arg(long, global = true)]
    pub zone: Option<String>,

    /// Config file location
    #[arg(long, global = true, env = "CITADEL_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Git remote whose URL is used as the repository
    #[arg(long, global = true, env = "CORECLI_REPO_NAME", default_value = "origin")]
    pub remotename: String,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Record a raw transcript of every streamed operation in this directory
    #[arg(long, global = true)]
    pub wire_log_dir: Option<PathBuf>,

    /// Regex deciding which build/deploy errors end the stream
    #[arg(long, global = true)]
    pub fatal_pattern: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build an image for a commit
    Build {
        repo: Option<String>,
        sha: Option<String>,
        #[arg(long, default_value = "")]
        artifact: String,
        #[arg(long, default_value = "")]
        uid: String,
    },

    /// Start containers for a release
    Deploy {
        pod: String,
        entrypoint: String,
        #[arg(long, default_value = "")]
        node: String,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        sha: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        cpu: f64,
        #[arg(long, default_value_t = DEFAULT_MEMORY)]
        memory: u64,
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// NAME[:IP], repeatable
        #[arg(long)]
        networks: Vec<String>,
        #[arg(long, default_value = "")]
        envname: String,
        /// KEY=VALUE, repeatable
        #[arg(long = "extraenv")]
        extra_env: Vec<String>,
    },

    /// Remove containers
    Remove { ids: Vec<String> },

    /// Replace containers with ones running another commit
    Upgrade {
        ids: Vec<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        sha: Option<String>,
    },

    /// Follow an app's container output on a node
    Log { node: String, app: String },

    #[command(name = "app:get")]
    AppGet { app: String },

    #[command(name = "app:envs")]
    AppEnvs { app: String },

    /// Read, replace or delete an env group. `set` takes KEY=VALUE pairs.
    #[command(name = "app:env")]
    AppEnv {
        action: EnvAction,
        app: String,
        env: String,
        vars: Vec<String>,
    },

    #[command(name = "app:release")]
    AppReleases { app: String },

    #[command(name = "app:container")]
    AppContainers { app: String },

    #[command(name = "release:get")]
    ReleaseGet { app: String, sha: String },

    #[command(name = "release:specs")]
    ReleaseSpecs { app: String, sha: String },

    #[command(name = "release:container")]
    ReleaseContainers { app: String, sha: String },

    /// Register a release of an app
    Register {
        app: String,
        sha: String,
        git: String,
        #[arg(long)]
        branch: Option<String>,
    },

    #[command(name = "container:get")]
    ContainerGet { id: String },

    /// Show one pod, or list all pods
    #[command(name = "pod:get")]
    PodGet { pod: Option<String> },

    #[command(name = "pod:nodes")]
    PodNodes { pod: String },

    #[command(name = "pod:networks")]
    PodNetworks { pod: String },

    #[command(name = "pod:getmemcap")]
    PodGetMemcap { pod: String },

    #[command(name = "pod:syncmemcap")]
    PodSyncMemcap { pod: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvAction {
    Get,
    Set,
    Delete,
    Remove,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match commands::run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprint!("{}", render::error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}
