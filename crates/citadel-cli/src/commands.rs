//! Command dispatch.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use serde_json::{Map, Value};
use thiserror::Error;

use citadel_core::config::{load_config, save_config};
use citadel_core::operations::parse_networks;
use citadel_core::{
    paths, ApiError, BatchOutcome, BatchTally, BuildRequest, CliConfig, Client, ConfigError,
    DeployRequest, FatalPolicy, GitCli, OperationStream, RemoveRequest, Revision, StreamEvent,
    Termination, UpgradeRequest,
};

use crate::render;
use crate::{Cli, Command, EnvAction};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// What every command needs besides its own arguments.
struct Context {
    client: Client,
    vcs: GitCli,
    remote: String,
}

impl Context {
    fn revision(&self, repo: Option<&str>, sha: Option<&str>) -> Result<Revision, ConfigError> {
        Revision::resolve(repo, sha, &self.vcs, &self.remote)
    }
}

pub fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let config =
        load_or_init_config(cli.config_path.clone(), |key| std::env::var(key).ok(), &mut out)?;

    let policy = match cli.fatal_pattern.as_deref() {
        Some(pattern) => FatalPolicy::with_pattern(pattern)?,
        None => FatalPolicy::default(),
    };
    let mut client = Client::new(config.client_config(cli.zone.clone())?).with_fatal_policy(policy);
    if let Some(dir) = cli.wire_log_dir.clone() {
        client = client.with_wire_log_dir(dir);
    }

    let ctx = Context {
        client,
        vcs: GitCli::current_dir(),
        remote: cli.remotename.clone(),
    };

    execute(&ctx, cli.command, &mut out)
}

/// Read the config file, creating it from the environment on first use.
fn load_or_init_config<F, W>(
    path: Option<PathBuf>,
    lookup: F,
    out: &mut W,
) -> Result<CliConfig, CliError>
where
    F: Fn(&str) -> Option<String>,
    W: Write,
{
    let path = match path {
        Some(path) => path,
        None => paths::default_config_path()?,
    };

    if let Some(config) = load_config(&path)? {
        log::debug!("loaded config from {}", path.display());
        return Ok(config);
    }

    let config = CliConfig::from_lookup(lookup);
    if config.auth_token.is_some() {
        save_config(&path, &config)?;
        out.write_all(render::info(&format!("config saved to {}", path.display())).as_bytes())?;
    }
    Ok(config)
}

fn execute<W: Write>(ctx: &Context, command: Command, out: &mut W) -> Result<ExitCode, CliError> {
    let client = &ctx.client;

    let value = match command {
        Command::Build {
            repo,
            sha,
            artifact,
            uid,
        } => {
            let revision = ctx.revision(repo.as_deref(), sha.as_deref())?;
            let request = BuildRequest::new(revision).artifact(artifact).uid(uid);
            let completed = print_stream(out, client.build(&request)?, render::narration)?;
            if completed {
                out.write_all(
                    render::info(&format!("Build {} {} done.", request.repo, request.sha)).as_bytes(),
                )?;
            }
            return Ok(exit_code(completed));
        }

        Command::Deploy {
            pod,
            entrypoint,
            node,
            repo,
            sha,
            cpu,
            memory,
            count,
            networks,
            envname,
            extra_env,
        } => {
            let revision = ctx.revision(repo.as_deref(), sha.as_deref())?;
            let request = DeployRequest::new(revision, pod, entrypoint)
                .node(node)
                .cpu_quota(cpu)
                .memory(memory)
                .count(count)
                .networks(parse_networks(&networks))
                .env_group_name(envname)
                .extra_env(extra_env);
            let completed = print_stream(out, client.deploy(&request)?, render::deploy)?;
            return Ok(exit_code(completed));
        }

        Command::Remove { ids } => {
            let request = RemoveRequest::new(ids)?;
            let tally = print_batch(out, client.remove(&request)?, render::remove)?;
            out.write_all(render::tally("remove", &tally).as_bytes())?;
            return Ok(ExitCode::SUCCESS);
        }

        Command::Upgrade { ids, repo, sha } => {
            let revision = ctx.revision(repo.as_deref(), sha.as_deref())?;
            let request = UpgradeRequest::new(ids, revision)?;
            let tally = print_batch(out, client.upgrade(&request)?, render::upgrade)?;
            out.write_all(render::tally("upgrade", &tally).as_bytes())?;
            return Ok(ExitCode::SUCCESS);
        }

        Command::Log { node, app } => {
            let completed = print_stream(out, client.log(&node, &app)?, render::log_line)?;
            return Ok(exit_code(completed));
        }

        Command::AppGet { app } => client.get_app(&app)?,
        Command::AppEnvs { app } => client.get_app_envs(&app)?,
        Command::AppEnv {
            action,
            app,
            env,
            vars,
        } => match action {
            EnvAction::Get => client.get_app_env(&app, &env)?,
            EnvAction::Set => client.set_app_env(&app, &env, &parse_env_vars(&vars)?)?,
            EnvAction::Delete | EnvAction::Remove => client.delete_app_env(&app, &env)?,
        },
        Command::AppReleases { app } => client.get_app_releases(&app)?,
        Command::AppContainers { app } => client.get_app_containers(&app)?,
        Command::ReleaseGet { app, sha } => client.get_release(&app, &sha)?,
        Command::ReleaseSpecs { app, sha } => {
            let release = client.get_release(&app, &sha)?;
            release.get("specs").cloned().unwrap_or(Value::Null)
        }
        Command::ReleaseContainers { app, sha } => client.get_release_containers(&app, &sha)?,
        Command::Register {
            app,
            sha,
            git,
            branch,
        } => client.register_release(&app, &sha, &git, branch.as_deref())?,
        Command::ContainerGet { id } => client.get_container(&id)?,
        Command::PodGet { pod: Some(pod) } => client.get_pod(&pod)?,
        Command::PodGet { pod: None } => client.get_pods()?,
        Command::PodNodes { pod } => client.get_pod_nodes(&pod)?,
        Command::PodNetworks { pod } => client.get_pod_networks(&pod)?,
        Command::PodGetMemcap { pod } => client.get_memcap(&pod)?,
        Command::PodSyncMemcap { pod } => client.sync_memcap(&pod)?,
    };

    out.write_all(render::json(&value).as_bytes())?;
    Ok(ExitCode::SUCCESS)
}

fn exit_code(completed: bool) -> ExitCode {
    if completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Print every event of a stream. Returns `false` if it ended on a fatal event.
fn print_stream<E, R, W, F>(
    out: &mut W,
    mut events: OperationStream<E, R>,
    mut render_event: F,
) -> Result<bool, CliError>
where
    E: StreamEvent,
    R: BufRead,
    W: Write,
    F: FnMut(&E) -> String,
{
    for item in events.by_ref() {
        let item = item?;
        out.write_all(render_event(&item.event).as_bytes())?;
        out.flush()?;
    }
    Ok(!matches!(events.termination(), Some(Termination::Fatal { .. })))
}

/// Print every result of a batch and count the outcomes.
fn print_batch<E, R, W>(
    out: &mut W,
    events: OperationStream<E, R>,
    render_result: fn(&E) -> String,
) -> Result<BatchTally, CliError>
where
    E: StreamEvent + BatchOutcome,
    R: BufRead,
    W: Write,
{
    let mut tally = BatchTally::default();
    print_stream(out, events, |result: &E| {
        tally.record(result);
        render_result(result)
    })?;
    Ok(tally)
}

/// Parse `KEY=VALUE` pairs. Only the first `=` separates key from value.
fn parse_env_vars(vars: &[String]) -> Result<Map<String, Value>, ConfigError> {
    vars.iter()
        .map(|var| match var.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                Ok((key.to_string(), Value::String(value.to_string())))
            }
            _ => Err(ConfigError::InvalidEnvVar(var.clone())),
        })
        .collect()
}
