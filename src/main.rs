//! Binary entry point for the `gce-lifecycle` CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use clap::Parser;
use serde::Serialize;
use thiserror::Error;

use gce_lifecycle::{
    ApiVersion, ComputeClient, ComputeConfig, ComputeError, ConfigError, Credentials,
    CredentialsError, DirectorySnapshotWriter, InstanceOperations, InstanceRequest,
    LifecycleError, LifecycleOrchestrator, LifecycleRequest, Logging, Operation,
};

use cli::{Cli, DemoCommand, MutationArgs, ZoneArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("compute error: {0}")]
    Compute(#[from] ComputeError),
    #[error("lifecycle failed: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("failed to write output: {0}")]
    Output(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mutation {
    Delete,
    Stop,
    Start,
    Suspend,
    Resume,
}

impl Mutation {
    /// Suspend and resume go through the beta line.
    const fn api_version(self) -> ApiVersion {
        match self {
            Self::Suspend | Self::Resume => ApiVersion::Beta,
            Self::Delete | Self::Stop | Self::Start => ApiVersion::V1,
        }
    }
}

struct Session {
    config: ComputeConfig,
    credentials: Credentials,
}

impl Session {
    fn load() -> Result<Self, CliError> {
        let config = ComputeConfig::load_without_cli_args()?;
        config.validate()?;
        let credentials = config.credentials()?;
        Ok(Self {
            config,
            credentials,
        })
    }

    fn operations(
        &self,
        version: ApiVersion,
    ) -> Result<InstanceOperations<ComputeClient>, CliError> {
        let client = ComputeClient::new(version, self.credentials.clone())?;
        Ok(InstanceOperations::new(client, self.config.project.clone())
            .with_template(self.config.instance_template())
            .with_wait_policy(self.config.wait_policy()))
    }

    fn zone(&self, args: &ZoneArgs) -> String {
        zone_or_default(args, &self.config.zone)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = Logging::try_init() {
        writeln!(io::stderr(), "{err}").ok();
    }

    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let session = Session::load()?;
    let stable = session.operations(ApiVersion::V1)?;

    match cli {
        Cli::Zones => emit(&stable.list_zones().await?),
        Cli::List(args) => emit(&stable.list_instances(&session.zone(&args)).await?),
        Cli::Get(args) => {
            let zone = session.zone(&args.zone);
            emit(&stable.get_instance(&zone, &args.name).await?)
        }
        Cli::Create(command) => {
            let zone = session.zone(&command.target.instance.zone);
            let name = command.target.instance.name.as_str();
            let request = InstanceRequest::new(&zone, name).with_local_disk(command.local_ssd);
            let operation = stable.create_instance(&request).await?;
            finish(&stable, &stable, &zone, name, operation, command.target.no_wait).await
        }
        Cli::Delete(args) => mutate(&session, &stable, Mutation::Delete, &args).await,
        Cli::Stop(args) => mutate(&session, &stable, Mutation::Stop, &args).await,
        Cli::Start(args) => mutate(&session, &stable, Mutation::Start, &args).await,
        Cli::Suspend(args) => mutate(&session, &stable, Mutation::Suspend, &args).await,
        Cli::Resume(args) => mutate(&session, &stable, Mutation::Resume, &args).await,
        Cli::Demo(command) => demo(&session, stable, command).await,
    }
}

async fn mutate(
    session: &Session,
    stable: &InstanceOperations<ComputeClient>,
    mutation: Mutation,
    args: &MutationArgs,
) -> Result<(), CliError> {
    let zone = session.zone(&args.instance.zone);
    let name = args.instance.name.as_str();
    let submitter = match mutation.api_version() {
        ApiVersion::V1 => stable.clone(),
        ApiVersion::Beta => session.operations(ApiVersion::Beta)?,
    };

    let operation = match mutation {
        Mutation::Delete => submitter.delete_instance(&zone, name).await?,
        Mutation::Stop => submitter.stop_instance(&zone, name).await?,
        Mutation::Start => submitter.start_instance(&zone, name).await?,
        Mutation::Suspend => submitter.suspend_instance(&zone, name).await?,
        Mutation::Resume => submitter.resume_instance(&zone, name).await?,
    };

    if mutation == Mutation::Delete {
        if args.no_wait {
            return emit(&operation);
        }
        let done = submitter.wait(&zone, &operation).await?;
        return emit(&done);
    }
    finish(&submitter, stable, &zone, name, operation, args.no_wait).await
}

/// Prints the operation when not waiting, otherwise waits on the submitting
/// line and prints the resulting instance.
async fn finish(
    submitter: &InstanceOperations<ComputeClient>,
    stable: &InstanceOperations<ComputeClient>,
    zone: &str,
    name: &str,
    operation: Operation,
    no_wait: bool,
) -> Result<(), CliError> {
    if no_wait {
        return emit(&operation);
    }
    submitter.wait(zone, &operation).await?;
    emit(&stable.get_instance(zone, name).await?)
}

async fn demo(
    session: &Session,
    stable: InstanceOperations<ComputeClient>,
    command: DemoCommand,
) -> Result<(), CliError> {
    let mut request = LifecycleRequest::new(session.zone(&command.zone));
    if let Some(name) = command.local_name {
        request = request.with_local_ssd_name(name);
    }
    if let Some(name) = command.plain_name {
        request = request.with_plain_name(name);
    }
    let output_dir = command
        .output_dir
        .map_or_else(|| session.config.output_dir(), Into::into);

    let orchestrator = LifecycleOrchestrator::new(
        stable,
        session.operations(ApiVersion::Beta)?,
        DirectorySnapshotWriter::new(output_dir),
    );
    let outcome = orchestrator.execute(&request).await?;
    emit(&outcome)
}

fn zone_or_default(args: &ZoneArgs, default: &str) -> String {
    args.zone
        .as_deref()
        .map(str::trim)
        .filter(|zone| !zone.is_empty())
        .unwrap_or(default)
        .to_owned()
}

fn emit<T: Serialize>(value: &T) -> Result<(), CliError> {
    write_json(io::stdout(), value)
}

fn write_json<T: Serialize>(mut target: impl Write, value: &T) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap_or_else(|err| panic!("parse {args:?}: {err}"))
    }

    #[test]
    fn create_accepts_zone_local_ssd_and_no_wait() {
        let cli = parse(&[
            "gce-lifecycle",
            "create",
            "vm-1",
            "--zone",
            "europe-west1-b",
            "--local-ssd",
            "--no-wait",
        ]);

        let Cli::Create(command) = cli else {
            panic!("expected create");
        };
        assert_eq!(command.target.instance.name, "vm-1");
        assert_eq!(
            command.target.instance.zone.zone.as_deref(),
            Some("europe-west1-b")
        );
        assert!(command.local_ssd);
        assert!(command.target.no_wait);
    }

    #[rstest]
    #[case::delete("delete")]
    #[case::stop("stop")]
    #[case::start("start")]
    #[case::suspend("suspend")]
    #[case::resume("resume")]
    #[case::get("get")]
    fn instance_subcommands_require_a_name(#[case] subcommand: &str) {
        let result = Cli::try_parse_from(["gce-lifecycle", subcommand]);

        assert!(result.is_err(), "{subcommand} without a name should fail");
    }

    #[test]
    fn demo_overrides_are_optional() {
        let Cli::Demo(command) = parse(&["gce-lifecycle", "demo"]) else {
            panic!("expected demo");
        };
        assert!(command.output_dir.is_none());
        assert!(command.local_name.is_none());

        let Cli::Demo(overridden) = parse(&[
            "gce-lifecycle",
            "demo",
            "--output-dir",
            "out",
            "--local-name",
            "a",
            "--plain-name",
            "b",
        ]) else {
            panic!("expected demo");
        };
        assert_eq!(overridden.output_dir.as_deref(), Some("out"));
        assert_eq!(overridden.local_name.as_deref(), Some("a"));
        assert_eq!(overridden.plain_name.as_deref(), Some("b"));
    }

    #[test]
    fn no_arguments_is_an_error() {
        assert!(Cli::try_parse_from(["gce-lifecycle"]).is_err());
    }

    #[rstest]
    #[case::suspend(Mutation::Suspend, ApiVersion::Beta)]
    #[case::resume(Mutation::Resume, ApiVersion::Beta)]
    #[case::stop(Mutation::Stop, ApiVersion::V1)]
    #[case::start(Mutation::Start, ApiVersion::V1)]
    #[case::delete(Mutation::Delete, ApiVersion::V1)]
    fn mutations_pick_their_api_line(#[case] mutation: Mutation, #[case] expected: ApiVersion) {
        assert_eq!(mutation.api_version(), expected);
    }

    #[rstest]
    #[case::explicit(Some("asia-east1-a"), "asia-east1-a")]
    #[case::absent(None, "us-central1-a")]
    #[case::blank(Some("  "), "us-central1-a")]
    fn zone_falls_back_to_the_configured_default(
        #[case] zone: Option<&str>,
        #[case] expected: &str,
    ) {
        let args = ZoneArgs {
            zone: zone.map(str::to_owned),
        };

        assert_eq!(zone_or_default(&args, "us-central1-a"), expected);
    }

    #[test]
    fn json_output_is_pretty_printed() {
        let mut buf = Vec::new();

        write_json(&mut buf, &vec!["us-central1-a"])
            .unwrap_or_else(|err| panic!("write json: {err}"));

        let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert_eq!(rendered, "[\n  \"us-central1-a\"\n]\n");
    }

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        let error = CliError::Config(ConfigError::MissingField(String::from(
            "missing Compute Engine project: set GCE_PROJECT",
        )));

        write_error(&mut buf, &error);

        let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert!(rendered.contains("GCE_PROJECT"), "rendered: {rendered}");
    }
}
