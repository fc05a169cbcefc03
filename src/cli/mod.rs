//! Command-line interface definitions for the `gce-lifecycle` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Top-level CLI for the `gce-lifecycle` binary.
#[derive(Debug, Parser)]
#[command(
    name = "gce-lifecycle",
    about = "Create, inspect, suspend, resume, stop, start and delete Compute Engine VMs",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// List the zones visible to the project.
    #[command(name = "zones")]
    Zones,
    /// List the instances of a zone.
    #[command(name = "list")]
    List(ZoneArgs),
    /// Show one instance.
    #[command(name = "get")]
    Get(InstanceArgs),
    /// Create an instance.
    #[command(name = "create")]
    Create(CreateCommand),
    /// Delete an instance.
    #[command(name = "delete")]
    Delete(MutationArgs),
    /// Stop a running instance.
    #[command(name = "stop")]
    Stop(MutationArgs),
    /// Start a stopped instance.
    #[command(name = "start")]
    Start(MutationArgs),
    /// Suspend a running instance, discarding local SSD data.
    #[command(name = "suspend")]
    Suspend(MutationArgs),
    /// Resume a suspended instance.
    #[command(name = "resume")]
    Resume(MutationArgs),
    /// Run the full create, cycle, list and delete scenario.
    #[command(name = "demo")]
    Demo(DemoCommand),
}

/// Zone selection shared by every subcommand.
#[derive(Debug, Args)]
pub(crate) struct ZoneArgs {
    /// Zone to act in. Defaults to the configured zone.
    #[arg(long, value_name = "ZONE")]
    pub(crate) zone: Option<String>,
}

/// Arguments naming one instance.
#[derive(Debug, Args)]
pub(crate) struct InstanceArgs {
    /// Instance name.
    #[arg(value_name = "NAME")]
    pub(crate) name: String,
    #[command(flatten)]
    pub(crate) zone: ZoneArgs,
}

/// Arguments of state-changing subcommands.
#[derive(Debug, Args)]
pub(crate) struct MutationArgs {
    #[command(flatten)]
    pub(crate) instance: InstanceArgs,
    /// Print the submitted operation instead of waiting for it.
    #[arg(long)]
    pub(crate) no_wait: bool,
}

/// Arguments for `gce-lifecycle create`.
#[derive(Debug, Args)]
pub(crate) struct CreateCommand {
    #[command(flatten)]
    pub(crate) target: MutationArgs,
    /// Attach a 375 GB scratch NVMe disk.
    #[arg(long)]
    pub(crate) local_ssd: bool,
}

/// Arguments for `gce-lifecycle demo`.
#[derive(Debug, Args)]
pub(crate) struct DemoCommand {
    #[command(flatten)]
    pub(crate) zone: ZoneArgs,
    /// Directory receiving the JSON snapshots. Defaults to the configured one.
    #[arg(long, value_name = "DIR")]
    pub(crate) output_dir: Option<String>,
    /// Name of the instance created with a local SSD.
    #[arg(long, value_name = "NAME")]
    pub(crate) local_name: Option<String>,
    /// Name of the instance created without a local SSD.
    #[arg(long, value_name = "NAME")]
    pub(crate) plain_name: Option<String>,
}
