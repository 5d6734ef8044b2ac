//! Command-line surface for the `syncrclone` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::run::BreakLockTarget;

/// Which side(s) `--break-lock` applies to.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakLockArg {
    A,
    B,
    Both,
}

impl From<BreakLockArg> for BreakLockTarget {
    fn from(arg: BreakLockArg) -> Self {
        match arg {
            BreakLockArg::A => BreakLockTarget::A,
            BreakLockArg::B => BreakLockTarget::B,
            BreakLockArg::Both => BreakLockTarget::Both,
        }
    }
}

/// Bi-directional file synchronization driven through the `rclone` agent.
#[derive(Parser, Debug)]
#[command(name = "syncrclone", about, disable_version_flag = true)]
pub struct Cli {
    /// Path to a job config TOML file. Required unless `--new` is passed.
    pub config: Option<PathBuf>,

    /// Compute and print the plan without executing it.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the plan and ask for confirmation before executing it.
    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// Raise the log level to debug and include file/line in output.
    #[arg(long)]
    pub debug: bool,

    /// Skip writing backups this run, regardless of the job config.
    #[arg(long)]
    pub no_backup: bool,

    /// Treat both sides' prior listings as empty, forcing a first-run union.
    #[arg(long)]
    pub reset_state: bool,

    /// Fail instead of treating a missing prior listing as a first run.
    #[arg(long)]
    pub require_prior_state: bool,

    /// Force-release an existing lock on the named side(s) before proceeding.
    #[arg(long, value_enum)]
    pub break_lock: Option<BreakLockArg>,

    /// Apply a `KEY=VALUE` override to the loaded config. Repeatable.
    #[arg(long = "override", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Write a commented starter config to `config` and exit.
    #[arg(long)]
    pub new: bool,

    /// Print the crate version and the detected rclone version, then exit.
    #[arg(long)]
    pub version: bool,
}
