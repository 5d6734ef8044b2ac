use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use syncrclone::agent::Agent;
use syncrclone::cli::Cli;
use syncrclone::config::{SyncConfig, TEMPLATE};
use syncrclone::error::SyncError;
use syncrclone::reconcile::{Plan, SidePlan};
use syncrclone::run::{self, RunOptions, RunOutcome};
use syncrclone::side::Side;
use syncrclone::telemetry;

fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init(cli.debug);

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> Result<(), SyncError> {
    if cli.version {
        print_version();
        return Ok(());
    }

    let path = cli
        .config
        .clone()
        .ok_or_else(|| SyncError::NotADirectoryError { path: PathBuf::from(".") })?;

    if cli.new {
        std::fs::write(&path, TEMPLATE)?;
        println!("wrote template config to {}", path.display());
        return Ok(());
    }

    let mut config = SyncConfig::load(&path)?;
    if cli.no_backup {
        config.backup = false;
    }
    if cli.reset_state {
        config.reset_state = true;
    }
    if cli.require_prior_state {
        config.require_prior_state = true;
    }
    for kv in &cli.overrides {
        config.apply_override(kv)?;
    }

    let agent = Agent::new("rclone", &config.min_rclone_version)?;
    let options = RunOptions {
        dry_run: cli.dry_run,
        interactive: cli.interactive,
        break_lock: cli.break_lock.map(Into::into),
    };
    let run_id = run_id_now();

    let outcome = run::run(&agent, &config, &run_id, &options, confirm_plan)?;
    report(&outcome);
    Ok(())
}

fn print_version() {
    println!("syncrclone {}", env!("CARGO_PKG_VERSION"));
    match Agent::new("rclone", "0.0.0") {
        Ok(agent) => println!("rclone: {}", agent.raw_version_output().trim()),
        Err(e) => println!("rclone: unavailable ({e})"),
    }
}

fn run_id_now() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    format!("syncrclone-{secs}")
}

/// Renders the plan and reads a `y`/`n` answer from stdin.
fn confirm_plan(plan: &Plan) -> bool {
    print_plan(plan);
    print!("proceed? [y/N] ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn print_plan(plan: &Plan) {
    print_side_plan(Side::A, &plan.a);
    print_side_plan(Side::B, &plan.b);
    if !plan.unresolved_conflicts.is_empty() {
        println!("unresolved conflicts ({}):", plan.unresolved_conflicts.len());
        for path in &plan.unresolved_conflicts {
            println!("  ! {path}");
        }
    }
}

fn print_side_plan(side: Side, side_plan: &SidePlan) {
    if side_plan.is_empty() {
        return;
    }
    println!("side {side}:");
    for path in &side_plan.transfer_in {
        println!("  + {path}");
    }
    for path in &side_plan.delete {
        println!("  - {path}");
    }
    for (src, dst) in &side_plan.moves {
        println!("  > {src} -> {dst}");
    }
}

fn report(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Dispatched(plan) if plan.is_empty() => println!("nothing to do"),
        RunOutcome::Dispatched(plan) => {
            print_plan(plan);
            println!("done");
        }
        RunOutcome::DryRun(plan) => {
            print_plan(plan);
            println!("dry run: nothing executed");
        }
        RunOutcome::Declined(_) => println!("declined: nothing executed"),
    }
}
