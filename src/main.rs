mod orchestrator;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};

use featherflow_cron::interval_to_cron;
use featherflow_scheduler::{SchedulerConfig, SchedulerDaemon};
use featherflow_store::{ScheduleEntry, ScheduleStore};

use crate::orchestrator::FlowOrchestrator;

/// Featherflow - a lightweight flow orchestrator
#[derive(Parser)]
#[command(name = "featherflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Directory holding flow definition files
  #[arg(long, global = true, default_value = "flows")]
  flows_dir: PathBuf,

  /// Directory holding task scripts
  #[arg(long, global = true, default_value = "tasks")]
  tasks_dir: PathBuf,

  /// Directory execution scripts are written to
  #[arg(long, global = true, default_value = "featherflow_output")]
  output_dir: PathBuf,

  /// Path to the schedule file (default: ~/.featherflow/schedules.json)
  #[arg(long, global = true)]
  schedule_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// List the flows available in the flows directory
  List,

  /// Plan a flow, write its execution script, and run it
  Run {
    /// Name of the flow definition to run
    flow_name: String,

    /// Write the execution script without running it
    #[arg(long)]
    dry_run: bool,
  },

  /// Manage flow schedules
  Schedule {
    #[command(subcommand)]
    action: ScheduleAction,
  },

  /// Control the scheduler daemon
  Scheduler {
    #[command(subcommand)]
    action: SchedulerAction,
  },
}

#[derive(Subcommand)]
enum ScheduleAction {
  /// Add or replace a flow's schedule
  Add {
    flow_name: String,

    /// Five-field cron expression or preset such as @daily
    #[arg(long, conflicts_with = "interval")]
    cron: Option<String>,

    /// Named interval: hourly, daily, weekly or monthly
    #[arg(long)]
    interval: Option<String>,

    /// Time of day (HH:MM) for daily and longer intervals
    #[arg(long, requires = "interval")]
    at: Option<String>,

    /// Human-readable note stored with the schedule
    #[arg(long)]
    description: Option<String>,

    /// Register the schedule without enabling it
    #[arg(long)]
    disabled: bool,
  },

  /// Remove a flow's schedule
  Remove { flow_name: String },

  /// List all schedules
  List,
}

#[derive(Subcommand)]
enum SchedulerAction {
  /// Run the scheduler in the foreground until interrupted
  Start {
    /// Seconds between schedule polls
    #[arg(long, default_value_t = 60)]
    check_interval: u64,
  },

  /// Show the registered schedules and which are due right now
  Status,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let cli = Cli::parse();

  let schedule_file = cli.schedule_file.clone().unwrap_or_else(|| {
    dirs::home_dir()
      .expect("could not determine home directory")
      .join(".featherflow")
      .join("schedules.json")
  });

  match cli.command {
    Some(Commands::List) => list_flows(&cli),
    Some(Commands::Run {
      ref flow_name,
      dry_run,
    }) => run_flow(&cli, flow_name, dry_run),
    Some(Commands::Schedule { ref action }) => schedule(action, schedule_file),
    Some(Commands::Scheduler { ref action }) => scheduler(&cli, action, schedule_file),
    None => {
      println!("featherflow - use --help to see available commands");
      Ok(())
    }
  }
}

fn list_flows(cli: &Cli) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    let orchestrator = FlowOrchestrator::new(&cli.flows_dir, &cli.tasks_dir, &cli.output_dir);
    let flows = orchestrator.list_flows().await?;
    if flows.is_empty() {
      println!("No flows found in {}", cli.flows_dir.display());
    } else {
      for name in flows {
        println!("{name}");
      }
    }
    Ok(())
  })
}

fn run_flow(cli: &Cli, flow_name: &str, dry_run: bool) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    let orchestrator = FlowOrchestrator::new(&cli.flows_dir, &cli.tasks_dir, &cli.output_dir);
    let script_path = orchestrator.execute(flow_name, dry_run).await?;
    if dry_run {
      println!("Execution script written: {}", script_path.display());
    } else {
      println!("Flow completed: {flow_name}");
    }
    Ok(())
  })
}

fn schedule(action: &ScheduleAction, schedule_file: PathBuf) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    let store = ScheduleStore::load(schedule_file).await?;

    match action {
      ScheduleAction::Add {
        flow_name,
        cron,
        interval,
        at,
        description,
        disabled,
      } => {
        let expression = if let Some(expr) = cron {
          expr.clone()
        } else if let Some(interval) = interval {
          interval_to_cron(interval, at.as_deref())
            .with_context(|| format!("unsupported interval '{interval}'"))?
        } else {
          bail!("provide either --cron or --interval");
        };

        let entry = store
          .add(flow_name, &expression, !disabled, description.clone())
          .await?;
        println!(
          "Scheduled '{}' with expression '{}'",
          entry.flow_name, entry.cron_expression
        );
        if let Some(next) = entry.next_run {
          println!("Next run: {}", next.format("%Y-%m-%d %H:%M UTC"));
        }
      }

      ScheduleAction::Remove { flow_name } => {
        if store.remove(flow_name).await? {
          println!("Removed schedule for '{flow_name}'");
        } else {
          println!("No schedule found for '{flow_name}'");
        }
      }

      ScheduleAction::List => {
        let entries = store.list().await;
        if entries.is_empty() {
          println!("No schedules registered");
        } else {
          for entry in &entries {
            print_entry(entry);
          }
        }
      }
    }
    Ok(())
  })
}

fn scheduler(cli: &Cli, action: &SchedulerAction, schedule_file: PathBuf) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match action {
      SchedulerAction::Start { check_interval } => {
        let store = Arc::new(ScheduleStore::load(schedule_file).await?);
        let orchestrator = Arc::new(FlowOrchestrator::new(
          &cli.flows_dir,
          &cli.tasks_dir,
          &cli.output_dir,
        ));
        let config = SchedulerConfig {
          check_interval: Duration::from_secs(*check_interval),
          ..SchedulerConfig::default()
        };

        let daemon = SchedulerDaemon::new(store, orchestrator, config);
        daemon.start()?;
        println!("Scheduler running, press Ctrl-C to stop");

        tokio::signal::ctrl_c()
          .await
          .context("failed to listen for shutdown signal")?;
        daemon.stop().await?;
        println!("Scheduler stopped");
      }

      SchedulerAction::Status => {
        let store = ScheduleStore::load(schedule_file).await?;
        let entries = store.list().await;
        if entries.is_empty() {
          println!("No schedules registered");
          return Ok(());
        }

        let now = Utc::now();
        let due = entries.iter().filter(|e| e.should_run(now)).count();
        println!("{} schedule(s), {} due now", entries.len(), due);
        for entry in &entries {
          print_entry(entry);
        }
      }
    }
    Ok(())
  })
}

fn print_entry(entry: &ScheduleEntry) {
  let state = if entry.running {
    "running"
  } else if entry.enabled {
    "enabled"
  } else {
    "disabled"
  };
  let next = entry
    .next_run
    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
    .unwrap_or_else(|| "-".to_string());
  println!(
    "{:<24} {:<18} {:<9} next: {next}",
    entry.flow_name, entry.cron_expression, state
  );
  if let Some(description) = &entry.description {
    println!("  {description}");
  }
}
