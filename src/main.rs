use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tokio::sync::mpsc;
use tracing::{info, warn};

use procwatch::action::{Action, ActionRequest};
use procwatch::config::{Config, load_config, read_config};
use procwatch::event::EventHandler;
use procwatch::format::{render_csv, render_table};
use procwatch::logging;
use procwatch::protocol::{Outbound, encode};
use procwatch::system::collector::Monitor;
use procwatch::system::control::{ActionDispatcher, SystemControl};
use procwatch::system::metrics::{MetricsAggregator, MetricsStrategy};
use procwatch::system::platform::icon_resolver;
use procwatch::system::poll::PollLoop;
use procwatch::system::process::select_top;
use procwatch::system::runner::{CommandRunner, SystemRunner};
use procwatch::system::sampler::Sampler;
use procwatch::system::tracked::TrackedSet;

// Columns taken by everything in the table except the command.
const TABLE_FIXED_WIDTH: usize = 84;
const MIN_COMMAND_WIDTH: usize = 20;

#[derive(Parser)]
#[command(
    name = "procwatch",
    about = "Process and host metrics monitor streaming JSON snapshots"
)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Refresh rate in milliseconds
    #[arg(long, global = true)]
    refresh_rate: Option<u64>,

    /// Number of processes in the top list
    #[arg(long, global = true)]
    top: Option<usize>,

    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines (always on stderr)
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll continuously, streaming snapshots to stdout and reading requests from stdin
    Watch,
    /// Run a single cycle and print the snapshot
    Snapshot,
    /// Print the ranked process table
    Ptable {
        /// Export to a CSV file instead of printing
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Include every process, not just the top list
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    /// Run one control action against a process
    Action { action: ActionArg, pid: u32 },
    /// Show the detected OS and metrics strategy
    Os,
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    Terminate,
    Suspend,
    Resume,
    SetPriority,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Terminate => Action::Terminate,
            ActionArg::Suspend => Action::Suspend,
            ActionArg::Resume => Action::Resume,
            ActionArg::SetPriority => Action::SetPriority,
        }
    }
}

struct Engine {
    monitor: Arc<Monitor>,
    dispatcher: ActionDispatcher,
    period: Duration,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli)?;

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(build_engine(&config)).await?,
        Command::Snapshot => snapshot(build_engine(&config)).await?,
        Command::Ptable { csv, all } => ptable(build_engine(&config), csv.as_deref(), all).await?,
        Command::Action { action, pid } => {
            let request = ActionRequest {
                action: action.into(),
                pid,
            };
            return run_action(build_engine(&config), request).await;
        }
        Command::Os => print_os(&config),
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config_for_cli(cli: &Cli) -> Result<Config> {
    let (mut config, problem) = match &cli.config {
        Some(path) => (read_config(path)?, None),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if let Some(top) = cli.top {
        config.general.top_n = top;
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.log_json {
        config.logging.json = true;
    }

    logging::init(&config.logging.level, config.logging.json)?;
    if let Some(err) = problem {
        warn!(error = %err, "using default configuration");
    }

    if config.general.refresh_rate_ms == 0 {
        return Err(eyre!("--refresh-rate must be greater than 0"));
    }
    if config.general.cycle_timeout_ms == 0 {
        return Err(eyre!("cycle_timeout_ms must be greater than 0"));
    }
    Ok(config)
}

fn build_engine(config: &Config) -> Engine {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let strategy = config.metrics.resolve();

    let mut sampler = Sampler::new(Arc::clone(&runner), Sampler::detect_total_memory());
    if config.general.resolve_icons
        && let Some(resolver) = icon_resolver()
    {
        sampler = sampler.with_icons(resolver);
    }

    let monitor = Monitor::new(
        sampler,
        MetricsAggregator::new(Arc::clone(&runner), strategy),
        Arc::new(TrackedSet::new()),
        config.general.top_n,
        Duration::from_millis(config.general.cycle_timeout_ms),
    );
    let control = SystemControl::new(runner, config.actions.escalation_program.clone());

    info!(
        os = std::env::consts::OS,
        strategy = %describe_strategy(strategy),
        top_n = config.general.top_n,
        "engine ready"
    );
    Engine {
        monitor: Arc::new(monitor),
        dispatcher: ActionDispatcher::new(Arc::new(control), config.actions.escalation),
        period: Duration::from_millis(config.general.refresh_rate_ms),
    }
}

async fn watch(engine: Engine) -> Result<()> {
    let (snapshot_tx, mut snapshots) = mpsc::channel(8);
    let (response_tx, mut responses) = mpsc::channel(32);
    let requests = EventHandler::stdin().into_receiver();

    let poll = PollLoop::new(
        engine.monitor,
        engine.dispatcher,
        engine.period,
        snapshot_tx,
        response_tx,
    );
    let poll_task = tokio::spawn(poll.run(requests));

    loop {
        tokio::select! {
            Some(snapshot) = snapshots.recv() => write_line(&Outbound::Snapshot(&snapshot))?,
            Some(response) = responses.recv() => write_line(&Outbound::ActionResult(&response))?,
            else => break,
        }
    }

    poll_task.await.wrap_err("poll loop panicked")?;
    Ok(())
}

fn write_line(message: &Outbound<'_>) -> Result<()> {
    let line = encode(message)?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{line}").wrap_err("failed to write to stdout")?;
    out.flush()?;
    Ok(())
}

async fn snapshot(engine: Engine) -> Result<()> {
    let snapshot = engine
        .monitor
        .cycle()
        .await
        .ok_or_else(|| eyre!("a cycle is already in flight"))?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn ptable(engine: Engine, csv: Option<&Path>, all: bool) -> Result<()> {
    if let Some(path) = csv {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(eyre!("export path must end in .csv: {}", path.display()));
        }
    }

    let processes = engine.monitor.sampler().sample().await;
    let limit = if all {
        processes.len()
    } else {
        engine.monitor.top_n()
    };
    let ranked = select_top(processes, limit);

    match csv {
        Some(path) => {
            std::fs::write(path, render_csv(&ranked))
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            println!("Exported {} processes to {}", ranked.len(), path.display());
        }
        None => print!("{}", render_table(&ranked, command_width())),
    }
    Ok(())
}

fn command_width() -> usize {
    let columns = std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(160);
    columns
        .saturating_sub(TABLE_FIXED_WIDTH)
        .max(MIN_COMMAND_WIDTH)
}

async fn run_action(engine: Engine, request: ActionRequest) -> Result<ExitCode> {
    let response = engine.dispatcher.dispatch(request).await;
    println!("{}", serde_json::to_string(&response)?);
    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_os(config: &Config) {
    println!("os: {}", std::env::consts::OS);
    println!("arch: {}", std::env::consts::ARCH);
    println!(
        "metrics strategy: {}",
        describe_strategy(config.metrics.resolve())
    );
}

fn describe_strategy(strategy: MetricsStrategy) -> String {
    match strategy {
        MetricsStrategy::PageBased { page_size } => {
            format!("page-based (vm_stat + top, page size {page_size})")
        }
        MetricsStrategy::TableBased => "table-based (free + top)".to_string(),
    }
}
