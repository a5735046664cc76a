use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use sgr_core::agent::{AgentLoop, RunResult, StructuredReasoner, ToolRegistry};
use sgr_core::benchmark::{BenchmarkSession, FileBenchmark, SessionOptions, SessionSummary};
use sgr_core::config::{self, AgentSettings, Config};
use sgr_core::{Task, providers, tools};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
mod onboard;

#[derive(Parser)]
#[command(name = "sgr")]
#[command(about = "sgr - schema-guided reasoning agent for benchmark tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive setup of ~/.sgr/config.toml
    Init,
    /// Run benchmark tasks from a file
    Run {
        /// JSON array or JSON Lines file of tasks
        #[arg(short, long)]
        tasks: PathBuf,
        /// Run only the task at this 1-based position
        #[arg(long)]
        only: Option<usize>,
        #[arg(long)]
        fail_fast: bool,
        #[arg(long)]
        results_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_steps: Option<u32>,
        #[arg(long)]
        concurrency: Option<usize>,
        /// Per-task time limit in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Also write a timestamped log file into this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("sgr=debug,sgr_core=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sgr=info,sgr_core=info"))
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    if let Some(path) = log_file {
        tracing::info!(path = %path.display(), "Logging to file");
    }
    Ok(())
}

fn build_agent(config: &Config) -> Result<AgentLoop> {
    let provider = providers::create_provider(config)?;

    // Reasoning tools get their own reasoner so their calls never see the
    // agent's step prompt.
    let tool_reasoner = Arc::new(
        StructuredReasoner::new(provider.clone())
            .with_max_format_retries(config.max_format_retries),
    );
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(tools::EchoTool))?;
    tools::register_reasoning_tools(&mut registry, tool_reasoner)?;
    let tool_count = registry.len();

    let agent = AgentLoop::new(provider.clone(), Arc::new(registry))
        .with_settings(&AgentSettings::from(config));

    tracing::info!(
        provider = provider.name(),
        model = %config.model,
        tools = tool_count,
        max_steps = agent.max_steps(),
        "Agent ready"
    );

    Ok(agent)
}

fn print_task_line(index: usize, task: &Task, result: &RunResult) {
    match result.failure() {
        None => println!(
            "  {} {} {} ({} steps)",
            style("✓").green(),
            style(format!("#{}", index)).yellow(),
            style(&task.id).cyan(),
            result.steps_taken()
        ),
        Some(failure) => println!(
            "  {} {} {} {}",
            style("✗").red(),
            style(format!("#{}", index)).yellow(),
            style(&task.id).cyan(),
            style(failure).dim()
        ),
    }
}

fn print_summary(summary: &SessionSummary) {
    println!();
    println!("{}", style("Benchmark summary").white().bold());
    println!("  {} passed", style(summary.passed).green().bold());
    println!("  {} failed", style(summary.failed).red().bold());
    println!("  {} total", style(summary.total()).white().bold());

    if !summary.failures.is_empty() {
        println!();
        println!("{}", style("Failed tasks").red().bold());
        for failure in &summary.failures {
            println!(
                "  {} {} {}",
                style(format!("#{}", failure.index)).yellow(),
                style(&failure.task_id).cyan(),
                failure.text
            );
            println!("      {}", style(&failure.reason).dim());
        }
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let init_config = onboard::run_init().map_err(|e| {
                eprintln!("{} Setup failed: {}", style("✗").red(), e);
                anyhow::anyhow!("Setup failed: {}", e)
            })?;
            config::save_config(&init_config)?;
            onboard::print_saved(&init_config);
        }
        Commands::Run {
            tasks,
            only,
            fail_fast,
            results_dir,
            config: config_path,
            max_steps,
            concurrency,
            timeout,
            log_dir,
            verbose,
        } => {
            let mut config = match &config_path {
                Some(path) => config::load_from(path)?,
                None => Config::load_or_init()?,
            };
            if let Some(dir) = results_dir {
                config.results_dir = dir;
            }
            if let Some(max_steps) = max_steps {
                config.max_steps = max_steps;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if let Some(secs) = timeout {
                config.task_timeout_secs = Some(secs);
            }
            if let Some(dir) = log_dir {
                config.log_dir = Some(dir);
            }
            config.validate()?;

            init_tracing(verbose, config.run_log_path().as_deref())?;

            let agent = Arc::new(build_agent(&config)?);
            let benchmark = Arc::new(FileBenchmark::new(tasks, config.results_dir.clone()));
            let session =
                BenchmarkSession::new(benchmark.clone(), agent).with_observer(print_task_line);

            let options = SessionOptions {
                only,
                fail_fast,
                concurrency: config.concurrency,
                task_timeout: config.task_timeout_secs.map(Duration::from_secs),
            };
            let summary = session.run(&options).await?;

            print_summary(&summary);
            println!(
                "  {} Results written to {}",
                style("→").green(),
                style(benchmark.results_dir().display()).cyan()
            );

            if !summary.all_passed() {
                anyhow::bail!("{} of {} tasks failed", summary.failed, summary.total());
            }
        }
    }

    Ok(())
}
