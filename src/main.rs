use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use opslot::{retry, OperationConfig, Preset, ProgressController, RetryOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Drive an operation slot against a simulated task and print its state
#[derive(Parser)]
#[command(name = "opslot")]
#[command(about = "Asynchronous operation orchestrator playground", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML operation configuration
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a preset against a simulated task, printing every published state
    Simulate {
        /// Task shape: upload or export
        #[arg(long, default_value = "upload")]
        preset: Preset,

        /// Total simulated work, spread evenly over the steps
        #[arg(long, default_value = "800ms", value_parser = humantime::parse_duration)]
        work: Duration,

        /// Number of attempts that fail before the task succeeds
        #[arg(long, default_value = "0")]
        fail_attempts: u32,

        /// Retries allowed after the first attempt
        #[arg(long, default_value = "0")]
        retries: u32,

        /// Wait before the first retry
        #[arg(long, default_value = "200ms", value_parser = humantime::parse_duration)]
        retry_delay: Duration,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .with_writer(std::io::stderr)
        .init();

    debug!("opslot started with verbosity level: {}", cli.verbose);

    let result = match cli.command {
        Commands::Simulate {
            preset,
            work,
            fail_attempts,
            retries,
            retry_delay,
        } => {
            let options = RetryOptions {
                max_retries: retries,
                delay: retry_delay,
                ..RetryOptions::default()
            };
            run_simulation(cli.config, preset, work, fail_attempts, options).await
        }
        Commands::Config => print_config(cli.config),
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<OperationConfig> {
    match path {
        Some(path) => OperationConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(OperationConfig::default()),
    }
}

fn print_config(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

async fn run_simulation(
    config_path: Option<PathBuf>,
    preset: Preset,
    work: Duration,
    fail_attempts: u32,
    options: RetryOptions,
) -> Result<()> {
    let config = load_config(config_path)?;
    let grace = config.overlay_grace_period;
    let op = preset.build::<String>(config, Default::default())?;

    let mut states = op.subscribe();
    let printer = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            match serde_json::to_string(&state) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("Could not render state: {}", e),
            }
        }
    });

    info!("Simulating {} ({:?} of work)", preset, work);
    let attempts = Arc::new(AtomicU32::new(0));
    let outcome = op
        .execute_with_steps(|progress| {
            let attempts = attempts.clone();
            async move {
                retry(
                    || simulated_task(progress.clone(), preset, work, &attempts, fail_attempts),
                    &options,
                )
                .await
            }
        })
        .await;

    match &outcome {
        Ok(artifact) => info!("Finished: {}", artifact),
        Err(e) => warn!("Failed after {} attempts: {}", attempts.load(Ordering::SeqCst), e),
    }

    // Let the overlay timer fire so its transition gets printed too.
    opslot::sleep(grace + Duration::from_millis(10)).await;
    drop(op);
    printer.await?;

    outcome.map(|_| ())
}

async fn simulated_task(
    progress: ProgressController<String>,
    preset: Preset,
    work: Duration,
    attempts: &AtomicU32,
    fail_attempts: u32,
) -> Result<String> {
    let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
    let steps = preset.steps();
    let per_step = work / steps.len().max(1) as u32;

    for (index, step) in steps.iter().enumerate() {
        progress.set_current_step(&step.id, Some(&step.label))?;
        opslot::sleep(per_step).await;
        trace!("Attempt {} finished step {}", attempt, step.id);

        if attempt <= fail_attempts && index + 1 == steps.len() / 2 {
            return Err(anyhow!("simulated failure during {} (attempt {})", step.id, attempt));
        }
        progress.complete_step(&step.id, None)?;
    }

    Ok(format!("{}-artifact-{}", preset, attempt))
}
