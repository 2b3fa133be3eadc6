//! CI indexer CLI
//!
//! Processes captured CI change events against the configured index store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indexer::{
    config::load_config,
    error::{AppError, Result},
    models::{Config, InboundMessage},
    pipeline::{self, DispatchContext, Dispatcher},
    services::{AttributeValue, DefaultTransformer, LoggingProcessor},
    storage::open_store,
    utils::date::normalize_timestamp,
};
use tokio_util::sync::CancellationToken;

const DEFAULT_CONFIG: &str = "indexer.toml";

/// Keeps the CI search index in sync with CI change events
#[derive(Parser, Debug)]
#[command(name = "indexer", version, about = "CI change-event indexer")]
struct Cli {
    /// Path to the configuration file (default: indexer.toml, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a single event payload
    Process {
        /// Event type tag (e.g. cm_ci_new)
        #[arg(long = "type")]
        msg_type: String,

        /// Message id used in logs
        #[arg(long, default_value = "cli")]
        id: String,

        /// Simplify generic CIs using desired instead of designed values
        #[arg(long)]
        desired: bool,

        /// File containing the JSON payload
        file: PathBuf,
    },

    /// Replay a JSON-lines file of captured messages
    Replay {
        /// One `{"msgId", "type", "payload"}` envelope per line
        file: PathBuf,

        /// Override consumer.max_concurrent
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Print the canonical form of a malformed timestamp
    NormalizeDate {
        value: String,
    },

    /// Validate configuration
    Validate,
}

/// Initialize logging from the verbosity flag and configured level.
fn init_logging(verbose: bool, config: &Config) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel `token` on Ctrl-C so pending correlation waits end early.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling pending work");
            token.cancel();
        }
    });
}

fn build_dispatcher(config: &Config, value: AttributeValue) -> Result<Dispatcher> {
    let store = open_store(&config.store, &config.index)?;
    let context = DispatchContext {
        store,
        transformer: Arc::new(DefaultTransformer::new(value)),
        plan_processor: Arc::new(LoggingProcessor::new("deployment-plan")),
        policy_processor: Arc::new(LoggingProcessor::new("policy")),
    };
    Ok(Dispatcher::new(context, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = load_config(&config_path, cli.config.is_some())?;
    init_logging(cli.verbose, &config);

    if config_path.exists() {
        log::debug!("Loaded configuration from {}", config_path.display());
    } else {
        log::info!(
            "No configuration at {}, using defaults",
            config_path.display()
        );
    }

    match cli.command {
        Command::Process {
            msg_type,
            id,
            desired,
            file,
        } => {
            let payload = tokio::fs::read_to_string(&file).await?;
            let value = if desired {
                AttributeValue::Desired
            } else {
                AttributeValue::Designed
            };
            let dispatcher = build_dispatcher(&config, value)?;

            let token = CancellationToken::new();
            cancel_on_ctrl_c(token.clone());

            let message = InboundMessage::new(id, msg_type, payload);
            let outcome = dispatcher.process_message(&message, &token).await?;
            log::info!(
                "Indexed ci {} ({}): side effect {:?}, work order {:?}, {} write attempt(s)",
                outcome.ci_id,
                outcome.class_name,
                outcome.side_effect,
                outcome.work_order,
                outcome.write_attempts
            );
        }

        Command::Replay { file, concurrency } => {
            let (messages, invalid) = pipeline::load_messages(&file).await?;
            log::info!(
                "Loaded {} messages from {} ({} unreadable lines)",
                messages.len(),
                file.display(),
                invalid
            );

            let dispatcher = build_dispatcher(&config, AttributeValue::Designed)?;
            let token = CancellationToken::new();
            cancel_on_ctrl_c(token.clone());

            let max_concurrent = concurrency.unwrap_or(config.consumer.max_concurrent);
            let mut outcome =
                pipeline::run_replay(&dispatcher, messages, max_concurrent, &token).await;
            outcome.invalid = invalid;

            log::info!(
                "Replay complete: {} written, {} failed, {} unreadable",
                outcome.written,
                outcome.failed,
                outcome.invalid
            );
            log::info!(
                "Work orders: {} fresh, {} previous, {} missing",
                outcome.fresh,
                outcome.previous,
                outcome.missing
            );

            if outcome.failed > 0 {
                return Err(AppError::validation(format!(
                    "{} of {} messages failed",
                    outcome.failed, outcome.total
                )));
            }
        }

        Command::NormalizeDate { value } => match normalize_timestamp(&value) {
            Some(canonical) => println!("{canonical}"),
            None => println!("{value}"),
        },

        Command::Validate => {
            log::info!("Validating configuration...");
            // load_config already validated; report what will be used
            log::info!(
                "✓ Config OK: backend {:?}, ci index {}, {} attempts every {}ms",
                config.store.backend,
                config.index.ci_index,
                config.correlation.max_attempts,
                config.correlation.retry_delay_ms
            );
            open_store(&config.store, &config.index)?;
            log::info!("✓ Store backend OK");
        }
    }

    Ok(())
}
