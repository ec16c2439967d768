//! # Event Core Consumer
//!
//! Runs one subscriber over newline-delimited message bodies read from stdin, in batches, and
//! prints a JSON batch report per batch to stdout. Exits with status 70 after a fatal fault so
//! the supervisor restarts the instance.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use event_core::config::{
    ConfigManager, EventCoreConfig, ServiceMode, StorageBackendKind, SuspendFlagKind,
};
use event_core::dispatch::{BatchDispatcher, BatchItemFailure, BatchReport};
use event_core::idempotency::{NullLedger, StorageLedger};
use event_core::logging::init_structured_logging;
use event_core::services::{ContinuousService, QueueMessage, SubService, SuspendableService};
use event_core::state_machine::{LocalSuspendFlag, StoredSuspendFlag, SuspendFlag};
use event_core::storage::{InMemoryStorage, PostgresStorage, StorageBackend};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Exit status after a fatal fault (EX_SOFTWARE)
const FATAL_EXIT_CODE: i32 = 70;

#[derive(Parser)]
#[command(name = "event-core-consumer")]
#[command(about = "Consume queue messages from stdin with an event-core subscriber")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Environment (development, test, production, ...)
    #[arg(short, long, env = "EVENT_CORE_ENV")]
    environment: Option<String>,

    /// Configuration directory (default: ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Subscriber id, overrides configuration
    #[arg(short, long)]
    subscriber: Option<String>,

    /// Subscriber mode, overrides configuration
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Continuous,
    Suspendable,
}

impl From<ModeArg> for ServiceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Continuous => ServiceMode::Continuous,
            ModeArg::Suspendable => ServiceMode::Suspendable,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_structured_logging();

    match run(cli).await {
        Ok(report) if report.is_fatal() => {
            error!("Fatal fault, exiting for restart");
            process::exit(FATAL_EXIT_CODE);
        }
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, "Consumer failed");
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

/// Returns the report of the last batch
async fn run(cli: Cli) -> Result<BatchReport> {
    let config = resolve_config(&cli)?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(BatchReport::default());
    }

    let storage = build_storage(&config).await?;
    let service = build_service(&config, storage);

    let mut dispatcher = BatchDispatcher::new(service, config.dispatch.max_concurrency);
    if let Some(timeout) = config.dispatch.message_timeout() {
        dispatcher = dispatcher.with_message_timeout(timeout);
    }

    info!(
        subscriber_id = %config.subscriber.id,
        mode = ?config.subscriber.mode,
        batch_size = config.dispatch.batch_size,
        "Consuming from stdin"
    );

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut line = Vec::new();
    let mut pending = PendingBatch::default();
    let mut last_report = BatchReport::default();

    loop {
        line.clear();
        let (exhausted, read_error) = match stdin.read_until(b'\n', &mut line).await {
            Ok(0) => (true, None),
            Ok(_) => (false, None),
            Err(e) => (true, Some(e)),
        };

        if !exhausted {
            pending.push_line(&line);
        }

        if pending.len() >= config.dispatch.batch_size || (exhausted && !pending.is_empty()) {
            let report = pending.dispatch(&dispatcher).await;

            let mut rendered = serde_json::to_vec(&report)?;
            rendered.push(b'\n');
            stdout.write_all(&rendered).await?;
            stdout.flush().await?;

            let fatal = report.is_fatal();
            last_report = report;
            if fatal {
                break;
            }
        }

        if let Some(e) = read_error {
            return Err(e).context("reading stdin");
        }
        if exhausted {
            break;
        }
    }

    Ok(last_report)
}

/// Lines read since the last dispatch
#[derive(Default)]
struct PendingBatch {
    messages: Vec<QueueMessage>,
    /// Lines that are not UTF-8, reported as decode failures without being dispatched
    undecodable: Vec<BatchItemFailure>,
}

impl PendingBatch {
    fn push_line(&mut self, line: &[u8]) {
        let message_id = Uuid::new_v4().to_string();

        match std::str::from_utf8(line) {
            Ok(body) => {
                let body = body.trim();
                if !body.is_empty() {
                    self.messages.push(QueueMessage::new(message_id, body));
                }
            }
            Err(e) => {
                warn!(message_id = %message_id, error = %e, "Message body is not UTF-8");
                self.undecodable.push(BatchItemFailure {
                    message_id,
                    kind: "decode".to_string(),
                    error: format!("Decode error: {e}"),
                });
            }
        }
    }

    fn len(&self) -> usize {
        self.messages.len() + self.undecodable.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn dispatch<H>(&mut self, dispatcher: &BatchDispatcher<H>) -> BatchReport
    where
        H: SubService + ?Sized + 'static,
    {
        let mut report = dispatcher.dispatch(std::mem::take(&mut self.messages)).await;
        report.failures.append(&mut self.undecodable);
        report
    }
}

fn resolve_config(cli: &Cli) -> Result<EventCoreConfig> {
    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(ConfigManager::detect_environment);

    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &environment)
        .context("loading configuration")?;

    let mut config = manager.config().clone();
    if let Some(subscriber) = &cli.subscriber {
        config.subscriber.id = subscriber.clone();
    }
    if let Some(mode) = cli.mode {
        config.subscriber.mode = mode.into();
    }
    config.validate().context("validating configuration")?;

    Ok(config)
}

async fn build_storage(config: &EventCoreConfig) -> Result<Arc<dyn StorageBackend>> {
    let storage: Arc<dyn StorageBackend> = match config.storage.backend {
        StorageBackendKind::Memory => {
            Arc::new(InMemoryStorage::new(config.storage.table_name.clone()))
        }
        StorageBackendKind::Postgres => {
            let url = config
                .storage
                .database_url
                .as_deref()
                .context("storage.database_url is required for the postgres backend")?;

            let storage = PostgresStorage::connect(
                url,
                &config.storage.table_name,
                config.storage.max_connections,
            )
            .await?;
            storage.ensure_table().await?;
            Arc::new(storage)
        }
    };

    if !storage.is_available().await {
        warn!(table_name = %storage.table_name(), "Storage table is not available");
    }

    Ok(storage)
}

fn build_service(
    config: &EventCoreConfig,
    storage: Arc<dyn StorageBackend>,
) -> Arc<dyn SubService> {
    let subscriber = &config.subscriber;
    let options = subscriber.service_options();

    match subscriber.mode {
        ServiceMode::Continuous if subscriber.deduplication => {
            let ledger = Arc::new(StorageLedger::new(storage.clone()));
            Arc::new(ContinuousService::new(&subscriber.id, storage, ledger, options))
        }
        ServiceMode::Continuous => Arc::new(ContinuousService::new(
            &subscriber.id,
            storage,
            Arc::new(NullLedger),
            options,
        )),
        ServiceMode::Suspendable => {
            let flag: Arc<dyn SuspendFlag> = match subscriber.suspend_flag {
                SuspendFlagKind::Local => {
                    Arc::new(LocalSuspendFlag::new(subscriber.initially_suspended))
                }
                SuspendFlagKind::Storage => Arc::new(StoredSuspendFlag::new(
                    storage.clone(),
                    &subscriber.id,
                    subscriber.initially_suspended,
                )),
            };
            Arc::new(SuspendableService::new(&subscriber.id, storage, flag, options))
        }
    }
}
