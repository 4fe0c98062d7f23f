use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{debug, info};
use waitroom_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use waitroom_core::{build_engine, open_store, AdmissionEngine, AdmissionScheduler, Config, OrderedQueueStore, StoreBackend};

#[derive(Parser, Debug)]
#[command(name = "waitroom")]
#[command(author, version, about = "Inspect and drive Waitroom queues", long_about = None)]
struct Args {
    /// TOML configuration file; environment variables are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database to operate on (selects the sqlite backend)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Enable JSON formatted logging
    #[arg(long, global = true)]
    json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a user to the back of a queue
    Register {
        user_id: i64,
        #[arg(short, long, default_value = waitroom_core::DEFAULT_QUEUE)]
        queue: String,
    },
    /// Promote up to COUNT waiting users
    Admit {
        count: usize,
        #[arg(short, long, default_value = waitroom_core::DEFAULT_QUEUE)]
        queue: String,
    },
    /// Show a user's wait position (-1 when not waiting)
    Rank {
        user_id: i64,
        #[arg(short, long, default_value = waitroom_core::DEFAULT_QUEUE)]
        queue: String,
    },
    /// Show whether a user has been admitted
    Status {
        user_id: i64,
        #[arg(short, long, default_value = waitroom_core::DEFAULT_QUEUE)]
        queue: String,
        /// Check the user's token as well
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Print a user's access token
    Token {
        user_id: i64,
        #[arg(short, long, default_value = waitroom_core::DEFAULT_QUEUE)]
        queue: String,
    },
    /// List queues that have waiting users
    Queues,
    /// Run one admission pass over every waiting queue
    Cycle {
        /// Users promoted per queue; defaults to the scheduler batch size
        #[arg(short, long)]
        batch_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level: LogLevel = args.log_level.parse()?;
    init_logging_with_config(LogConfig::new(log_level).json_format(args.json_logs).to_stderr(true))?;

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.store.backend = StoreBackend::Sqlite;
        config.store.path = Some(db);
    }
    config.validate()?;

    if config.store.backend == StoreBackend::Memory {
        info!("Using the in-memory store; nothing will outlive this command");
    }

    let store = open_store(&config.store).context("Failed to open queue store")?;
    let engine = build_engine(&config, store)?;

    let output = execute(args.command, engine, &config).await?;
    println!("{}", output);

    Ok(())
}

async fn execute<S>(command: Command, engine: AdmissionEngine<S>, config: &Config) -> Result<Value>
where
    S: OrderedQueueStore + ?Sized,
{
    debug!(?command, "Executing command");

    let output = match command {
        Command::Register { user_id, queue } => {
            let rank = engine.register(&queue, user_id).await?;
            json!({ "queue": queue, "user_id": user_id, "rank": rank })
        }
        Command::Admit { count, queue } => {
            let admitted = engine.admit(&queue, count).await?;
            json!({ "queue": queue, "requested": count, "admitted": admitted })
        }
        Command::Rank { user_id, queue } => {
            let rank = engine.wait_rank(&queue, user_id).await?;
            json!({ "queue": queue, "user_id": user_id, "rank": rank, "waiting": rank.is_waiting() })
        }
        Command::Status { user_id, queue, token } => {
            let admitted = match token {
                Some(token) => engine.is_admitted_with_token(&queue, user_id, &token).await?,
                None => engine.is_admitted(&queue, user_id).await?,
            };
            json!({ "queue": queue, "user_id": user_id, "admitted": admitted })
        }
        Command::Token { user_id, queue } => {
            let token = engine.issue_token(&queue, user_id);
            let cookie = engine.token_issuer().cookie_name(&queue);
            json!({ "queue": queue, "user_id": user_id, "token": token, "cookie": cookie })
        }
        Command::Queues => {
            let names: Vec<String> =
                engine.queue_names(config.scheduler.scan_page_size).try_collect().await?;
            json!({ "queues": names })
        }
        Command::Cycle { batch_size } => {
            let batch_size = batch_size.unwrap_or(config.scheduler.batch_size);
            let scheduler = AdmissionScheduler::new(engine, config.scheduler.clone());
            let report = scheduler.sweep(batch_size).await?;
            json!({
                "batch_size": batch_size,
                "queues_scanned": report.queues_scanned,
                "queues_failed": report.queues_failed,
                "admitted": report.admitted,
            })
        }
    };

    Ok(output)
}
