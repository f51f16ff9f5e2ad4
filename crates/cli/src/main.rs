//! qaboard console entry point.

mod commands;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use qaboard_common::Config;
use qaboard_core::{Board, BoardOptions, OrderingPolicy};
use qaboard_sync::{
    Grid, MemorySource, Notifier, PollScheduler, Poller, RowSource, SheetsSource, TerminalBell,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{Command, Console, HELP};

#[derive(Parser)]
#[command(name = "qaboard")]
#[command(about = "Live audience question board backed by a Google Form response sheet")]
struct Cli {
    /// Path to a configuration file (defaults to config/default.toml and QABOARD_* variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Google Sheet id (overrides the configuration)
    #[arg(long, env = "QABOARD_SHEET_ID")]
    sheet_id: Option<String>,

    /// Initial sort: display | newest | oldest | default
    #[arg(long)]
    sort: Option<OrderingPolicy>,

    /// Serve a built-in sample sheet instead of calling the Sheets API
    #[arg(long)]
    demo: bool,
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, shutting down...");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}

fn demo_grid() -> Grid {
    [
        ["Timestamp", "Your question"],
        ["3/14/2025 10:00:00", "How does the borrow checker handle closures?"],
        ["3/14/2025 10:02:30", "When should I reach for Arc<Mutex<T>>?"],
        ["3/14/2025 10:05:10", "Is async Rust ready for embedded?"],
    ]
    .iter()
    .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
    .collect()
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let loaded = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    };

    let mut config = match (loaded, &cli.sheet_id) {
        (Ok(config), _) => config,
        // Without a config file the sheet id alone is enough.
        (Err(e), Some(id)) if cli.config.is_none() => {
            info!(error = %e, "No usable configuration, using defaults");
            Config::for_sheet(id.clone())
        }
        (Err(_), None) if cli.config.is_none() && cli.demo => Config::for_sheet("demo"),
        (Err(e), _) => return Err(e.into()),
    };

    if let Some(id) = &cli.sheet_id {
        config.sheet.id.clone_from(id);
    }
    if let Some(sort) = cli.sort {
        config.board.sort = sort.to_string();
    }
    if cli.demo && config.sheet.id.trim().is_empty() {
        config.sheet.id = "demo".to_string();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qaboard=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(sheet = %config.sheet.id, sort = %config.board.sort, "Starting qaboard");

    let source: Arc<dyn RowSource> = if cli.demo {
        Arc::new(MemorySource::new(demo_grid()))
    } else {
        Arc::new(SheetsSource::new(&config.sheet)?)
    };
    let notifier: Arc<dyn Notifier> = Arc::new(TerminalBell);
    let board = Arc::new(Mutex::new(Board::new(BoardOptions::from_config(&config)?)));
    let poller = Arc::new(Poller::new(source, board, notifier));

    // Print every status line as it changes.
    let mut status = poller.subscribe();
    let status_task = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let line = status.borrow_and_update().clone();
            println!("-- {line}");
        }
    });

    let mut scheduler = PollScheduler::new();
    match poller.connect().await {
        Ok(_) => scheduler.start(poller.clone(), config.polling.interval()),
        Err(e) => warn!(error = %e, "Not connected; fix the source and restart"),
    }

    let console = Console::new(poller.clone());
    println!("{}", console.execute(Command::List).await?);
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            () = &mut shutdown => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };

        let command = match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(Command::Help) => {
                println!("{HELP}");
                continue;
            }
            Ok(command) => command,
            Err(commands::CommandError::Empty) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match console.execute(command).await {
            Ok(out) => println!("{out}"),
            Err(e) => println!("{}", e.status_message()),
        }
    }

    scheduler.stop();
    status_task.abort();
    info!("Stopped");
    Ok(())
}
