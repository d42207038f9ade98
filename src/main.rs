use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use feedmark::config::{parse_interval, Config, DEFAULT_INTERVAL_SECS};
use feedmark::feed::HttpFetcher;
use feedmark::poller::{Coordinator, Scheduler, StdoutSink};
use feedmark::storage::{Database, DatabaseError, RegistryError, INTERVAL_KEY};
use feedmark::util::NameError;

/// Get the config directory path (~/.config/feedmark/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedmark"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedmark",
    version,
    about = "Poll RSS/Atom feeds and print each new entry exactly once"
)]
struct Args {
    /// Config file (default: ~/.config/feedmark/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll all feeds on the configured interval until interrupted (default)
    Run,
    /// Poll all feeds once and exit
    Poll,
    /// Add a feed with display name <NAME> and URL <URL>
    Add { name: String, url: Option<String> },
    /// Delete the feed named <NAME>
    Delete { name: String },
    /// Point the feed named <NAME> at <URL>
    Update { name: String, url: String },
    /// List all feeds
    List,
    /// Show the poll interval, or set it in seconds
    Interval { seconds: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is the entry stream; diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let db_path = config.database_path_in(&config_dir);
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::Locked) => {
            eprintln!("Error: {}", DatabaseError::Locked);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let interval_raw = db
        .init_setting(INTERVAL_KEY, &DEFAULT_INTERVAL_SECS.to_string())
        .await
        .context("Failed to read interval setting")?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let scheduler = build_scheduler(&config, db, &interval_raw)?;
            scheduler.run(shutdown_signal(), config.poll_on_start).await;
        }
        Command::Poll => {
            let scheduler = build_scheduler(&config, db, &interval_raw)?;
            let tick = scheduler.on_tick().await.context("Failed to list feeds")?;
            tick.join().await;
        }
        Command::Add { name, url } => {
            exit_on_user_error(db.add_feed(&name, url.as_deref()).await)?;
            println!("Added '{name}'.");

            // Show what the feed currently holds right away
            if let Some(feed) = db.get_feed(&name).await? {
                if feed.url.is_some() {
                    let scheduler = build_scheduler(&config, db, &interval_raw)?;
                    if let Some(handle) = scheduler.start_cycle(feed) {
                        handle.await.context("Initial poll failed")?;
                    }
                }
            }
        }
        Command::Delete { name } => {
            exit_on_user_error(db.delete_feed(&name).await)?;
            println!("Deleted '{name}'.");
        }
        Command::Update { name, url } => {
            exit_on_user_error(db.update_feed_url(&name, &url).await)?;
            println!("Updated '{name}'.");
        }
        Command::List => {
            for feed in db.list_feeds().await.context("Failed to list feeds")? {
                println!(
                    "\t{}: {}",
                    feed.name,
                    feed.url.as_deref().unwrap_or("(no URL set)")
                );
            }
        }
        Command::Interval { seconds: None } => {
            println!(
                "Poll interval: {} seconds",
                parse_interval(&interval_raw).as_secs()
            );
        }
        Command::Interval {
            seconds: Some(raw),
        } => {
            db.set_setting(INTERVAL_KEY, &raw)
                .await
                .context("Failed to store interval")?;
            let effective = parse_interval(&raw).as_secs();
            if effective.to_string() == raw.trim() {
                println!("Poll interval set to {effective} seconds.");
            } else {
                println!("Stored '{raw}', which is not a positive number of seconds; polling every {effective} seconds.");
            }
        }
    }

    Ok(())
}

fn build_scheduler(config: &Config, db: Database, interval_raw: &str) -> Result<Scheduler> {
    let fetcher = HttpFetcher::new(config).context("Failed to build HTTP client")?;
    let coordinator = Coordinator::new(db, Arc::new(fetcher), Arc::new(StdoutSink));
    Ok(Scheduler::new(Arc::new(coordinator), interval_raw))
}

/// Print operator mistakes (bad names, unknown or duplicate feeds) plainly
/// and exit non-zero; anything else propagates.
fn exit_on_user_error(result: Result<()>) -> Result<()> {
    if let Err(e) = &result {
        if e.downcast_ref::<NameError>().is_some() || e.downcast_ref::<RegistryError>().is_some() {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
    result
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
