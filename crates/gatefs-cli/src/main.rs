//! gatefs binary: denylist queries from the command line.
//!
//! ```bash
//! # Check CIDs and paths against the discovered denylists
//! RUST_LOG=info gatefs check /ipfs/QmdWFA9FL52hx3j9EJZPQP1ZUH8Ygi5tLCX2cRDs6knSf8/a
//!
//! # Check against explicit lists, machine-readable output
//! gatefs check --denylist my.deny --json QmdWFA9FL52hx3j9EJZPQP1ZUH8Ygi5tLCX2cRDs6knSf8
//!
//! # List the denylist files discovery would load
//! gatefs files
//!
//! # Follow lists until Ctrl-C, pulling one of them from a remote URL
//! gatefs watch --denylist local.deny --url https://example.org/list.deny
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatefs_core::{denylist_files, Blocker, ContentPath, HttpSubscriber, Status};
use gatefs_types::config::{BlockerConfig, SubscriberConfig};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "gatefs",
    version = env!("CARGO_PKG_VERSION"),
    about = "Content-blocking denylists for content-addressed file systems"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check CIDs or `/proto/key[/sub]` paths against denylists.
    Check {
        /// CIDs or content paths to check.
        queries: Vec<String>,

        /// Denylist files to load; defaults to the discovered ones.
        #[arg(long = "denylist")]
        denylists: Vec<PathBuf>,

        /// Keep the lists open after answering and log appended rules
        /// until Ctrl-C.
        #[arg(long)]
        follow: bool,

        /// Print one JSON object per query instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the denylist files discovery would load.
    Files,

    /// Follow denylists until Ctrl-C, logging appended rules. `--url`
    /// values are paired with `--denylist` files in order and appended to
    /// them with periodic range requests.
    Watch {
        /// Denylist files to follow; defaults to the discovered ones.
        #[arg(long = "denylist")]
        denylists: Vec<PathBuf>,

        /// Remote denylist URLs appended to the local files, in order.
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Seconds between range requests.
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Check { queries, denylists, follow, json } => {
            run_check(queries, denylists, follow, json).await
        }
        Command::Files => run_files(),
        Command::Watch { denylists, urls, interval } => {
            run_watch(denylists, urls, interval).await
        }
    }
}

/// Open the named lists, or the discovered ones when none are named.
async fn load_blocker(denylists: Vec<PathBuf>, follow: bool) -> Result<Blocker> {
    let blocker = if denylists.is_empty() {
        let config = BlockerConfig { follow, ..Default::default() };
        Blocker::from_config(&config).await.context("loading denylists")?
    } else {
        Blocker::open(&denylists, follow).await.context("loading denylists")?
    };
    if blocker.denylists.is_empty() {
        anyhow::bail!("no denylist files found; pass --denylist or populate the denylist dirs");
    }
    Ok(blocker)
}

/// Log rules appended to the followed lists until Ctrl-C.
async fn watch_loop(blocker: &Blocker) -> Result<()> {
    let mut seen: Vec<usize> = blocker.denylists.iter().map(|dl| dl.entries().len()).collect();
    info!(lists = blocker.denylists.len(), "following denylists — press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(2)) => {
                for (dl, count) in blocker.denylists.iter().zip(seen.iter_mut()) {
                    let entries = dl.entries();
                    for entry in &entries[*count..] {
                        info!(
                            file = %dl.filename,
                            line = entry.line,
                            rule = %entry.raw,
                            "rule appended"
                        );
                    }
                    *count = entries.len();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C — shutting down");
                return Ok(());
            }
        }
    }
}

// ── Check mode ────────────────────────────────────────────────────────────────

async fn run_check(
    queries: Vec<String>,
    denylists: Vec<PathBuf>,
    follow: bool,
    json: bool,
) -> Result<()> {
    let mut blocker = load_blocker(denylists, follow).await?;

    let mut any_blocked = false;
    for query in &queries {
        let resp = if query.starts_with('/') {
            blocker.is_path_blocked(&ContentPath::from(query.as_str()))
        } else {
            let c: cid::Cid = query.parse().with_context(|| format!("invalid CID: {query}"))?;
            blocker.is_cid_blocked(&c)
        };

        if matches!(resp.status, Status::Blocked | Status::Errored) {
            any_blocked = true;
        }

        if json {
            let rule = resp.entry.as_ref().map(|e| e.raw.clone());
            let line = resp.entry.as_ref().map(|e| e.line);
            println!(
                "{}",
                serde_json::json!({
                    "query": query,
                    "status": resp.status.to_string(),
                    "filename": resp.filename,
                    "rule": rule,
                    "line": line,
                    "error": resp.error.as_ref().map(|e| e.to_string()),
                })
            );
        } else {
            match &resp.entry {
                Some(entry) => {
                    println!("{query}: {} ({}:{})", resp.status, resp.filename, entry.line)
                }
                None => println!("{query}: {}", resp.status),
            }
        }
    }

    if follow {
        watch_loop(&blocker).await?;
    }

    blocker.close()?;
    if any_blocked {
        std::process::exit(1);
    }
    Ok(())
}

// ── Files mode ────────────────────────────────────────────────────────────────

fn run_files() -> Result<()> {
    let files = denylist_files(&BlockerConfig::default())?;
    for file in files {
        println!("{}", file.display());
    }
    Ok(())
}

// ── Watch mode ────────────────────────────────────────────────────────────────

async fn run_watch(denylists: Vec<PathBuf>, urls: Vec<String>, interval: u64) -> Result<()> {
    let files = if denylists.is_empty() {
        denylist_files(&BlockerConfig::default())?
    } else {
        denylists
    };
    if files.is_empty() {
        anyhow::bail!("no denylist files found; pass --denylist or populate the denylist dirs");
    }
    if urls.len() > files.len() {
        anyhow::bail!("more --url values than --denylist files to append to");
    }

    let mut subscribers = Vec::with_capacity(urls.len());
    for (url, file) in urls.into_iter().zip(files.iter()) {
        // Subscribed files may not exist yet; the tailer needs one to open.
        if !file.exists() {
            std::fs::write(file, b"")?;
        }
        let mut config = SubscriberConfig::new(url, file.clone());
        config.interval = Duration::from_secs(interval);
        let mut subscriber = HttpSubscriber::new(config);
        subscriber.start();
        subscribers.push(subscriber);
    }

    let mut blocker = Blocker::open(&files, true).await.context("loading denylists")?;
    watch_loop(&blocker).await?;

    for subscriber in &mut subscribers {
        subscriber.stop();
    }
    blocker.close()?;
    Ok(())
}
