use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use tableside_api_client::ApiClient;
use tableside_daemon::config::{self, DaemonConfig};
use tableside_daemon::tracker::{self, TrackerExit};
use tableside_daemon::{health, input};

#[derive(Parser)]
#[command(
    name = "tableside-daemon",
    about = "Keeps a table session alive while customers interact with it"
)]
struct Cli {
    /// Override the server URL from daemon.toml
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track activity for a session; interactions are read from stdin
    Track {
        /// Open (or resume) the session of this table
        #[arg(long, required_unless_present = "session", conflicts_with = "session")]
        table: Option<String>,

        /// Track an existing session
        #[arg(long)]
        session: Option<String>,
    },

    /// Release a table, cancelling its active session
    Release {
        #[arg(long)]
        table: String,
    },

    /// Ask the server to expire idle sessions now
    Cleanup {
        /// Idle timeout for this run (defaults to the server's)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tableside_daemon=info,warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Daemon fatal error: {:#}", e);
            1
        }
    };
    // The stdin reader thread may still be blocked on a read; exit without
    // waiting for it.
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = config::load_config()?;
    if let Some(url) = cli.server {
        cfg.server.url = url;
    }

    match cli.command {
        Commands::Track { table, session } => run_track(&cfg, table, session).await,
        Commands::Release { table } => {
            let api = client(&cfg)?;
            let released = api
                .release_table(&table)
                .await
                .with_context(|| format!("Failed to release table {table}"))?;
            println!("{}", serde_json::to_string_pretty(&released)?);
            Ok(())
        }
        Commands::Cleanup { timeout_secs } => {
            let api = client(&cfg)?;
            let report = api
                .cleanup_expired_sessions(timeout_secs)
                .await
                .context("Cleanup request failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Config => {
            println!("# {}", config::config_path()?.display());
            print!("{}", toml::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

fn client(cfg: &DaemonConfig) -> Result<ApiClient> {
    ApiClient::new(&cfg.server.url, cfg.server.timeout()).context("Failed to build HTTP client")
}

async fn run_track(
    cfg: &DaemonConfig,
    table: Option<String>,
    session: Option<String>,
) -> Result<()> {
    let timings = cfg.tracker.timings();
    timings.validate().context("Invalid [tracker] settings")?;
    let api = client(cfg)?;

    let session_id = match (table, session) {
        (_, Some(session_id)) => session_id,
        (Some(table_id), None) => {
            let started = api
                .start_session(&table_id)
                .await
                .with_context(|| format!("Failed to start a session on table {table_id}"))?;
            if started.resumed {
                info!("Resumed session {} on table {table_id}", started.session.id);
            } else {
                info!("Opened session {} on table {table_id}", started.session.id);
            }
            started.session.id
        }
        (None, None) => anyhow::bail!("either --table or --session is required"),
    };

    let (tx, rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut intake = tokio::spawn(input::read_interactions(
        BufReader::new(tokio::io::stdin()),
        tx,
    ));
    let health_handle = tokio::spawn(health::run_health_check(
        api.clone(),
        cfg.daemon.health_check_interval_secs,
        shutdown_rx.clone(),
    ));
    let tracker_api = api.clone();
    let tracked_id = session_id.clone();
    let mut tracker_handle = tokio::spawn(async move {
        tracker::run_tracker(&tracker_api, &tracked_id, timings, rx, shutdown_rx).await
    });

    let finished = tokio::select! {
        exit = &mut tracker_handle => Some(exit.context("tracker task panicked")?),
        _ = wait_for_shutdown() => None,
        _ = &mut intake => {
            info!("Interaction input closed");
            None
        }
    };

    let _ = shutdown_tx.send(true);
    let exit = match finished {
        Some(exit) => exit,
        None => tracker_handle.await.context("tracker task panicked")?,
    };
    let _ = health_handle.await;
    intake.abort();

    if let TrackerExit::Shutdown { beacon } = exit {
        let grace = Duration::from_millis(cfg.daemon.beacon_grace_ms);
        if tokio::time::timeout(grace, beacon).await.is_err() {
            warn!("Final beacon for session {session_id} still in flight at exit");
        }
    }

    info!("Stopped tracking session {session_id}");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to register signal handlers: {e}");
                    return std::future::pending().await;
                }
            };
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to register Ctrl+C handler: {e}");
            return std::future::pending().await;
        }
        info!("Received Ctrl+C");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn track_needs_exactly_one_target() {
        assert!(Cli::try_parse_from(["tableside-daemon", "track"]).is_err());
        assert!(
            Cli::try_parse_from(["tableside-daemon", "track", "--table", "t1", "--session", "s1"])
                .is_err()
        );
        let cli = Cli::try_parse_from(["tableside-daemon", "track", "--table", "t1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Track { table: Some(ref t), session: None } if t == "t1"
        ));
    }

    #[test]
    fn server_override_is_global() {
        let cli =
            Cli::try_parse_from(["tableside-daemon", "cleanup", "--server", "http://pos:3000"])
                .unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://pos:3000"));
    }
}
