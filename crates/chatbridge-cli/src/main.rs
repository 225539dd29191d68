//! chatbridge CLI: boots the HTTP/WebSocket server and its periodic tickers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use chatbridge_core::repositories::OrganizationsRepository;
use chatbridge_core::Database;
use chatbridge_web::app::AppState;
use chatbridge_web::tickers::{self, TickerConfig};

/// Initialize logging with the specified verbosity level, mirroring the
/// `-v`/`-vv`/`-vvv` escalation used across the rest of the workspace.
fn init_logging(verbose: u8, json: bool) -> Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(format!("chatbridge={level}").parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_file(verbose >= 3)
        .with_line_number(verbose >= 3);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "chatbridge")]
#[command(about = "Bridges Slack/Discord threads to connected coding agents")]
#[command(version)]
struct Cli {
    /// SQLite database path.
    #[arg(long, env = "DATABASE_PATH", default_value = "chatbridge.db")]
    database_path: String,

    /// Address the HTTP/WebSocket server binds to.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: String,

    /// Shared-secret API key required on every request, if set.
    #[arg(long, env = "API_KEY")]
    api_key: Option<String>,

    /// How long a job may sit without a new message before it is reaped.
    #[arg(long, env = "IDLE_TIMEOUT_MINUTES", default_value_t = 60)]
    idle_timeout_minutes: i64,

    /// How often the queue drainer ticks, in seconds.
    #[arg(long, env = "DRAIN_INTERVAL_SECS", default_value_t = 5)]
    drain_interval_secs: u64,

    /// How often the idle reaper ticks, in seconds.
    #[arg(long, env = "REAP_INTERVAL_SECS", default_value_t = 300)]
    reap_interval_secs: u64,

    /// Maximum queued jobs drained per integration per tick.
    #[arg(long, env = "DRAIN_BATCH_LIMIT", default_value_t = 50)]
    drain_batch_limit: i64,

    /// Increase verbosity (-v: info, -vv: debug, -vvv: trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json)?;

    let db = Database::new(&cli.database_path).await?;
    let state = Arc::new(AppState::new(db.clone(), cli.api_key.clone()));

    let ticker_config = Arc::new(TickerConfig {
        drain_interval: Duration::from_secs(cli.drain_interval_secs),
        reap_interval: Duration::from_secs(cli.reap_interval_secs),
        idle_timeout_minutes: cli.idle_timeout_minutes,
        drain_batch_limit: cli.drain_batch_limit,
    });

    let orgs_repo = OrganizationsRepository::new(db.clone());
    let mut ticker_handles = Vec::new();
    for org_id in orgs_repo.list_with_integrations().await? {
        ticker_handles.extend(tickers::spawn(state.clone(), org_id, ticker_config.clone()));
    }

    let router = chatbridge_web::create_router(state);
    let listener = tokio::net::TcpListener::bind(&cli.bind_addr).await?;
    info!(addr = %cli.bind_addr, "chatbridge listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in ticker_handles {
        handle.abort();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["chatbridge"]).unwrap();
        assert_eq!(cli.database_path, "chatbridge.db");
        assert_eq!(cli.bind_addr, "0.0.0.0:8080");
        assert!(cli.api_key.is_none());
        assert_eq!(cli.idle_timeout_minutes, 60);
        assert_eq!(cli.drain_interval_secs, 5);
        assert_eq!(cli.reap_interval_secs, 300);
        assert_eq!(cli.drain_batch_limit, 50);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.log_json);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "chatbridge",
            "--database-path",
            "/tmp/cb.db",
            "--bind-addr",
            "127.0.0.1:9090",
            "--api-key",
            "secret",
            "-vv",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(cli.database_path, "/tmp/cb.db");
        assert_eq!(cli.bind_addr, "127.0.0.1:9090");
        assert_eq!(cli.api_key.as_deref(), Some("secret"));
        assert_eq!(cli.verbose, 2);
        assert!(cli.log_json);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining connections");
}
