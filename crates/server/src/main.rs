mod error;
mod lifecycle;
mod routes;
mod storage;
mod sweeper;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tableside_api::deploy::{self, DEFAULT_CLEANUP_INTERVAL_SECS};
use tableside_core::session::DEFAULT_IDLE_TIMEOUT_SECS;
use storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
}

/// Server configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub base_url: String,
    /// Empty disables the provisioning routes.
    pub admin_key: String,
    /// Empty rejects every payment webhook.
    pub webhook_secret: String,
    pub session_timeout_secs: u64,
    /// Zero disables the background sweeper.
    pub cleanup_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            admin_key: String::new(),
            webhook_secret: String::new(),
            session_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl AppConfig {
    fn from_env() -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|s| !s.trim().is_empty());
        let defaults = Self::default();

        let session_timeout_secs = match deploy::parse_secs(
            env(deploy::ENV_SESSION_TIMEOUT_SECS).as_deref(),
            defaults.session_timeout_secs,
        ) {
            0 => {
                tracing::warn!(
                    "{} must be positive; using {}s",
                    deploy::ENV_SESSION_TIMEOUT_SECS,
                    defaults.session_timeout_secs
                );
                defaults.session_timeout_secs
            }
            secs => secs,
        };

        let cleanup_enabled =
            deploy::parse_bool_flag(env(deploy::ENV_CLEANUP_ENABLED).as_deref(), true);
        let cleanup_interval_secs = if cleanup_enabled {
            deploy::parse_secs(
                env(deploy::ENV_CLEANUP_INTERVAL_SECS).as_deref(),
                defaults.cleanup_interval_secs,
            )
        } else {
            0
        };

        let admin_key = env(deploy::ENV_ADMIN_KEY).unwrap_or_default();
        if admin_key.is_empty() {
            tracing::warn!("{} not set: provisioning routes are disabled", deploy::ENV_ADMIN_KEY);
        }
        let webhook_secret = env(deploy::ENV_WEBHOOK_SECRET).unwrap_or_default();
        if webhook_secret.is_empty() {
            tracing::warn!(
                "{} not set: payment webhooks will be rejected",
                deploy::ENV_WEBHOOK_SECRET
            );
        }

        Self {
            base_url: env("BASE_URL").unwrap_or(defaults.base_url),
            admin_key,
            webhook_secret,
            session_timeout_secs,
            cleanup_interval_secs,
        }
    }
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

fn api_router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Provisioning
        .route("/restaurants", post(routes::restaurants::create_restaurant))
        .route(
            "/restaurants/{id}/subscription",
            get(routes::restaurants::get_subscription),
        )
        .route(
            "/restaurants/{id}/tables",
            post(routes::restaurants::create_table).get(routes::restaurants::list_tables),
        )
        // Table sessions
        .route("/tables/{id}/sessions", post(routes::sessions::start_session))
        .route("/tables/{id}/release", post(routes::sessions::release_table))
        .route("/sessions/{id}", get(routes::sessions::get_session))
        .route(
            "/sessions/{id}/activity",
            post(routes::sessions::record_activity),
        )
        .route(
            "/sessions/{id}/release",
            post(routes::sessions::release_session),
        )
        // RPC
        .route(
            "/rpc/cleanup_expired_sessions",
            post(routes::rpc::cleanup_expired_sessions),
        )
        // Payment gateway
        .route("/webhooks/payment", post(routes::webhooks::payment_webhook))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tableside_server=info,tower_http=info".into()),
        )
        .init();

    // Data directory
    let data_dir = std::env::var("TABLESIDE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));

    tracing::info!("data directory: {}", data_dir.display());

    // Initialize database
    let db = storage::init_db(&data_dir)?;
    tracing::info!("database initialized");

    let config = AppConfig::from_env();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = if config.cleanup_interval_secs > 0 {
        Some(tokio::spawn(sweeper::run_sweeper(
            db.clone(),
            config.session_timeout_secs,
            Duration::from_secs(config.cleanup_interval_secs),
            shutdown_rx,
            tableside_api::now_unix,
        )))
    } else {
        tracing::info!("background session cleanup disabled");
        None
    };

    let base_url = config.base_url.clone();
    let state = AppState { db, config };

    let app = Router::new()
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    tracing::info!("starting server at {base_url}");

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }

    Ok(())
}
