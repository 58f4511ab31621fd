use chrono::Duration;
use funnel_analytics::api::AppState;
use funnel_analytics::clock::{Clock, SystemClock};
use funnel_analytics::config::{AuthMode, Config};
use funnel_analytics::query::cache::QueryCache;
use funnel_analytics::query::service::FunnelQueryService;
use funnel_analytics::server;
use funnel_analytics::storage::migrations::run_migrations;
use funnel_analytics::storage::parquet::ParquetSource;
use funnel_analytics::warehouse::auth::{
    AuthMethod, Authenticator, Identity, InteractiveAuthenticator, StoredCredentialAuthenticator,
};
use funnel_analytics::warehouse::embedded::DuckDbWarehouse;
use funnel_analytics::warehouse::session::WarehouseSession;
use funnel_analytics::warehouse::Warehouse;
use std::io::{BufRead, Write};
use std::sync::Arc;

/// Block on stdin until the operator confirms the warehouse login.
fn prompt_on_terminal(identity: &Identity) -> bool {
    let mut stdout = std::io::stdout();
    let _ = write!(
        stdout,
        "Complete the warehouse login for {} on account {}, then press Enter (type 'n' to cancel): ",
        identity.user, identity.account
    );
    let _ = stdout.flush();

    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => false,
        Ok(_) => !line.trim().eq_ignore_ascii_case("n"),
    }
}

fn build_authenticator(config: &Config) -> Box<dyn Authenticator> {
    let session_ttl =
        Duration::seconds(i64::try_from(config.session_ttl_secs).unwrap_or(i64::MAX / 1000));
    match config.auth_mode {
        AuthMode::Interactive => Box::new(InteractiveAuthenticator::new(
            Box::new(prompt_on_terminal),
            session_ttl,
        )),
        AuthMode::Stored => {
            if config.password.is_none() {
                tracing::warn!(
                    "auth_mode is stored but no FUNNEL_PASSWORD is set; warehouse queries will fail"
                );
            }
            Box::new(StoredCredentialAuthenticator::new(
                config.password.clone().unwrap_or_default(),
                session_ttl,
            ))
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "funnel_analytics=info,tower_http=info".into()),
        )
        .init();

    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref().map(std::path::Path::new));

    let table = config
        .funnel_table()
        .unwrap_or_else(|e| panic!("Invalid funnel table configuration: {e}"));

    tracing::info!(
        host = %config.host,
        port = config.port,
        table = %table,
        auth_mode = ?config.auth_mode,
        cache_ttl_secs = config.cache_ttl_secs,
        "Starting funnel analytics"
    );

    // Open the embedded warehouse
    let warehouse = match (config.database_path.as_deref(), table.database()) {
        (Some(path), Some(catalog)) => DuckDbWarehouse::open_as(path, catalog),
        (path, _) => DuckDbWarehouse::open(path),
    }
    .unwrap_or_else(|e| panic!("Failed to open warehouse database: {e}"));
    match config.parquet_source.as_deref() {
        Some(pattern) => ParquetSource::new(pattern)
            .attach(warehouse.connection(), &table)
            .unwrap_or_else(|e| panic!("Failed to attach Parquet source: {e}")),
        None => {
            if config.database_path.is_none() {
                tracing::warn!(
                    "No database_path or parquet_source configured; serving an empty in-memory table"
                );
            }
            run_migrations(warehouse.connection(), &table).expect("Failed to run migrations");
        }
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let authenticator = build_authenticator(&config);
    let auth_method = authenticator.method();
    let mut session = WarehouseSession::new(
        warehouse,
        authenticator,
        config.identity(),
        Arc::clone(&clock),
    );

    // Log in before serving so no request waits on the terminal prompt
    let session = tokio::task::spawn_blocking(move || {
        let login = session.authenticate();
        (session, login)
    })
    .await
    .unwrap_or_else(|e| panic!("Warehouse login task failed: {e}"));
    let session = match session {
        (session, Ok(())) => session,
        (_, Err(e)) if auth_method == AuthMethod::Interactive => {
            panic!("Warehouse login failed: {e}")
        }
        (session, Err(e)) => {
            tracing::warn!(error = %e, "Warehouse login failed; retrying on first query");
            session
        }
    };
    let warehouse: Box<dyn Warehouse> = Box::new(session);

    let cache = QueryCache::new(config.cache_ttl_secs, Arc::clone(&clock));

    // Sweep expired cache entries so stale windows do not accumulate
    if config.cache_ttl_secs > 0 {
        let sweep_cache = cache.clone();
        let sweep_interval = config.cache_ttl_secs.max(60);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(sweep_interval));
            loop {
                interval.tick().await;
                let before = sweep_cache.len();
                sweep_cache.cleanup_expired();
                let swept = before.saturating_sub(sweep_cache.len());
                if swept > 0 {
                    tracing::debug!(swept, "Expired cache entries removed");
                }
            }
        });
    }

    let state = Arc::new(AppState {
        service: FunnelQueryService::new(warehouse, cache, table),
        clock,
        auth_method,
        dashboard_origin: config.dashboard_origin.clone(),
    });

    let app = server::build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app).await.expect("Server error");
}
