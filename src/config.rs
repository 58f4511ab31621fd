use crate::query::metric_set::{FunnelTable, DEFAULT_TABLE};
use crate::warehouse::auth::Identity;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// How the service authenticates to the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Operator completes the login on the terminal at startup, and again
    /// after the session expires (local use).
    Interactive,
    /// Secret from `password` / `FUNNEL_PASSWORD` (hosted use).
    Stored,
}

/// Application configuration loaded from environment variables or TOML file.
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Warehouse account identifier.
    #[serde(default)]
    pub account: String,
    /// Warehouse user the session is opened for.
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_auth_mode")]
    pub auth_mode: AuthMode,
    /// Stored credential. Prefer `FUNNEL_PASSWORD` over writing it to a file.
    #[serde(default)]
    pub password: Option<String>,
    /// Named compute resource the queries run on.
    #[serde(default = "default_warehouse")]
    pub warehouse: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_schema")]
    pub schema: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    /// DuckDB database file hosting the funnel table. In-memory if unset.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Parquet file or glob exposed as the funnel table.
    #[serde(default)]
    pub parquet_source: Option<String>,
    /// Query cache TTL in seconds (default: 3600). 0 = no caching.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Warehouse session lifetime in seconds (default: 14400 = 4h).
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Dashboard origin for CORS restrictions on API routes.
    #[serde(default)]
    pub dashboard_origin: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8501
}

const fn default_auth_mode() -> AuthMode {
    AuthMode::Interactive
}

fn default_warehouse() -> String {
    "SHARED".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_schema() -> Option<String> {
    Some("DBT_ANALYTICS".to_string())
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

const fn default_cache_ttl_secs() -> u64 {
    3600
}

const fn default_session_ttl_secs() -> u64 {
    14_400
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            account: String::new(),
            user: String::new(),
            auth_mode: default_auth_mode(),
            password: None,
            warehouse: default_warehouse(),
            database: None,
            schema: default_schema(),
            table: default_table(),
            database_path: None,
            parquet_source: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            dashboard_origin: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("account", &self.account)
            .field("user", &self.user)
            .field("auth_mode", &self.auth_mode)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("database_path", &self.database_path)
            .field("parquet_source", &self.parquet_source)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("dashboard_origin", &self.dashboard_origin)
            .finish()
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variables override file values:
    /// - `FUNNEL_HOST` → host
    /// - `FUNNEL_PORT` → port
    /// - `FUNNEL_ACCOUNT` → account
    /// - `FUNNEL_USER` → user
    /// - `FUNNEL_AUTH_MODE` → auth_mode (`interactive` | `stored`)
    /// - `FUNNEL_PASSWORD` → password
    /// - `FUNNEL_WAREHOUSE` → warehouse
    /// - `FUNNEL_DATABASE` → database
    /// - `FUNNEL_SCHEMA` → schema
    /// - `FUNNEL_TABLE` → table
    /// - `FUNNEL_DATABASE_PATH` → database_path
    /// - `FUNNEL_PARQUET_SOURCE` → parquet_source
    /// - `FUNNEL_CACHE_TTL` → cache_ttl_secs
    /// - `FUNNEL_SESSION_TTL` → session_ttl_secs
    /// - `FUNNEL_DASHBOARD_ORIGIN` → dashboard_origin
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut config =
            config_path.map_or_else(Self::default, |path| match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config file: {e}, using defaults");
                    Self::default()
                }
            });

        if let Ok(host) = std::env::var("FUNNEL_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("FUNNEL_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(account) = std::env::var("FUNNEL_ACCOUNT") {
            config.account = account;
        }
        if let Ok(user) = std::env::var("FUNNEL_USER") {
            config.user = user;
        }
        if let Ok(mode) = std::env::var("FUNNEL_AUTH_MODE") {
            match mode.to_lowercase().as_str() {
                "interactive" => config.auth_mode = AuthMode::Interactive,
                "stored" => config.auth_mode = AuthMode::Stored,
                other => tracing::warn!("Ignoring unknown FUNNEL_AUTH_MODE: {other}"),
            }
        }
        if let Ok(password) = std::env::var("FUNNEL_PASSWORD") {
            config.password = Some(password);
        }
        if let Ok(warehouse) = std::env::var("FUNNEL_WAREHOUSE") {
            config.warehouse = warehouse;
        }
        if let Ok(database) = std::env::var("FUNNEL_DATABASE") {
            config.database = Some(database);
        }
        if let Ok(schema) = std::env::var("FUNNEL_SCHEMA") {
            config.schema = Some(schema);
        }
        if let Ok(table) = std::env::var("FUNNEL_TABLE") {
            config.table = table;
        }
        if let Ok(path) = std::env::var("FUNNEL_DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Ok(source) = std::env::var("FUNNEL_PARQUET_SOURCE") {
            config.parquet_source = Some(source);
        }
        if let Ok(val) = std::env::var("FUNNEL_CACHE_TTL") {
            if let Ok(t) = val.parse() {
                config.cache_ttl_secs = t;
            }
        }
        if let Ok(val) = std::env::var("FUNNEL_SESSION_TTL") {
            if let Ok(t) = val.parse() {
                config.session_ttl_secs = t;
            }
        }
        if let Ok(origin) = std::env::var("FUNNEL_DASHBOARD_ORIGIN") {
            config.dashboard_origin = Some(origin);
        }

        config
    }

    /// The validated, qualified funnel table name.
    pub fn funnel_table(&self) -> Result<FunnelTable, String> {
        FunnelTable::new(
            self.database.as_deref(),
            self.schema.as_deref(),
            &self.table,
        )
    }

    /// The identity warehouse sessions are opened for.
    pub fn identity(&self) -> Identity {
        Identity {
            account: self.account.clone(),
            user: self.user.clone(),
            warehouse: self.warehouse.clone(),
        }
    }
}
