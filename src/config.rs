use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Application configuration, loaded from `config/{env}.toml` (optional) with
/// `ALMACEN_*` environment variables taking precedence.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub auto_migrate: bool,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    /// Company segment of document numbers (`C{company_code}/IN/00001`).
    pub company_code: String,
}

impl AppConfig {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    let mut builder = Config::builder()
        .set_default("database_url", "sqlite://almacen.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .set_default("db_max_connections", 10)?
        .set_default("db_min_connections", 1)?
        .set_default("company_code", "1")?;

    if Path::new(CONFIG_DIR).exists() {
        builder = builder
            .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));
    } else {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    builder = builder.add_source(Environment::with_prefix("ALMACEN").separator("__"));

    builder.build()?.try_deserialize()
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let default_directive = format!("almacen_api={},tower_http=info", level);
    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::new(filter));
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
