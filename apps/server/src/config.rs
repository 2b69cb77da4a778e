//! Application configuration
//!
//! Layered: `config/default.toml` → optional `config/{RUN_ENV}.toml` →
//! environment variables prefixed `CAREMESH__` (double underscore as the
//! separator, e.g. `CAREMESH__DATABASE__URL`). `DATABASE_URL` is honored as
//! a conventional override for the database connection string.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body, in bytes.
    pub max_request_body_size: usize,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_request_body_size: 1024 * 1024,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_min_size")]
    pub pool_min_size: usize,
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: usize,
    /// How long `acquire()` waits for a free connection before failing.
    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout_seconds: u64,
    /// Idle connections older than this are closed by the sweep.
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_seconds: u64,
    #[serde(default = "default_pool_sweep_interval")]
    pub pool_sweep_interval_seconds: u64,
}

fn default_pool_min_size() -> usize {
    2
}
fn default_pool_max_size() -> usize {
    10
}
fn default_pool_acquire_timeout() -> u64 {
    5
}
fn default_pool_idle_timeout() -> u64 {
    300
}
fn default_pool_sweep_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_radius_km: f64,
    pub max_radius_km: f64,
    pub default_limit: usize,
    pub max_limit: usize,
    /// Primary spatial query budget; on expiry the engine falls back to the
    /// client-side scan.
    pub query_timeout_ms: u64,
    /// Cache-Control max-age on successful search responses, in seconds.
    pub cache_max_age_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 5.0,
            max_radius_km: 50.0,
            default_limit: 50,
            max_limit: 100,
            query_timeout_ms: 2_000,
            cache_max_age_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteQuota {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl RouteQuota {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Quota applied to routes with no explicit entry.
    pub default: RouteQuota,
    /// Per-route overrides, keyed by the matched route path.
    pub routes: HashMap<String, RouteQuota>,
    pub sweep_interval_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut routes = HashMap::new();
        routes.insert(
            "/api/pharmacies/search".to_string(),
            RouteQuota {
                max_requests: 30,
                window_seconds: 60,
            },
        );
        Self {
            default: RouteQuota {
                max_requests: 60,
                window_seconds: 60,
            },
            routes,
            sweep_interval_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Base URL of the geocoding collaborator; empty disables address input.
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file_enabled: bool,
    pub file_directory: String,
    pub file_prefix: String,
    /// daily | hourly | minutely | never
    pub file_rotation: String,
    pub deployment_environment: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_enabled: false,
            file_directory: "logs".to_string(),
            file_prefix: "caremesh".to_string(),
            file_rotation: "daily".to_string(),
            deployment_environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from files and the environment.
    pub fn load() -> anyhow::Result<Self> {
        let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_env}")).required(false))
            .add_source(config::Environment::with_prefix("CAREMESH").separator("__"));

        // Conventional override used by most deployment environments.
        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }

        let config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.is_empty() {
            return Err("database.url must be set".to_string());
        }
        if self.database.pool_max_size == 0 {
            return Err("database.pool_max_size must be at least 1".to_string());
        }
        if self.database.pool_min_size > self.database.pool_max_size {
            return Err("database.pool_min_size must not exceed pool_max_size".to_string());
        }
        if self.search.max_radius_km <= 0.0 {
            return Err("search.max_radius_km must be positive".to_string());
        }
        if self.search.default_radius_km <= 0.0
            || self.search.default_radius_km > self.search.max_radius_km
        {
            return Err("search.default_radius_km must be in (0, max_radius_km]".to_string());
        }
        if self.search.max_limit == 0 || self.search.default_limit == 0 {
            return Err("search limits must be positive".to_string());
        }
        if self.rate_limit.default.max_requests == 0 {
            return Err("rate_limit.default.max_requests must be positive".to_string());
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port).parse()?;
        Ok(addr)
    }
}
