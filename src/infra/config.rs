//! For reading application configuration.

use serde::Deserialize;
use std::time::Duration;

/// Application configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Security configuration.
    pub security: SecurityConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Users provisioned on startup.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// Server address.
    pub http_address: String,
    /// Server http port.
    pub http_port: u16,
    /// How long a request may take before it is aborted.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Maximum number of requests handled at once.
    pub concurrency_limit: usize,
}

/// Which store backs items and users.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A PostgreSQL database.
    Postgres,
    /// Process-local tables, lost on restart.
    Memory,
}

/// Database configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    /// The storage backend.
    pub backend: Backend,
    /// The database username.
    pub username: String,
    /// The database password.
    pub password: String,
    /// The database port.
    pub port: u16,
    /// The database name.
    pub database_name: String,
    /// The database host.
    pub host: String,
    /// The maximum size of the connection pool.
    pub max_connections: u32,
}

/// Security configuration.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct SecurityConfig {
    /// The bcrypt cost used when hashing provisioned passwords.
    pub bcrypt_cost: u32,
}

/// Logging configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    /// Default filter, overridden by `RUST_LOG`.
    pub filter: String,
    /// Directory for hourly JSON log files, if any.
    pub directory: Option<String>,
    /// OTLP collector endpoint, if traces should be exported.
    pub otlp_endpoint: Option<String>,
}

/// A user known to the service.
#[derive(Clone, Deserialize)]
pub struct UserConfig {
    /// The principal name.
    pub username: String,
    /// The plaintext password, hashed before it is stored.
    pub password: String,
    /// Role claims, such as `reader` and `writer`.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("username", &self.username)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

/// Retrieve [`Config`] from the default configuration file.
#[tracing::instrument]
pub fn load_config() -> color_eyre::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::with_name("config"))
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?
        .try_deserialize()?;
    Ok(config)
}
