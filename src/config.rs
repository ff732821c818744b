use serde::Deserialize;
use std::{fmt, str::FromStr, time::Duration};

use crate::error::{Error, Result};
use crate::logger::LogLevel;

pub const DEFAULT_SERVICE_NAME: &str = "my-service";

const MASKED: &str = "********";

/// Process-wide configuration, read once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub server: ServerConfig,
    /// Present only when `DATABASE_HOST` or `DATABASE_URI` is set
    pub database: Option<DatabaseConfig>,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Debug,
    Release,
    Test,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Debug => "debug",
            RunMode::Release => "release",
            RunMode::Test => "test",
        }
    }
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(RunMode::Debug),
            "release" => Ok(RunMode::Release),
            "test" => Ok(RunMode::Test),
            _ => Err(Error::invalid_config(format!(
                "SERVER_RUN_MODE must be one of debug, release, test (got '{}')",
                s
            ))),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub run_mode: RunMode,
    pub host: String,
    pub port: u16,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Debug,
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_timeout: Duration::from_secs(600),
            write_timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection string; overrides the individual fields below
    pub uri: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub tls_mode: bool,
    /// Connect and server-selection timeout
    pub timeout: Duration,
}

impl DatabaseConfig {
    /// MongoDB connection string built from the configured parts.
    ///
    /// Credentials are percent-encoded. The database name doubles as the
    /// authentication source.
    pub fn connection_uri(&self) -> String {
        if let Some(uri) = &self.uri {
            return uri.clone();
        }

        let credentials = if self.user.is_empty() {
            String::new()
        } else {
            format!(
                "{}:{}@",
                urlencoding::encode(&self.user),
                urlencoding::encode(&self.password)
            )
        };

        format!(
            "mongodb://{}{}:{}/{}?tls={}",
            credentials, self.host, self.port, self.name, self.tls_mode
        )
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub output: String,
    /// Paths that bypass request logging entirely (health checks etc.)
    pub skip_paths: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "console".to_string(),
            skip_paths: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            server: ServerConfig::default(),
            database: None,
            log: LogConfig::default(),
        }
    }
}

/// Flat view of the environment, one field per variable.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct EnvSettings {
    service_name: String,
    server_run_mode: String,
    server_host: String,
    server_port: u16,
    server_read_timeout: String,
    server_write_timeout: String,
    database_uri: Option<String>,
    database_host: Option<String>,
    database_port: u16,
    database_user: Option<String>,
    database_password: Option<String>,
    database_name: String,
    database_tls_mode: bool,
    database_timeout: String,
    log_level: String,
    log_output: String,
    log_skip_paths: String,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            server_run_mode: "debug".to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            server_read_timeout: "600s".to_string(),
            server_write_timeout: "600s".to_string(),
            database_uri: None,
            database_host: None,
            database_port: 27017,
            database_user: None,
            database_password: None,
            database_name: "admin".to_string(),
            database_tls_mode: true,
            database_timeout: "10s".to_string(),
            log_level: "info".to_string(),
            log_output: "console".to_string(),
            log_skip_paths: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_source(None)
    }

    /// Load configuration from an explicit variable map, or from the process
    /// environment when `source` is `None`.
    pub fn from_source(source: Option<config::Map<String, String>>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::default().source(source))
            .build()?;

        let env: EnvSettings = settings.try_deserialize()?;
        let cfg = Self::from_settings(env)?;
        cfg.validate()?;

        Ok(cfg)
    }

    fn from_settings(env: EnvSettings) -> Result<Self> {
        let server = ServerConfig {
            run_mode: env.server_run_mode.parse()?,
            host: env.server_host,
            port: env.server_port,
            read_timeout: parse_duration(&env.server_read_timeout)
                .map_err(|e| Error::invalid_config(format!("SERVER_READ_TIMEOUT: {}", e)))?,
            write_timeout: parse_duration(&env.server_write_timeout)
                .map_err(|e| Error::invalid_config(format!("SERVER_WRITE_TIMEOUT: {}", e)))?,
        };

        let uri = non_empty(env.database_uri);
        let host = non_empty(env.database_host);
        let database = if uri.is_some() || host.is_some() {
            Some(DatabaseConfig {
                uri,
                host: host.unwrap_or_default(),
                port: env.database_port,
                user: non_empty(env.database_user).unwrap_or_default(),
                password: non_empty(env.database_password).unwrap_or_default(),
                name: env.database_name,
                tls_mode: env.database_tls_mode,
                timeout: parse_duration(&env.database_timeout)
                    .map_err(|e| Error::invalid_config(format!("DATABASE_TIMEOUT: {}", e)))?,
            })
        } else {
            None
        };

        let skip_paths = env
            .log_skip_paths
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();

        Ok(Config {
            service_name: env.service_name,
            server,
            database,
            log: LogConfig {
                level: env.log_level,
                output: env.log_output,
                skip_paths,
            },
        })
    }

    fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(Error::invalid_config("SERVICE_NAME cannot be empty"));
        }

        LogLevel::from_str(&self.log.level)?;

        if let Some(db) = &self.database {
            if db.uri.is_none() {
                if db.user.is_empty() {
                    return Err(Error::invalid_config(
                        "DATABASE_USER is required when DATABASE_HOST is set",
                    ));
                }
                if db.password.is_empty() {
                    return Err(Error::invalid_config(
                        "DATABASE_PASSWORD is required when DATABASE_HOST is set",
                    ));
                }
            }
            if db.name.trim().is_empty() {
                return Err(Error::invalid_config("DATABASE_NAME cannot be empty"));
            }
        }

        Ok(())
    }
}

/// One `KEY: value` line per setting, secrets masked.
impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SERVICE_NAME: {}", self.service_name)?;
        writeln!(f, "SERVER_RUN_MODE: {}", self.server.run_mode)?;
        writeln!(f, "SERVER_HOST: {}", self.server.host)?;
        writeln!(f, "SERVER_PORT: {}", self.server.port)?;
        writeln!(f, "SERVER_READ_TIMEOUT: {:?}", self.server.read_timeout)?;
        writeln!(f, "SERVER_WRITE_TIMEOUT: {:?}", self.server.write_timeout)?;
        match &self.database {
            Some(db) => {
                if db.uri.is_some() {
                    writeln!(f, "DATABASE_URI: {}", MASKED)?;
                }
                writeln!(f, "DATABASE_HOST: {}", db.host)?;
                writeln!(f, "DATABASE_PORT: {}", db.port)?;
                writeln!(f, "DATABASE_USER: {}", db.user)?;
                writeln!(f, "DATABASE_PASSWORD: {}", MASKED)?;
                writeln!(f, "DATABASE_NAME: {}", db.name)?;
                writeln!(f, "DATABASE_TLS_MODE: {}", db.tls_mode)?;
                writeln!(f, "DATABASE_TIMEOUT: {:?}", db.timeout)?;
            }
            None => writeln!(f, "DATABASE: disabled")?,
        }
        writeln!(f, "LOG_LEVEL: {}", self.log.level)?;
        writeln!(f, "LOG_OUTPUT: {}", self.log.output)?;
        write!(f, "LOG_SKIP_PATHS: {}", self.log.skip_paths.join(","))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a Go-style duration (`600s`, `1m30s`, `250ms`, `1.5h`).
///
/// A bare integer is read as seconds.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return Err(format!("invalid duration '{}'", input));
        }
        let value: f64 = rest[..num_end]
            .parse()
            .map_err(|_| format!("invalid duration '{}'", input))?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration '{}'", input)),
            unit => return Err(format!("unknown unit '{}' in duration '{}'", unit, input)),
        };
        rest = &rest[unit_end..];

        total += Duration::from_nanos((value * nanos_per_unit).round() as u64);
    }

    Ok(total)
}
