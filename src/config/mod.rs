//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bottega";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_SESSION_TTL_SECS: u64 = 14 * 24 * 60 * 60;
const DEFAULT_ACCESS_LOG_PATH: &str = "access.log";
const DEFAULT_ACCESS_LOG_QUEUE: u32 = 1024;

/// Command-line arguments for the Bottega binary.
#[derive(Debug, Parser)]
#[command(name = "bottega", version, about = "Bottega storefront server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BOTTEGA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Bottega HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the session time-to-live.
    #[arg(long = "session-ttl-seconds", value_name = "SECONDS")]
    pub session_ttl_seconds: Option<u64>,

    /// Override the access log file path.
    #[arg(long = "access-log-path", value_name = "PATH")]
    pub access_log_path: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub session: SessionSettings,
    pub access_log: AccessLogSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct AccessLogSettings {
    pub path: PathBuf,
    pub queue_capacity: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("BOTTEGA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    session: RawSessionSettings,
    access_log: RawAccessLogSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(ttl) = overrides.session_ttl_seconds {
            self.session.ttl_seconds = Some(ttl);
        }
        if let Some(path) = overrides.access_log_path.as_ref() {
            self.access_log.path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            session,
            access_log,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            session: build_session_settings(session)?,
            access_log: build_access_log_settings(access_log)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    Ok(ServerSettings { host, port })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let explicit = database.url.as_ref().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let url = match explicit {
        Some(url) => url,
        None => compose_database_url(&database)?,
    };

    let max = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max)
        .ok_or_else(|| LoadError::invalid("database.max_connections", "must be greater than zero"))?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

/// Compose a connection URL from the credential triplet (`database.user`,
/// `database.password`, `database.name`) when no explicit URL is configured.
fn compose_database_url(database: &RawDatabaseSettings) -> Result<String, LoadError> {
    let user = database
        .user
        .as_deref()
        .ok_or_else(|| LoadError::invalid("database.user", "missing (set database.url instead)"))?;
    let password = database.password.as_deref().ok_or_else(|| {
        LoadError::invalid("database.password", "missing (set database.url instead)")
    })?;
    let name = database
        .name
        .as_deref()
        .ok_or_else(|| LoadError::invalid("database.name", "missing (set database.url instead)"))?;

    let host = database.host.as_deref().unwrap_or(DEFAULT_DB_HOST);
    let port = database.port.unwrap_or(DEFAULT_DB_PORT);

    let mut url = Url::parse(&format!("postgres://{host}:{port}"))
        .map_err(|err| LoadError::invalid("database.host", err.to_string()))?;
    url.set_username(user)
        .map_err(|_| LoadError::invalid("database.user", "not representable in a URL"))?;
    url.set_password(Some(password))
        .map_err(|_| LoadError::invalid("database.password", "not representable in a URL"))?;
    url.set_path(name);

    Ok(url.to_string())
}

fn build_session_settings(session: RawSessionSettings) -> Result<SessionSettings, LoadError> {
    let ttl_seconds = session.ttl_seconds.unwrap_or(DEFAULT_SESSION_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "session.ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(SessionSettings {
        ttl: Duration::from_secs(ttl_seconds),
    })
}

fn build_access_log_settings(
    access_log: RawAccessLogSettings,
) -> Result<AccessLogSettings, LoadError> {
    let path = access_log
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ACCESS_LOG_PATH));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "access_log.path",
            "path must not be empty",
        ));
    }

    let queue = access_log.queue_capacity.unwrap_or(DEFAULT_ACCESS_LOG_QUEUE);
    let queue_capacity = NonZeroU32::new(queue).ok_or_else(|| {
        LoadError::invalid("access_log.queue_capacity", "must be greater than zero")
    })?;

    Ok(AccessLogSettings {
        path,
        queue_capacity,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    name: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAccessLogSettings {
    path: Option<PathBuf>,
    queue_capacity: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());
        raw.database.url = Some("postgres://example".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.port, 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn database_url_composes_from_credential_triplet() {
        let mut raw = RawSettings::default();
        raw.database.user = Some("shop".to_string());
        raw.database.password = Some("p@ss/word".to_string());
        raw.database.name = Some("bottega".to_string());

        let settings = Settings::from_raw(raw).expect("valid settings");
        let url = Url::parse(&settings.database.url).expect("well-formed url");
        assert_eq!(url.scheme(), "postgres");
        assert_eq!(url.username(), "shop");
        assert_eq!(url.path(), "/bottega");
        // Reserved characters in the password survive the round trip.
        assert_eq!(url.password().map(|p| p.contains("p%40ss")), Some(true));
    }

    #[test]
    fn explicit_url_wins_over_triplet() {
        let mut raw = RawSettings::default();
        raw.database.url = Some("postgres://explicit/db".to_string());
        raw.database.user = Some("ignored".to_string());
        raw.database.password = Some("ignored".to_string());
        raw.database.name = Some("ignored".to_string());

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.database.url, "postgres://explicit/db");
    }

    #[test]
    fn missing_credentials_without_url_is_an_error() {
        let raw = RawSettings::default();
        let err = Settings::from_raw(raw).expect_err("missing database configuration");
        assert!(matches!(err, LoadError::Invalid { key, .. } if key == "database.user"));
    }

    #[test]
    fn port_defaults_when_unset() {
        let mut raw = RawSettings::default();
        raw.database.url = Some("postgres://example".to_string());
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert_eq!(settings.server.bind_addr(), "127.0.0.1:4000");
    }

    #[test]
    fn zero_session_ttl_is_rejected() {
        let mut raw = RawSettings::default();
        raw.database.url = Some("postgres://example".to_string());
        raw.session.ttl_seconds = Some(0);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        raw.database.url = Some("postgres://example".to_string());
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["bottega"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "bottega",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--database-url",
            "postgres://override",
            "--access-log-path",
            "/var/log/bottega/access.log",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(
                    serve.overrides.database_url.as_deref(),
                    Some("postgres://override")
                );
                assert_eq!(
                    serve.overrides.access_log_path.as_deref(),
                    Some(std::path::Path::new("/var/log/bottega/access.log"))
                );
            }
        }
    }
}
