//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "shopfront";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_SESSION_COOKIE_NAME: &str = "shopfront.sid";
const DEFAULT_SESSION_INACTIVITY_DAYS: u32 = 14;
const MIN_SESSION_SECRET_BYTES: usize = 32;
const DEFAULT_UPLOAD_DIR: &str = "images";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_PUBLIC_DIR: &str = "public";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub session: SessionSettings,
    pub uploads: UploadSettings,
    pub assets: AssetSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Clone)]
pub struct SessionSettings {
    /// Signing secret; `serve` refuses to start without one.
    pub secret: Option<String>,
    pub cookie_name: String,
    pub inactivity_days: NonZeroU32,
    pub secure_cookie: bool,
}

impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("cookie_name", &self.cookie_name)
            .field("inactivity_days", &self.inactivity_days)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub max_request_bytes: NonZeroU64,
}

impl UploadSettings {
    /// Request body limit in bytes. Loading already rejected values wider than `usize`.
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_request_bytes.get()).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub public_directory: PathBuf,
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

    builder = builder.add_source(Environment::with_prefix("SHOPFRONT").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let mut args = CliArgs::parse();
    if args.command.is_none() {
        // `serve` is the default; parse it so its environment fallbacks still apply.
        args.command = CliArgs::parse_from(["shopfront", "serve"]).command;
    }
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
    uploads: RawUploadSettings,
    assets: RawAssetSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_database_override(&overrides.database);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(secret) = overrides.session_secret.as_ref() {
            self.session.secret = Some(secret.clone());
        }
        if let Some(secure) = overrides.session_secure_cookie {
            self.session.secure_cookie = Some(secure);
        }
        if let Some(directory) = overrides.uploads_directory.as_ref() {
            self.uploads.directory = Some(directory.clone());
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        if let Some(directory) = overrides.public_directory.as_ref() {
            self.assets.public_directory = Some(directory.clone());
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    /// Cookie signing secret; `serve` cannot start without one.
    pub fn require_session_secret(&self) -> Result<&str, LoadError> {
        self.session.secret.as_deref().ok_or_else(|| {
            LoadError::invalid(
                "session.secret",
                "must be set to serve requests (SESSION_SECRET)",
            )
        })
    }

    pub fn require_database_url(&self) -> Result<&str, LoadError> {
        self.database.url.as_deref().ok_or_else(|| {
            LoadError::invalid("database.url", "must be set (DATABASE_URL)")
        })
    }

    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            session,
            uploads,
            assets,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            session: build_session_settings(session)?,
            uploads: build_upload_settings(uploads)?,
            assets: build_asset_settings(assets)?,
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

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
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
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_session_settings(session: RawSessionSettings) -> Result<SessionSettings, LoadError> {
    let secret = session.secret.filter(|value| !value.is_empty());
    if let Some(secret) = secret.as_ref()
        && secret.len() < MIN_SESSION_SECRET_BYTES
    {
        return Err(LoadError::invalid(
            "session.secret",
            format!("must be at least {MIN_SESSION_SECRET_BYTES} bytes long"),
        ));
    }

    let cookie_name = session
        .cookie_name
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.to_string());
    if cookie_name.is_empty() {
        return Err(LoadError::invalid(
            "session.cookie_name",
            "must not be empty",
        ));
    }

    let inactivity_days = non_zero_u32(
        session
            .inactivity_days
            .unwrap_or(DEFAULT_SESSION_INACTIVITY_DAYS)
            .into(),
        "session.inactivity_days",
    )?;

    Ok(SessionSettings {
        secret,
        cookie_name,
        inactivity_days,
        secure_cookie: session.secure_cookie.unwrap_or(false),
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let directory = uploads
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "uploads.directory",
            "path must not be empty",
        ));
    }

    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings {
        directory,
        max_request_bytes,
    })
}

fn build_asset_settings(assets: RawAssetSettings) -> Result<AssetSettings, LoadError> {
    let public_directory = assets
        .public_directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLIC_DIR));
    if public_directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "assets.public_directory",
            "path must not be empty",
        ));
    }

    Ok(AssetSettings { public_directory })
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
    max_connections: Option<u32>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    secret: Option<String>,
    cookie_name: Option<String>,
    inactivity_days: Option<u32>,
    secure_cookie: Option<bool>,
}

impl std::fmt::Debug for RawSessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSessionSettings")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("cookie_name", &self.cookie_name)
            .field("inactivity_days", &self.inactivity_days)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAssetSettings {
    public_directory: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
