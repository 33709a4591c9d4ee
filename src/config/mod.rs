//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod proxies;

pub use proxies::{IpBlock, TrustedProxies};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vestry";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_PLATFORM_APEX: &str = "vestry.site";
const DEFAULT_PREVIEW_TTL_SECS: u64 = 3600;
const DEFAULT_HASH_SALT: &str = "vestry";
const DEFAULT_LONG_FIELD_CHARS: u64 = 800;
const DEFAULT_LONG_FIELD_WEIGHT: i32 = 30;
const DEFAULT_URL_WEIGHT: i32 = 25;
const DEFAULT_QUARANTINE_SCORE: i32 = 40;
const DEFAULT_FORM_MAX_SUBMISSIONS: u64 = 4;
const DEFAULT_FORM_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 180;
const DEFAULT_VERIFICATION_PREFIX: &str = "_verify";
const DEFAULT_DNS_LOOKUP_TIMEOUT_SECS: u64 = 5;

/// Command-line arguments for the Vestry binary.
#[derive(Debug, Parser)]
#[command(name = "vestry", version, about = "Vestry website content service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VESTRY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Trust forwarding headers from this proxy address or CIDR block (repeatable).
    #[arg(long = "trusted-proxy", value_name = "CIDR")]
    pub trusted_proxies: Vec<String>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the apex domain whose subdomains are verified automatically.
    #[arg(long = "platform-apex-domain", value_name = "DOMAIN")]
    pub platform_apex_domain: Option<String>,

    /// Override the public rate limit window size.
    #[arg(long = "rate-limit-window-seconds", value_name = "SECONDS")]
    pub rate_limit_window_seconds: Option<u64>,

    /// Override the public rate limit request ceiling.
    #[arg(long = "rate-limit-max-requests", value_name = "COUNT")]
    pub rate_limit_max_requests: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub website: WebsiteSettings,
    pub forms: FormSettings,
    pub rate_limit: RateLimitSettings,
    pub dns: DnsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub trusted_proxies: TrustedProxies,
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

#[derive(Debug, Clone)]
pub struct WebsiteSettings {
    pub platform_apex_domain: String,
    pub preview_ttl: Duration,
    pub hash_salt: String,
}

#[derive(Debug, Clone)]
pub struct FormSettings {
    pub long_field_chars: usize,
    pub long_field_weight: i32,
    pub url_weight: i32,
    pub quarantine_score: i32,
    pub rate_limit_max_submissions: NonZeroU32,
    pub rate_limit_window: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct DnsSettings {
    pub verification_prefix: String,
    pub lookup_timeout: Duration,
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

    builder = builder.add_source(
        Environment::with_prefix("VESTRY")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("server.trusted_proxies")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    website: RawWebsiteSettings,
    forms: RawFormSettings,
    rate_limit: RawRateLimitSettings,
    dns: RawDnsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if !overrides.trusted_proxies.is_empty() {
            self.server.trusted_proxies = Some(overrides.trusted_proxies.clone());
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
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
        if let Some(apex) = overrides.platform_apex_domain.as_ref() {
            self.website.platform_apex_domain = Some(apex.clone());
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_max_requests {
            self.rate_limit.max_requests = Some(max);
        }

        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            website,
            forms,
            rate_limit,
            dns,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            website: build_website_settings(website)?,
            forms: build_form_settings(forms)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
            dns: build_dns_settings(dns)?,
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

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let trusted_proxies = TrustedProxies::parse(&server.trusted_proxies.unwrap_or_default())
        .map_err(|reason| LoadError::invalid("server.trusted_proxies", reason))?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        trusted_proxies,
    })
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

fn build_website_settings(website: RawWebsiteSettings) -> Result<WebsiteSettings, LoadError> {
    let apex = website
        .platform_apex_domain
        .unwrap_or_else(|| DEFAULT_PLATFORM_APEX.to_string())
        .trim()
        .trim_matches('.')
        .to_ascii_lowercase();
    if apex.is_empty() {
        return Err(LoadError::invalid(
            "website.platform_apex_domain",
            "must not be empty",
        ));
    }

    let ttl_secs = website
        .preview_ttl_seconds
        .unwrap_or(DEFAULT_PREVIEW_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "website.preview_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let hash_salt = website
        .hash_salt
        .filter(|salt| !salt.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HASH_SALT.to_string());

    Ok(WebsiteSettings {
        platform_apex_domain: apex,
        preview_ttl: Duration::from_secs(ttl_secs),
        hash_salt,
    })
}

fn build_form_settings(forms: RawFormSettings) -> Result<FormSettings, LoadError> {
    let long_field_chars = forms.long_field_chars.unwrap_or(DEFAULT_LONG_FIELD_CHARS);
    if long_field_chars == 0 {
        return Err(LoadError::invalid(
            "forms.long_field_chars",
            "must be greater than zero",
        ));
    }
    let long_field_chars = usize::try_from(long_field_chars).map_err(|_| {
        LoadError::invalid(
            "forms.long_field_chars",
            "value exceeds supported range for usize",
        )
    })?;

    let quarantine_score = forms.quarantine_score.unwrap_or(DEFAULT_QUARANTINE_SCORE);
    if quarantine_score <= 0 {
        return Err(LoadError::invalid(
            "forms.quarantine_score",
            "must be greater than zero",
        ));
    }

    let window_secs = forms
        .rate_limit_window_seconds
        .unwrap_or(DEFAULT_FORM_WINDOW_SECS);
    if window_secs == 0 {
        return Err(LoadError::invalid(
            "forms.rate_limit_window_seconds",
            "must be greater than zero",
        ));
    }

    Ok(FormSettings {
        long_field_chars,
        long_field_weight: forms.long_field_weight.unwrap_or(DEFAULT_LONG_FIELD_WEIGHT),
        url_weight: forms.url_weight.unwrap_or(DEFAULT_URL_WEIGHT),
        quarantine_score,
        rate_limit_max_submissions: non_zero_u32(
            forms
                .rate_limit_max_submissions
                .unwrap_or(DEFAULT_FORM_MAX_SUBMISSIONS),
            "forms.rate_limit_max_submissions",
        )?,
        rate_limit_window: Duration::from_secs(window_secs),
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds_val = rate_limit
        .window_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);
    let window_seconds = non_zero_u32(window_seconds_val, "rate_limit.window_seconds")?;

    let max_requests_val = rate_limit
        .max_requests
        .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS);
    let max_requests = non_zero_u32(max_requests_val, "rate_limit.max_requests")?;

    Ok(RateLimitSettings {
        window_seconds,
        max_requests,
    })
}

fn build_dns_settings(dns: RawDnsSettings) -> Result<DnsSettings, LoadError> {
    let prefix = dns
        .verification_prefix
        .unwrap_or_else(|| DEFAULT_VERIFICATION_PREFIX.to_string())
        .trim()
        .trim_matches('.')
        .to_string();
    if prefix.is_empty() {
        return Err(LoadError::invalid(
            "dns.verification_prefix",
            "must not be empty",
        ));
    }

    let timeout_secs = dns
        .lookup_timeout_seconds
        .unwrap_or(DEFAULT_DNS_LOOKUP_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "dns.lookup_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(DnsSettings {
        verification_prefix: prefix,
        lookup_timeout: Duration::from_secs(timeout_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    trusted_proxies: Option<Vec<String>>,
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

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWebsiteSettings {
    platform_apex_domain: Option<String>,
    preview_ttl_seconds: Option<u64>,
    hash_salt: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFormSettings {
    long_field_chars: Option<u64>,
    long_field_weight: Option<i32>,
    url_weight: Option<i32>,
    quarantine_score: Option<i32>,
    rate_limit_max_submissions: Option<u64>,
    rate_limit_window_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDnsSettings {
    verification_prefix: Option<String>,
    lookup_timeout_seconds: Option<u64>,
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

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
