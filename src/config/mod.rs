//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::fetch::{DEFAULT_PER_PAGE, FetchOptions, PollPolicy};
use crate::application::pagination::DEFAULT_MAX_RECORDS;
use crate::application::syndication::{
    DEFAULT_ITEM_LIMIT, DEFAULT_SITE_URL, DEFAULT_TTL_MINUTES, FeedFormat, FeedOptions,
};
use crate::cache::CacheConfig;
use crate::domain::VariantPolicy;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "ghactivity";
const ENV_PREFIX: &str = "GHACTIVITY";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api.github.com";
const DEFAULT_USER_AGENT: &str = concat!("ghactivity/", env!("CARGO_PKG_VERSION"));
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const MAX_PER_PAGE: u32 = 100;
const DEFAULT_BODY_TTL_SECS: u64 = 300;
const DEFAULT_TOKEN_TTL_SECS: u64 = 1800;
const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_CACHE_CAPACITY: usize = 1024;
const DEFAULT_POLL_MIN_SECS: u64 = 15;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Command-line arguments for the ghactivity binary.
#[derive(Debug, Parser)]
#[command(
    name = "ghactivity",
    version,
    about = "GitHub public activity as RSS and Atom feeds"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "GHACTIVITY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve feeds over HTTP.
    Serve(Box<ServeArgs>),
    /// Fetch one subject's activity and print the feed to stdout.
    Feed(FeedArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct FeedArgs {
    /// GitHub login whose public activity is rendered.
    #[arg(value_name = "USER")]
    pub subject: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = FeedFormatArg::Rss)]
    pub format: FeedFormatArg,

    /// Number of upstream pages to merge.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,

    /// Comma-separated event types to keep, e.g. `PushEvent,IssuesEvent`.
    #[arg(long = "type", value_name = "TYPES")]
    pub types: Option<String>,

    #[command(flatten)]
    pub overrides: CommonOverrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FeedFormatArg {
    Rss,
    Atom,
}

impl From<FeedFormatArg> for FeedFormat {
    fn from(value: FeedFormatArg) -> Self {
        match value {
            FeedFormatArg::Rss => FeedFormat::Rss,
            FeedFormatArg::Atom => FeedFormat::Atom,
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    #[command(flatten)]
    pub common: CommonOverrides,
}

/// Overrides accepted by every subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Force JSON logs (true/false).
    #[arg(long = "log-json", value_parser = BoolishValueParser::new(), value_name = "BOOL")]
    pub log_json: Option<bool>,

    /// Override the upstream API base URL.
    #[arg(long = "upstream-base-url", value_name = "URL")]
    pub upstream_base_url: Option<String>,

    /// Override the upstream API token.
    #[arg(long = "upstream-token", value_name = "TOKEN")]
    pub upstream_token: Option<String>,

    /// Override the upstream request timeout.
    #[arg(long = "upstream-timeout-seconds", value_name = "SECONDS")]
    pub upstream_timeout_seconds: Option<u64>,

    /// Override how long cached event bodies stay fresh.
    #[arg(long = "cache-body-ttl-seconds", value_name = "SECONDS")]
    pub cache_body_ttl_seconds: Option<u64>,

    /// Override how long revalidation tokens are kept.
    #[arg(long = "cache-token-ttl-seconds", value_name = "SECONDS")]
    pub cache_token_ttl_seconds: Option<u64>,

    /// Override the site URL used in feed links.
    #[arg(long = "feed-site-url", value_name = "URL")]
    pub feed_site_url: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub upstream: UpstreamSettings,
    pub cache: CacheSettings,
    pub feed: FeedSettings,
    pub poll: PollSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
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
pub struct UpstreamSettings {
    /// Validated absolute `http(s)` URL.
    pub base_url: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
    pub per_page: u32,
    pub max_records: u32,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            per_page: DEFAULT_PER_PAGE,
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub body_ttl_seconds: u64,
    pub token_ttl_seconds: u64,
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub site_url: String,
    pub item_limit: usize,
    pub ttl_minutes: u32,
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub min_interval_seconds: u64,
    pub default_interval_seconds: u64,
}

impl Settings {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            per_page: self.upstream.per_page,
            timeout: self.upstream.timeout,
            poll: PollPolicy {
                min_seconds: self.poll.min_interval_seconds,
                default_seconds: self.poll.default_interval_seconds,
            },
            variant_policy: VariantPolicy::Strict,
            cache: CacheConfig::from(&self.cache),
        }
    }

    pub fn feed_options(&self) -> FeedOptions {
        FeedOptions {
            site_url: self.feed.site_url.clone(),
            item_limit: self.feed.item_limit,
            ttl_minutes: self.feed.ttl_minutes,
        }
    }
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Feed(args)) => raw.apply_common_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    upstream: RawUpstreamSettings,
    cache: RawCacheSettings,
    feed: RawFeedSettings,
    poll: RawPollSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }

        self.apply_common_overrides(&overrides.common);
    }

    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.upstream_base_url.as_ref() {
            self.upstream.base_url = Some(url.clone());
        }
        if let Some(token) = overrides.upstream_token.as_ref() {
            self.upstream.token = Some(token.clone());
        }
        if let Some(seconds) = overrides.upstream_timeout_seconds {
            self.upstream.timeout_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_body_ttl_seconds {
            self.cache.body_ttl_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_token_ttl_seconds {
            self.cache.token_ttl_seconds = Some(seconds);
        }
        if let Some(url) = overrides.feed_site_url.as_ref() {
            self.feed.site_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            upstream,
            cache,
            feed,
            poll,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            upstream: build_upstream_settings(upstream)?,
            cache: build_cache_settings(cache)?,
            feed: build_feed_settings(feed)?,
            poll: build_poll_settings(poll)?,
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

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
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

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let base_url = upstream
        .base_url
        .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string());
    let base_url = parse_http_url(&base_url)
        .map_err(|reason| LoadError::invalid("upstream.base_url", reason))?;

    let token = non_blank(upstream.token);

    let user_agent = non_blank(upstream.user_agent).unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    let timeout_secs = upstream
        .timeout_seconds
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "upstream.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let per_page = upstream.per_page.unwrap_or(DEFAULT_PER_PAGE);
    if !(1..=MAX_PER_PAGE).contains(&per_page) {
        return Err(LoadError::invalid(
            "upstream.per_page",
            format!("must be between 1 and {MAX_PER_PAGE}"),
        ));
    }

    let max_records = upstream.max_records.unwrap_or(DEFAULT_MAX_RECORDS);
    if max_records == 0 {
        return Err(LoadError::invalid(
            "upstream.max_records",
            "must be greater than zero",
        ));
    }

    Ok(UpstreamSettings {
        base_url,
        token,
        user_agent,
        timeout: Duration::from_secs(timeout_secs),
        per_page,
        max_records,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let body_ttl_seconds = cache.body_ttl_seconds.unwrap_or(DEFAULT_BODY_TTL_SECS);
    if body_ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.body_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let token_ttl_seconds = cache.token_ttl_seconds.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
    if token_ttl_seconds < body_ttl_seconds {
        return Err(LoadError::invalid(
            "cache.token_ttl_seconds",
            format!("must be at least cache.body_ttl_seconds ({body_ttl_seconds})"),
        ));
    }

    if token_ttl_seconds > MAX_CACHE_TTL_SECS {
        return Err(LoadError::invalid(
            "cache.token_ttl_seconds",
            format!("must not exceed {MAX_CACHE_TTL_SECS} seconds"),
        ));
    }

    let capacity = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
    if capacity == 0 {
        return Err(LoadError::invalid(
            "cache.capacity",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        body_ttl_seconds,
        token_ttl_seconds,
        capacity,
    })
}

fn build_feed_settings(feed: RawFeedSettings) -> Result<FeedSettings, LoadError> {
    let site_url = feed.site_url.unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
    let site_url = parse_http_url(&site_url)
        .map_err(|reason| LoadError::invalid("feed.site_url", reason))?;

    let item_limit = feed.item_limit.unwrap_or(DEFAULT_ITEM_LIMIT);
    if item_limit == 0 {
        return Err(LoadError::invalid(
            "feed.item_limit",
            "must be greater than zero",
        ));
    }

    let ttl_minutes = feed.ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES);
    if ttl_minutes == 0 {
        return Err(LoadError::invalid(
            "feed.ttl_minutes",
            "must be greater than zero",
        ));
    }

    Ok(FeedSettings {
        site_url: site_url.trim_end_matches('/').to_string(),
        item_limit,
        ttl_minutes,
    })
}

fn build_poll_settings(poll: RawPollSettings) -> Result<PollSettings, LoadError> {
    let min_interval_seconds = poll.min_interval_seconds.unwrap_or(DEFAULT_POLL_MIN_SECS);
    if min_interval_seconds == 0 {
        return Err(LoadError::invalid(
            "poll.min_interval_seconds",
            "must be greater than zero",
        ));
    }

    let default_interval_seconds = poll
        .default_interval_seconds
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
    if default_interval_seconds < min_interval_seconds {
        return Err(LoadError::invalid(
            "poll.default_interval_seconds",
            format!("must be at least poll.min_interval_seconds ({min_interval_seconds})"),
        ));
    }

    Ok(PollSettings {
        min_interval_seconds,
        default_interval_seconds,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    base_url: Option<String>,
    token: Option<String>,
    user_agent: Option<String>,
    timeout_seconds: Option<u64>,
    per_page: Option<u32>,
    max_records: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    body_ttl_seconds: Option<u64>,
    token_ttl_seconds: Option<u64>,
    capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFeedSettings {
    site_url: Option<String>,
    item_limit: Option<usize>,
    ttl_minutes: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPollSettings {
    min_interval_seconds: Option<u64>,
    default_interval_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_http_url(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    let url = Url::parse(trimmed).map_err(|err| format!("invalid URL `{trimmed}`: {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(format!("unsupported scheme `{other}`")),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
