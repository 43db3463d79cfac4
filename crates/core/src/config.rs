use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ids::AgencyLocationId;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub runtime: RuntimeConfig,
    pub services: ServicesConfig,
    pub email: EmailConfig,
    pub slack: SlackConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub environment: Environment,
    pub house_agency_location_id: AgencyLocationId,
}

#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub question_catalog_url: String,
    pub encryption_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub from_address: String,
    pub brand: String,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub webhook_url: Option<SecretString>,
    pub channel: String,
    pub bind_channel: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    Demo,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Demo => "demo",
            Self::Production => "production",
        }
    }

    /// Only these environments send notifications and use live insurer credentials.
    pub fn is_production_like(&self) -> bool {
        matches!(self, Self::Production | Self::Demo)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub environment: Option<Environment>,
    pub server_port: Option<u16>,
    pub slack_webhook_url: Option<String>,
    pub email_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://coverquote.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            runtime: RuntimeConfig {
                environment: Environment::Development,
                house_agency_location_id: AgencyLocationId(1),
            },
            services: ServicesConfig {
                question_catalog_url: "http://localhost:4010".to_string(),
                encryption_url: "http://localhost:4020".to_string(),
                request_timeout_secs: 20,
            },
            email: EmailConfig {
                api_url: "http://localhost:4030".to_string(),
                api_key: None,
                from_address: "no-reply@coverquote.local".to_string(),
                brand: "coverquote".to_string(),
            },
            slack: SlackConfig {
                webhook_url: None,
                channel: "#alerts".to_string(),
                bind_channel: "#bound".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "demo" => Ok(Self::Demo),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::Validation(format!(
                "unsupported environment `{other}` (expected development|staging|demo|production)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("coverquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(runtime) = patch.runtime {
            if let Some(environment) = runtime.environment {
                self.runtime.environment = environment;
            }
            if let Some(house_agency_location_id) = runtime.house_agency_location_id {
                self.runtime.house_agency_location_id = AgencyLocationId(house_agency_location_id);
            }
        }

        if let Some(services) = patch.services {
            if let Some(question_catalog_url) = services.question_catalog_url {
                self.services.question_catalog_url = question_catalog_url;
            }
            if let Some(encryption_url) = services.encryption_url {
                self.services.encryption_url = encryption_url;
            }
            if let Some(request_timeout_secs) = services.request_timeout_secs {
                self.services.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(email) = patch.email {
            if let Some(api_url) = email.api_url {
                self.email.api_url = api_url;
            }
            if let Some(email_api_key_value) = email.api_key {
                self.email.api_key = Some(secret_value(email_api_key_value));
            }
            if let Some(from_address) = email.from_address {
                self.email.from_address = from_address;
            }
            if let Some(brand) = email.brand {
                self.email.brand = brand;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(webhook_url_value) = slack.webhook_url {
                self.slack.webhook_url = Some(secret_value(webhook_url_value));
            }
            if let Some(channel) = slack.channel {
                self.slack.channel = channel;
            }
            if let Some(bind_channel) = slack.bind_channel {
                self.slack.bind_channel = bind_channel;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COVERQUOTE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("COVERQUOTE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("COVERQUOTE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COVERQUOTE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("COVERQUOTE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let environment =
            read_env("COVERQUOTE_RUNTIME_ENVIRONMENT").or_else(|| read_env("COVERQUOTE_ENV"));
        if let Some(value) = environment {
            self.runtime.environment = value.parse()?;
        }
        if let Some(value) = read_env("COVERQUOTE_RUNTIME_HOUSE_AGENCY_LOCATION_ID") {
            self.runtime.house_agency_location_id = AgencyLocationId(parse_u64(
                "COVERQUOTE_RUNTIME_HOUSE_AGENCY_LOCATION_ID",
                &value,
            )?);
        }

        if let Some(value) = read_env("COVERQUOTE_SERVICES_QUESTION_CATALOG_URL") {
            self.services.question_catalog_url = value;
        }
        if let Some(value) = read_env("COVERQUOTE_SERVICES_ENCRYPTION_URL") {
            self.services.encryption_url = value;
        }
        if let Some(value) = read_env("COVERQUOTE_SERVICES_REQUEST_TIMEOUT_SECS") {
            self.services.request_timeout_secs =
                parse_u64("COVERQUOTE_SERVICES_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COVERQUOTE_EMAIL_API_URL") {
            self.email.api_url = value;
        }
        if let Some(value) = read_env("COVERQUOTE_EMAIL_API_KEY") {
            self.email.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("COVERQUOTE_EMAIL_FROM_ADDRESS") {
            self.email.from_address = value;
        }
        if let Some(value) = read_env("COVERQUOTE_EMAIL_BRAND") {
            self.email.brand = value;
        }

        if let Some(value) = read_env("COVERQUOTE_SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = Some(secret_value(value));
        }
        if let Some(value) = read_env("COVERQUOTE_SLACK_CHANNEL") {
            self.slack.channel = value;
        }
        if let Some(value) = read_env("COVERQUOTE_SLACK_BIND_CHANNEL") {
            self.slack.bind_channel = value;
        }

        if let Some(value) = read_env("COVERQUOTE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("COVERQUOTE_SERVER_PORT") {
            self.server.port = parse_u16("COVERQUOTE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("COVERQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("COVERQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("COVERQUOTE_LOGGING_LEVEL").or_else(|| read_env("COVERQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COVERQUOTE_LOGGING_FORMAT").or_else(|| read_env("COVERQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(environment) = overrides.environment {
            self.runtime.environment = environment;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(slack_webhook_url) = overrides.slack_webhook_url {
            self.slack.webhook_url = Some(secret_value(slack_webhook_url));
        }
        if let Some(email_api_key) = overrides.email_api_key {
            self.email.api_key = Some(secret_value(email_api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_runtime(&self.runtime)?;
        validate_services(&self.services)?;
        validate_email(&self.email, self.runtime.environment)?;
        validate_slack(&self.slack, self.runtime.environment)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("coverquote.toml"), PathBuf::from("config/coverquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_runtime(runtime: &RuntimeConfig) -> Result<(), ConfigError> {
    if runtime.house_agency_location_id.0 == 0 {
        return Err(ConfigError::Validation(
            "runtime.house_agency_location_id must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_services(services: &ServicesConfig) -> Result<(), ConfigError> {
    if !is_http_url(services.question_catalog_url.trim()) {
        return Err(ConfigError::Validation(
            "services.question_catalog_url must start with http:// or https://".to_string(),
        ));
    }
    if !is_http_url(services.encryption_url.trim()) {
        return Err(ConfigError::Validation(
            "services.encryption_url must start with http:// or https://".to_string(),
        ));
    }
    if services.request_timeout_secs == 0 || services.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "services.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &EmailConfig, environment: Environment) -> Result<(), ConfigError> {
    if !is_http_url(email.api_url.trim()) {
        return Err(ConfigError::Validation(
            "email.api_url must start with http:// or https://".to_string(),
        ));
    }
    if !email.from_address.contains('@') {
        return Err(ConfigError::Validation(
            "email.from_address must be an email address".to_string(),
        ));
    }

    let missing_key =
        email.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if environment.is_production_like() && missing_key {
        return Err(ConfigError::Validation(format!(
            "email.api_key is required when runtime.environment is {}",
            environment.as_str()
        )));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig, environment: Environment) -> Result<(), ConfigError> {
    match slack.webhook_url.as_ref().map(|value| value.expose_secret().trim().to_string()) {
        Some(url) if !url.starts_with("https://") => {
            return Err(ConfigError::Validation(
                "slack.webhook_url must start with https://".to_string(),
            ));
        }
        None if environment.is_production_like() => {
            return Err(ConfigError::Validation(format!(
                "slack.webhook_url is required when runtime.environment is {}",
                environment.as_str()
            )));
        }
        _ => {}
    }

    if !slack.channel.starts_with('#') || !slack.bind_channel.starts_with('#') {
        return Err(ConfigError::Validation(
            "slack.channel and slack.bind_channel must start with `#`".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    runtime: Option<RuntimePatch>,
    services: Option<ServicesPatch>,
    email: Option<EmailPatch>,
    slack: Option<SlackPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RuntimePatch {
    environment: Option<Environment>,
    house_agency_location_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServicesPatch {
    question_catalog_url: Option<String>,
    encryption_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPatch {
    api_url: Option<String>,
    api_key: Option<String>,
    from_address: Option<String>,
    brand: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    webhook_url: Option<String>,
    channel: Option<String>,
    bind_channel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
