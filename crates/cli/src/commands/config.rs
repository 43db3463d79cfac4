use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use coverquote_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use toml::Value;

use crate::commands::{CommandResult, ErrorClass};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: String,
    pub source: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                ErrorClass::ConfigValidation,
                format!("config validation failed: {error}"),
            )
        }
    };

    let path = detect_config_path();
    let document = load_config_file_doc(path.as_deref());
    let entries = effective_entries(&config, document.as_ref(), path.as_deref());

    CommandResult::success_with(
        "config",
        "effective config (source precedence: env > file > default)",
        Some(entries),
    )
}

/// Every effective setting with its origin. Secrets never leave this function unredacted.
pub fn effective_entries(
    config: &AppConfig,
    document: Option<&Value>,
    path: Option<&Path>,
) -> Vec<ConfigEntry> {
    let rows = vec![
        row(
            "database.url",
            &["COVERQUOTE_DATABASE_URL"],
            redact_url_credentials(&config.database.url),
        ),
        row(
            "database.max_connections",
            &["COVERQUOTE_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        row(
            "database.timeout_secs",
            &["COVERQUOTE_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        row(
            "runtime.environment",
            &["COVERQUOTE_RUNTIME_ENVIRONMENT", "COVERQUOTE_ENV"],
            config.runtime.environment.as_str().to_string(),
        ),
        row(
            "runtime.house_agency_location_id",
            &["COVERQUOTE_RUNTIME_HOUSE_AGENCY_LOCATION_ID"],
            config.runtime.house_agency_location_id.0.to_string(),
        ),
        row(
            "services.question_catalog_url",
            &["COVERQUOTE_SERVICES_QUESTION_CATALOG_URL"],
            config.services.question_catalog_url.clone(),
        ),
        row(
            "services.encryption_url",
            &["COVERQUOTE_SERVICES_ENCRYPTION_URL"],
            config.services.encryption_url.clone(),
        ),
        row(
            "services.request_timeout_secs",
            &["COVERQUOTE_SERVICES_REQUEST_TIMEOUT_SECS"],
            config.services.request_timeout_secs.to_string(),
        ),
        row("email.api_url", &["COVERQUOTE_EMAIL_API_URL"], config.email.api_url.clone()),
        row(
            "email.api_key",
            &["COVERQUOTE_EMAIL_API_KEY"],
            redact_secret(config.email.api_key.as_ref()),
        ),
        row(
            "email.from_address",
            &["COVERQUOTE_EMAIL_FROM_ADDRESS"],
            config.email.from_address.clone(),
        ),
        row("email.brand", &["COVERQUOTE_EMAIL_BRAND"], config.email.brand.clone()),
        row(
            "slack.webhook_url",
            &["COVERQUOTE_SLACK_WEBHOOK_URL"],
            redact_webhook(config.slack.webhook_url.as_ref()),
        ),
        row("slack.channel", &["COVERQUOTE_SLACK_CHANNEL"], config.slack.channel.clone()),
        row(
            "slack.bind_channel",
            &["COVERQUOTE_SLACK_BIND_CHANNEL"],
            config.slack.bind_channel.clone(),
        ),
        row(
            "server.bind_address",
            &["COVERQUOTE_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        row("server.port", &["COVERQUOTE_SERVER_PORT"], config.server.port.to_string()),
        row(
            "server.graceful_shutdown_secs",
            &["COVERQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        row(
            "logging.level",
            &["COVERQUOTE_LOGGING_LEVEL", "COVERQUOTE_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        row(
            "logging.format",
            &["COVERQUOTE_LOGGING_FORMAT", "COVERQUOTE_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
        ),
    ];

    rows.into_iter()
        .map(|(key, env_keys, value)| ConfigEntry {
            key,
            value,
            source: field_source(key, env_keys, document, path),
        })
        .collect()
}

fn row(
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
) -> (&'static str, &'static [&'static str], String) {
    (key, env_keys, value)
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("coverquote.toml"), PathBuf::from("config/coverquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    document: Option<&Value>,
    path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if document.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        Some(value) if !value.expose_secret().trim().is_empty() => "<redacted>".to_string(),
        Some(_) => "<empty>".to_string(),
        None => "<unset>".to_string(),
    }
}

/// Keeps scheme and host so operators can tell which workspace a webhook targets.
fn redact_webhook(secret: Option<&SecretString>) -> String {
    let Some(url) = secret.map(|value| value.expose_secret().trim().to_string()) else {
        return "<unset>".to_string();
    };
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or_default();
            format!("{scheme}://{host}/***")
        }
        None => "<redacted>".to_string(),
    }
}

fn redact_url_credentials(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => url.to_string(),
    }
}
