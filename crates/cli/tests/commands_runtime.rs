use std::env;
use std::sync::{Mutex, OnceLock};

use coverquote_cli::commands::{config, doctor, migrate};
use serde_json::Value;

#[test]
fn migrate_applies_schema_to_fresh_database() {
    with_env(
        &[
            ("COVERQUOTE_DATABASE_URL", "sqlite::memory:"),
            ("COVERQUOTE_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
            assert_eq!(payload["details"], serde_json::json!([1]));
        },
    );
}

#[test]
fn migrate_returns_config_failure_for_invalid_override() {
    with_env(&[("COVERQUOTE_SERVER_PORT", "not-a-port")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_reports_unreachable_database() {
    with_env(&[("COVERQUOTE_DATABASE_URL", "sqlite:///definitely/missing/coverquote.db")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "db_connectivity");
    });
}

#[test]
fn config_attributes_env_sources_and_redacts_secrets() {
    with_env(
        &[
            ("COVERQUOTE_SLACK_CHANNEL", "#ops"),
            ("COVERQUOTE_SLACK_WEBHOOK_URL", "https://hooks.slack.com/services/T0/B0/topsecret"),
            ("COVERQUOTE_EMAIL_API_KEY", "sg-topsecret"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            assert!(!result.output.contains("topsecret"));

            let payload = parse_payload(&result.output);
            let entries = payload["details"].as_array().expect("entries");
            let channel = entries
                .iter()
                .find(|entry| entry["key"] == "slack.channel")
                .expect("slack.channel entry");
            assert_eq!(channel["value"], "#ops");
            assert_eq!(channel["source"], "env (COVERQUOTE_SLACK_CHANNEL)");
        },
    );
}

#[test]
fn config_fails_for_production_without_notification_settings() {
    with_env(&[("COVERQUOTE_ENV", "production")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_json_flags_unmigrated_database() {
    with_env(&[("COVERQUOTE_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().expect("checks");
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "pass");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "COVERQUOTE_DATABASE_URL",
        "COVERQUOTE_DATABASE_MAX_CONNECTIONS",
        "COVERQUOTE_DATABASE_TIMEOUT_SECS",
        "COVERQUOTE_ENV",
        "COVERQUOTE_RUNTIME_ENVIRONMENT",
        "COVERQUOTE_RUNTIME_HOUSE_AGENCY_LOCATION_ID",
        "COVERQUOTE_SERVICES_QUESTION_CATALOG_URL",
        "COVERQUOTE_SERVICES_ENCRYPTION_URL",
        "COVERQUOTE_EMAIL_API_URL",
        "COVERQUOTE_EMAIL_API_KEY",
        "COVERQUOTE_SLACK_WEBHOOK_URL",
        "COVERQUOTE_SLACK_CHANNEL",
        "COVERQUOTE_SLACK_BIND_CHANNEL",
        "COVERQUOTE_SERVER_BIND_ADDRESS",
        "COVERQUOTE_SERVER_PORT",
        "COVERQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "COVERQUOTE_LOGGING_LEVEL",
        "COVERQUOTE_LOGGING_FORMAT",
        "COVERQUOTE_LOG_LEVEL",
        "COVERQUOTE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
