pub mod config;
pub mod doctor;
pub mod migrate;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Failure classes shared by every command; each maps to a stable process exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    ConfigValidation,
    RuntimeInit,
    DbConnectivity,
    Migration,
    Readiness,
}

impl ErrorClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::RuntimeInit => 3,
            Self::DbConnectivity => 4,
            Self::Migration => 5,
            Self::Readiness => 6,
        }
    }
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a, T: Serialize> {
    command: &'a str,
    status: &'static str,
    error_class: Option<ErrorClass>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<T>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, message, None::<()>)
    }

    pub fn success_with<T: Serialize>(
        command: &str,
        message: impl Into<String>,
        details: Option<T>,
    ) -> Self {
        let payload = CommandOutcome {
            command,
            status: "ok",
            error_class: None,
            message: message.into(),
            details,
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(command: &str, error_class: ErrorClass, message: impl Into<String>) -> Self {
        Self::failure_with(command, error_class, message, None::<()>)
    }

    pub fn failure_with<T: Serialize>(
        command: &str,
        error_class: ErrorClass,
        message: impl Into<String>,
        details: Option<T>,
    ) -> Self {
        let payload = CommandOutcome {
            command,
            status: "error",
            error_class: Some(error_class),
            message: message.into(),
            details,
        };
        Self { exit_code: error_class.exit_code(), output: serialize_payload(&payload) }
    }
}

pub(crate) fn current_thread_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            ErrorClass::RuntimeInit,
            format!("failed to initialize async runtime: {error}"),
        )
    })
}

fn serialize_payload<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
