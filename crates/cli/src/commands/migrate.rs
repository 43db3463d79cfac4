use coverquote_core::config::{AppConfig, LoadOptions};
use coverquote_db::{connect, migrations};

use crate::commands::{current_thread_runtime, CommandResult, ErrorClass};

pub fn run() -> CommandResult {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => run_with_config(&config),
        Err(error) => CommandResult::failure(
            "migrate",
            ErrorClass::ConfigValidation,
            format!("configuration issue: {error}"),
        ),
    }
}

pub fn run_with_config(config: &AppConfig) -> CommandResult {
    let runtime = match current_thread_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| (ErrorClass::DbConnectivity, error.to_string()))?;

        let pending = migrations::pending_versions(&pool)
            .await
            .map_err(|error| (ErrorClass::Migration, error.to_string()))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| (ErrorClass::Migration, error.to_string()))?;
        pool.close().await;
        Ok::<Vec<i64>, (ErrorClass, String)>(pending)
    });

    match result {
        Ok(applied) if applied.is_empty() => {
            CommandResult::success("migrate", "schema already up to date")
        }
        Ok(applied) => CommandResult::success_with(
            "migrate",
            format!("applied {} pending migration(s)", applied.len()),
            Some(applied),
        ),
        Err((error_class, message)) => CommandResult::failure("migrate", error_class, message),
    }
}
