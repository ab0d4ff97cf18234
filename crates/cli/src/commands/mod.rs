pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use std::future::Future;

use serde::Serialize;
use yesfree_core::config::{AppConfig, LoadOptions};
use yesfree_db::{connect_with_settings, DbPool};

/// Failure classes the operator commands can report. Each class owns its
/// exit code; wrapper scripts branch on the number, so the mapping is
/// part of the CLI contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    ConfigValidation,
    RuntimeInit,
    DbConnectivity,
    Migration,
    SeedExecution,
    SeedVerification,
}

impl ErrorClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::RuntimeInit => 3,
            Self::DbConnectivity => 4,
            Self::Migration | Self::SeedExecution => 5,
            Self::SeedVerification => 6,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CommandError {
    pub class: ErrorClass,
    pub message: String,
}

impl CommandError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self { class, message: message.into() }
    }
}

#[derive(Clone, Debug)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            exit_code: 0,
            output: render(StatusPayload {
                command,
                status: "ok",
                error_class: None,
                message: &message,
            }),
        }
    }

    pub fn failure(command: &str, error: CommandError) -> Self {
        Self {
            exit_code: error.class.exit_code(),
            output: render(StatusPayload {
                command,
                status: "error",
                error_class: Some(error.class),
                message: &error.message,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusPayload<'a> {
    command: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<ErrorClass>,
    message: &'a str,
}

fn render(payload: StatusPayload<'_>) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            r#"{{"command":"{}","status":"error","error_class":"serialization","message":"{}"}}"#,
            payload.command,
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Shared plumbing for commands that need the database: load config,
/// stand up a single-thread runtime, connect, and hand the pool to the
/// async body. The pool is closed on both exits.
pub(crate) fn with_pool<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(DbPool) -> Fut,
    Fut: Future<Output = Result<String, CommandError>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                CommandError::new(
                    ErrorClass::ConfigValidation,
                    format!("configuration issue: {error}"),
                ),
            )
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                CommandError::new(
                    ErrorClass::RuntimeInit,
                    format!("failed to initialize async runtime: {error}"),
                ),
            )
        }
    };

    let outcome = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| CommandError::new(ErrorClass::DbConnectivity, error.to_string()))?;

        let result = body(pool.clone()).await;
        pool.close().await;
        result
    });

    match outcome {
        Ok(message) => CommandResult::success(command, message),
        Err(error) => CommandResult::failure(command, error),
    }
}
