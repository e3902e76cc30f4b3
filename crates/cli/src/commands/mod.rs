pub mod ask;
pub mod chat;
pub mod close;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod queries;
pub mod search;
pub mod trips;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use wayfarer_agent::AgentRuntime;
use wayfarer_core::config::{AppConfig, LoadOptions};
use wayfarer_core::errors::{ApplicationError, InterfaceError};
use wayfarer_core::flows::TurnReply;
use wayfarer_db::{connect_with_config, migrations, DbPool, SqlConversationStore};

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DATABASE: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_INVALID_INPUT: u8 = 6;
pub const EXIT_NOT_FOUND: u8 = 7;
pub const EXIT_UNAVAILABLE: u8 = 8;
pub const EXIT_INTERNAL: u8 = 9;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Value) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps an engine error onto its caller-facing class and exit code.
    pub fn from_application(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
    ) -> Self {
        let detail = error.to_string();
        let interface = error.into_interface(correlation_id);
        let (class, exit_code) = match &interface {
            InterfaceError::BadRequest { .. } => ("bad_request", EXIT_INVALID_INPUT),
            InterfaceError::NotFound { .. } => ("not_found", EXIT_NOT_FOUND),
            InterfaceError::ServiceUnavailable { .. } => ("service_unavailable", EXIT_UNAVAILABLE),
            InterfaceError::Internal { .. } => ("internal", EXIT_INTERNAL),
        };
        Self::failure(
            command,
            class,
            format!("{} ({detail}; correlation id {correlation_id})", interface.user_message()),
            exit_code,
        )
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, options: &LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.clone()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })
}

pub(crate) fn async_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            EXIT_RUNTIME,
        )
    })
}

/// Connects and brings the schema up to date.
pub(crate) async fn open_database(command: &str, config: &AppConfig) -> Result<DbPool, CommandResult> {
    let pool = connect_with_config(&config.database).await.map_err(|error| {
        CommandResult::failure(command, "db_connectivity", error.to_string(), EXIT_DATABASE)
    })?;
    migrations::run_pending(&pool).await.map_err(|error| {
        CommandResult::failure(command, "migration", error.to_string(), EXIT_MIGRATION)
    })?;
    Ok(pool)
}

pub(crate) async fn open_agent(
    command: &str,
    config: &AppConfig,
) -> Result<AgentRuntime, CommandResult> {
    let pool = open_database(command, config).await?;
    let store = Arc::new(SqlConversationStore::new(pool));
    AgentRuntime::from_config(config, store).map_err(|error| {
        CommandResult::failure(command, "runtime_build", format!("{error:#}"), EXIT_INTERNAL)
    })
}

pub(crate) fn turn_payload(reply: &TurnReply) -> Value {
    json!({
        "reply": reply.reply,
        "conversation_id": reply.session_id.0,
        "step": reply.step.as_str(),
        "criteria": reply.criteria,
        "suggested_question": reply.suggested_question,
        "generated_trip": reply.generated_trip,
    })
}

pub(crate) fn to_value(command: &str, value: &impl Serialize) -> Result<Value, CommandResult> {
    serde_json::to_value(value).map_err(|error| {
        CommandResult::failure(command, "serialization", error.to_string(), EXIT_INTERNAL)
    })
}
