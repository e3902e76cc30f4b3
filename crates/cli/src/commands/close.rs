use serde_json::json;
use wayfarer_core::config::LoadOptions;
use wayfarer_core::domain::session::SessionId;

use crate::commands::{async_runtime, load_config, open_agent, CommandResult};

pub fn run(options: &LoadOptions, conversation: &str) -> CommandResult {
    let config = match load_config("close", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("close") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let agent = match open_agent("close", &config).await {
            Ok(agent) => agent,
            Err(failure) => return failure,
        };

        let correlation_id = uuid::Uuid::new_v4().to_string();
        let id = SessionId(conversation.to_string());
        match agent.engine().close(&id, &correlation_id).await {
            Ok(session) => CommandResult::success_with_data(
                "close",
                format!("conversation {} completed", session.id),
                json!({
                    "conversation_id": session.id.0,
                    "step": session.current_step.as_str(),
                    "turns": session.turn_count(),
                }),
            ),
            Err(error) => CommandResult::from_application("close", error, &correlation_id),
        }
    })
}
