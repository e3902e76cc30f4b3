use wayfarer_core::config::LoadOptions;
use wayfarer_core::domain::session::SessionId;
use wayfarer_core::flows::TurnRequest;

use crate::commands::{async_runtime, load_config, open_agent, turn_payload, CommandResult};

pub fn run(options: &LoadOptions, message: &str, conversation: Option<String>) -> CommandResult {
    let config = match load_config("ask", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("ask") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let agent = match open_agent("ask", &config).await {
            Ok(agent) => agent,
            Err(failure) => return failure,
        };

        let request = TurnRequest::new(message, conversation.map(SessionId));
        let correlation_id = request.correlation_id.clone();
        match agent.engine().handle_message(request).await {
            Ok(reply) => {
                CommandResult::success_with_data("ask", reply.reply.clone(), turn_payload(&reply))
            }
            Err(error) => CommandResult::from_application("ask", error, &correlation_id),
        }
    })
}
