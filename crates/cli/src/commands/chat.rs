use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::warn;
use wayfarer_core::config::LoadOptions;
use wayfarer_core::domain::session::{PlanningStep, SessionId};
use wayfarer_core::errors::ApplicationError;
use wayfarer_core::flows::{ConversationEngine, TurnRequest};

use crate::commands::{async_runtime, load_config, open_agent, CommandResult, EXIT_RUNTIME};

const PROMPT: &str = "you> ";
const QUIT_WORDS: &[&str] = &["exit", "quit", ":q"];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChatSummary {
    pub conversation_id: Option<SessionId>,
    pub turns: usize,
    pub itinerary_presented: bool,
}

pub fn run(options: &LoadOptions, conversation: Option<String>) -> CommandResult {
    let config = match load_config("chat", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let agent = match open_agent("chat", &config).await {
            Ok(agent) => agent,
            Err(failure) => return failure,
        };

        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        match converse(agent.engine(), conversation.map(SessionId), stdin, &mut stdout).await {
            Ok(summary) => {
                let id = summary
                    .conversation_id
                    .map(|id| id.0)
                    .unwrap_or_else(|| "<none>".to_string());
                CommandResult::success(
                    "chat",
                    format!("conversation {id} ended after {} turns", summary.turns),
                )
            }
            Err(error) => CommandResult::failure("chat", "io", error.to_string(), EXIT_RUNTIME),
        }
    })
}

/// Reads one message per line until end of input or a quit word.
///
/// Turn failures are reported inline and the loop keeps going, except for a
/// completed conversation, which ends it.
pub async fn converse<R, W>(
    engine: &ConversationEngine,
    mut conversation: Option<SessionId>,
    reader: R,
    writer: &mut W,
) -> std::io::Result<ChatSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = ChatSummary { conversation_id: conversation.clone(), ..ChatSummary::default() };
    let mut lines = reader.lines();

    loop {
        writer.write_all(PROMPT.as_bytes()).await?;
        writer.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if QUIT_WORDS.contains(&message.to_ascii_lowercase().as_str()) {
            break;
        }

        let request = TurnRequest::new(message, conversation.clone());
        let correlation_id = request.correlation_id.clone();
        match engine.handle_message(request).await {
            Ok(reply) => {
                summary.turns += 1;
                conversation = Some(reply.session_id.clone());
                summary.conversation_id = conversation.clone();
                if reply.step == PlanningStep::ShowingResults && reply.generated_trip.is_some() {
                    summary.itinerary_presented = true;
                }
                writer.write_all(format!("wayfarer> {}\n", reply.reply).as_bytes()).await?;
            }
            Err(error) => {
                let closed = matches!(error, ApplicationError::SessionClosed(_));
                warn!(
                    event_name = "cli.chat.turn_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "chat turn failed"
                );
                let interface = error.into_interface(correlation_id);
                writer.write_all(format!("wayfarer> {}\n", interface.user_message()).as_bytes()).await?;
                if closed {
                    break;
                }
            }
        }
    }

    writer.flush().await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wayfarer_agent::responder::UNCONFIGURED_REPLY;
    use wayfarer_agent::AgentRuntime;
    use wayfarer_core::config::AppConfig;
    use wayfarer_core::store::InMemoryConversationStore;

    use super::converse;

    #[tokio::test]
    async fn converse_runs_turns_until_quit_word() {
        let agent = AgentRuntime::from_config(
            &AppConfig::default(),
            Arc::new(InMemoryConversationStore::default()),
        )
        .expect("runtime");
        let input: &[u8] = b"A week in Rome\n\nquit\nnever read\n";
        let mut output = Vec::new();

        let summary = converse(agent.engine(), None, input, &mut output).await.expect("converse");

        let transcript = String::from_utf8(output).expect("utf8");
        assert_eq!(summary.turns, 1);
        assert!(summary.conversation_id.is_some());
        assert!(!summary.itinerary_presented);
        assert!(transcript.contains(UNCONFIGURED_REPLY));
        assert!(!transcript.contains("never read"));
    }

    #[tokio::test]
    async fn unknown_conversation_is_reported_inline() {
        let agent = AgentRuntime::from_config(
            &AppConfig::default(),
            Arc::new(InMemoryConversationStore::default()),
        )
        .expect("runtime");
        let input: &[u8] = b"hello\n";
        let mut output = Vec::new();

        let summary = converse(
            agent.engine(),
            Some(wayfarer_core::domain::session::SessionId("trip_planning_missing".to_string())),
            input,
            &mut output,
        )
        .await
        .expect("converse");

        let transcript = String::from_utf8(output).expect("utf8");
        assert_eq!(summary.turns, 0);
        assert!(transcript.contains("The conversation could not be found"));
    }
}
