use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use wayfarer_core::collaborators::{ConversationalResponder, ResponseContext};
use wayfarer_core::domain::criteria::completeness;
use wayfarer_core::domain::session::ChatRole;
use wayfarer_core::flows::states::MIN_HISTORY_BEFORE_GENERATION;

use crate::llm::{ChatMessage, CompletionRequest, LlmClient, LlmError};

pub const FALLBACK_REPLY: &str =
    "I'm experiencing some technical difficulties. Please try rephrasing your travel request.";
pub const UNCONFIGURED_REPLY: &str = "I'm unable to process your request because the language model API key is not configured properly. Please contact the administrator to set up the API key.";

const EARLY_INSTRUCTIONS: &str = r#"DO NOT GENERATE A TRIP YET. Continue gathering information.

Your task: ask ONE specific follow-up question based on what's missing.

Priority order for questions:
1. If no destination: ask where they want to travel
2. If no dates/duration: ask about travel dates or trip length
3. If no travelers: ask how many people are traveling
4. If no budget: ask about budget expectations
5. If no travel style: ask about their travel style/vibe
6. If no activities: ask about interests and activities

Choose the MOST IMPORTANT missing piece and ask ONE clear question about it.
Be friendly and acknowledge what they said, then ask your ONE question."#;

const PRESENT_INSTRUCTIONS: &str = r#"PRESENT THE TRIP ITINERARY. You have enough information and a complete itinerary was generated.

Present the trip plan clearly and explain why it matches their criteria. Highlight the key features and experiences included."#;

/// Writes the assistant's reply. Never fails: model errors produce a static
/// apology.
pub struct LlmConversationalResponder {
    llm: Arc<dyn LlmClient>,
    early_threshold: usize,
}

impl LlmConversationalResponder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, early_threshold: MIN_HISTORY_BEFORE_GENERATION }
    }

    /// Turn count at or below which the responder only asks questions.
    pub fn with_early_threshold(mut self, threshold: usize) -> Self {
        self.early_threshold = threshold;
        self
    }

    pub fn system_prompt(&self, context: &ResponseContext) -> String {
        let criteria_json = serde_json::to_string_pretty(&context.criteria)
            .unwrap_or_else(|_| "{}".to_string());

        let stage = if context.turn_count <= self.early_threshold {
            EARLY_INSTRUCTIONS.to_string()
        } else if let Some(trip) = &context.generated_trip {
            format!(
                "{PRESENT_INSTRUCTIONS}\n\nGenerated itinerary: \"{}\" ({} days, {} activities).\nSummary: {}",
                trip.title,
                trip.days.len(),
                trip.activity_count(),
                trip.summary
            )
        } else {
            continue_instructions(context)
        };

        format!(
            "You are Wayfarer, a helpful AI travel planning assistant. Your role is to ask ONE focused question at a time to understand the user's travel needs.

CRITICAL RULES:
1. ASK ONLY ONE QUESTION. Never ask multiple questions in a single response.
2. BE CONVERSATIONAL. Respond naturally to what the user said, then ask your one question.
3. FOLLOW LOGICAL ORDER. Ask the most important missing information first.
4. NO EARLY TRIP GENERATION. Gather comprehensive information before presenting itineraries.

Current conversation state:
- Message count: {turn_count}
- User's latest message: \"{latest}\"
- Information gathered: {criteria_json}

{stage}

RESPONSE STYLE:
- Acknowledge what the user said first
- Ask only ONE clear, specific question
- Be friendly and conversational
- Keep it concise and focused",
            turn_count = context.turn_count,
            latest = context.latest_message,
        )
    }
}

fn continue_instructions(context: &ResponseContext) -> String {
    let signals = completeness(&context.criteria);
    let missing: Vec<&str> = [
        (!signals.has_destination, "Destination"),
        (!signals.has_dates, "Travel dates or duration"),
        (!signals.has_travelers, "Number of travelers"),
        (!signals.has_budget, "Budget"),
        (!signals.has_style, "Travel style/vibe"),
        (context.criteria.activities.is_empty(), "Interests and activities"),
    ]
    .into_iter()
    .filter_map(|(is_missing, label)| is_missing.then_some(label))
    .collect();

    let listed = if missing.is_empty() {
        "- Nothing essential; confirm any remaining preferences".to_string()
    } else {
        missing.iter().map(|label| format!("- {label}")).collect::<Vec<_>>().join("\n")
    };

    format!(
        "CONTINUE GATHERING INFO. Ask ONE more specific question to get the remaining details needed.\n\nMissing information:\n{listed}\n\nPick the MOST IMPORTANT missing piece and ask ONE question about it."
    )
}

fn conversation_messages(context: &ResponseContext) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = context
        .history
        .iter()
        .map(|turn| match turn.role {
            ChatRole::User => ChatMessage::user(turn.content.clone()),
            ChatRole::Assistant => ChatMessage::assistant(turn.content.clone()),
        })
        .collect();

    let latest_recorded = context
        .history
        .last()
        .is_some_and(|turn| turn.role == ChatRole::User && turn.content == context.latest_message);
    if !latest_recorded {
        messages.push(ChatMessage::user(context.latest_message.clone()));
    }
    messages
}

#[async_trait]
impl ConversationalResponder for LlmConversationalResponder {
    async fn respond(&self, context: ResponseContext) -> String {
        let request = CompletionRequest::new(self.system_prompt(&context), conversation_messages(&context))
            .with_temperature(0.7)
            .with_max_tokens(800);

        match self.llm.complete(request).await {
            Ok(reply) => reply.trim().to_string(),
            Err(LlmError::NotConfigured(reason)) => {
                warn!(event_name = "responder.unconfigured", reason = %reason, "reply generation skipped");
                UNCONFIGURED_REPLY.to_string()
            }
            Err(error) => {
                warn!(event_name = "responder.failed", error = %error, "reply generation failed");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
