//! Language-model and search adapters for the planning core.
//!
//! Each adapter implements one collaborator contract from `wayfarer-core`:
//! - `extractor` turns a message into criteria (`CriteriaExtractor`)
//! - `drafter` writes the day-by-day itinerary (`ItineraryDrafter`)
//! - `responder` writes the assistant reply (`ConversationalResponder`)
//! - `search` queries the trusted travel providers (`DocumentSearch`)
//!
//! The model never decides when a trip is generated. That gate lives in the
//! core state machine; the adapters only translate.

pub mod drafter;
pub mod extractor;
pub mod llm;
pub mod responder;
pub mod runtime;
pub mod search;

#[cfg(test)]
mod testing;

pub use drafter::LlmItineraryDrafter;
pub use extractor::LlmCriteriaExtractor;
pub use llm::{LlmClient, LlmError, OpenAiChatClient};
pub use responder::LlmConversationalResponder;
pub use runtime::{AgentRuntime, AgentRuntimeBuilder};
pub use search::ExaSearchClient;
