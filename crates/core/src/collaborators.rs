//! Contracts for the services the planning core depends on but does not own:
//! language-model adapters, the document search provider and session storage.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::criteria::CriteriaRecord;
use crate::domain::session::{ChatTurn, ConversationSession, SessionId};
use crate::domain::travel::{RawSearchResult, TravelItem};
use crate::domain::trip::GeneratedTrip;

/// Criteria pulled out of one free-text message.
#[derive(Clone, Debug, PartialEq)]
pub struct Extraction {
    pub criteria: CriteriaRecord,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub missing_info: Vec<String>,
}

impl Extraction {
    pub fn new(criteria: CriteriaRecord, confidence: f32, missing_info: Vec<String>) -> Self {
        Self { criteria, confidence: confidence.clamp(0.0, 1.0), missing_info }
    }

    pub fn failed(note: impl Into<String>) -> Self {
        Self { criteria: CriteriaRecord::default(), confidence: 0.0, missing_info: vec![note.into()] }
    }
}

/// Never fails: an extractor that cannot understand a message returns
/// [`Extraction::failed`].
#[async_trait]
pub trait CriteriaExtractor: Send + Sync {
    async fn extract(&self, message: &str) -> Extraction;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DraftingError {
    #[error("itinerary draft was malformed: {0}")]
    Malformed(String),
    #[error("itinerary drafter unavailable: {0}")]
    Unavailable(String),
    #[error("itinerary drafter is not configured: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait ItineraryDrafter: Send + Sync {
    async fn draft(
        &self,
        criteria: &CriteriaRecord,
        items: &[TravelItem],
    ) -> Result<GeneratedTrip, DraftingError>;
}

/// Everything the responder sees when writing the assistant's reply.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseContext {
    pub history: Vec<ChatTurn>,
    pub latest_message: String,
    pub criteria: CriteriaRecord,
    /// Only set on the turn that produced it.
    pub generated_trip: Option<GeneratedTrip>,
    pub turn_count: usize,
}

/// Never fails: adapters fall back to a static apology.
#[async_trait]
pub trait ConversationalResponder: Send + Sync {
    async fn respond(&self, context: ResponseContext) -> String;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("document search is not configured: {0}")]
    Configuration(String),
    #[error("document search transport failure: {0}")]
    Transport(String),
    #[error("document search returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("document search response could not be decoded: {0}")]
    Decode(String),
}

impl SearchError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[async_trait]
pub trait DocumentSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<RawSearchResult>, SearchError>;

    /// Fails fast when credentials or endpoints are missing.
    fn check_configured(&self) -> Result<(), SearchError> {
        Ok(())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("conversation store backend failure: {0}")]
    Backend(String),
    #[error("stored conversation `{id}` is corrupt: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Single-key reads and writes of whole sessions.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<Option<ConversationSession>, StoreError>;
    async fn put(&self, session: &ConversationSession) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::Extraction;
    use crate::domain::criteria::CriteriaRecord;

    #[test]
    fn extraction_confidence_is_clamped() {
        assert_eq!(Extraction::new(CriteriaRecord::default(), 1.7, Vec::new()).confidence, 1.0);
        assert_eq!(Extraction::new(CriteriaRecord::default(), -0.2, Vec::new()).confidence, 0.0);
    }

    #[test]
    fn failed_extraction_carries_note_and_empty_criteria() {
        let extraction = Extraction::failed("could not parse request");
        assert!(extraction.criteria.is_empty());
        assert_eq!(extraction.confidence, 0.0);
        assert_eq!(extraction.missing_info, vec!["could not parse request".to_string()]);
    }
}
