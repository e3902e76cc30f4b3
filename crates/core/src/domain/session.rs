use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::criteria::CriteriaRecord;
use crate::domain::trip::GeneratedTrip;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("trip_planning_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningStep {
    InitialQuery,
    GatheringRequirements,
    GeneratingItinerary,
    ShowingResults,
    Completed,
}

impl PlanningStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialQuery => "initial_query",
            Self::GatheringRequirements => "gathering_requirements",
            Self::GeneratingItinerary => "generating_itinerary",
            Self::ShowingResults => "showing_results",
            Self::Completed => "completed",
        }
    }

    pub fn can_transition_to(&self, next: PlanningStep) -> bool {
        use PlanningStep::{
            Completed, GatheringRequirements, GeneratingItinerary, InitialQuery, ShowingResults,
        };

        matches!(
            (self, next),
            (InitialQuery, GatheringRequirements)
                | (InitialQuery, GeneratingItinerary)
                | (GatheringRequirements, GatheringRequirements)
                | (GatheringRequirements, GeneratingItinerary)
                | (GeneratingItinerary, ShowingResults)
                | (GeneratingItinerary, GatheringRequirements)
                | (ShowingResults, GeneratingItinerary)
                | (ShowingResults, GatheringRequirements)
                | (ShowingResults, Completed)
        )
    }
}

impl fmt::Display for PlanningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planning dialogue. History is append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    pub id: SessionId,
    pub original_query: String,
    pub current_step: PlanningStep,
    pub extracted_criteria: CriteriaRecord,
    #[serde(default)]
    pub pending_questions: Vec<String>,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
    #[serde(default)]
    pub generated_trip: Option<GeneratedTrip>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn start(
        original_query: impl Into<String>,
        criteria: CriteriaRecord,
        pending_questions: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            original_query: original_query.into(),
            current_step: PlanningStep::InitialQuery,
            extracted_criteria: criteria,
            pending_questions,
            conversation_history: Vec::new(),
            generated_trip: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn turn_count(&self) -> usize {
        self.conversation_history.len()
    }

    pub fn push_turn(&mut self, turn: ChatTurn) {
        self.conversation_history.push(turn);
    }

    pub fn transition_to(&mut self, next: PlanningStep) -> Result<(), DomainError> {
        if self.current_step.can_transition_to(next) {
            self.current_step = next;
            return Ok(());
        }

        Err(DomainError::InvalidStepTransition { from: self.current_step, to: next })
    }

    pub fn is_closed(&self) -> bool {
        self.current_step == PlanningStep::Completed
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{ChatTurn, ConversationSession, PlanningStep};
    use crate::domain::criteria::CriteriaRecord;
    use crate::errors::DomainError;

    fn session() -> ConversationSession {
        ConversationSession::start("a week in Tokyo", CriteriaRecord::default(), Vec::new(), Utc::now())
    }

    #[test]
    fn new_session_starts_in_initial_query_with_generated_id() {
        let session = session();
        assert_eq!(session.current_step, PlanningStep::InitialQuery);
        assert!(session.id.0.starts_with("trip_planning_"));
        assert_eq!(session.turn_count(), 0);
    }

    #[test]
    fn step_machine_follows_planning_path() {
        let mut session = session();
        session.transition_to(PlanningStep::GatheringRequirements).expect("gather");
        session.transition_to(PlanningStep::GatheringRequirements).expect("keep gathering");
        session.transition_to(PlanningStep::GeneratingItinerary).expect("generate");
        session.transition_to(PlanningStep::ShowingResults).expect("show");
        session.transition_to(PlanningStep::Completed).expect("complete");
        assert!(session.is_closed());
    }

    #[test]
    fn completed_is_terminal() {
        let mut session = session();
        session.current_step = PlanningStep::Completed;

        let error = session
            .transition_to(PlanningStep::GatheringRequirements)
            .expect_err("completed must be terminal");
        assert_eq!(
            error,
            DomainError::InvalidStepTransition {
                from: PlanningStep::Completed,
                to: PlanningStep::GatheringRequirements,
            }
        );
    }

    #[test]
    fn cannot_complete_before_results() {
        let mut session = session();
        session.transition_to(PlanningStep::GatheringRequirements).expect("gather");
        assert!(session.transition_to(PlanningStep::Completed).is_err());
        assert_eq!(session.current_step, PlanningStep::GatheringRequirements);
    }

    #[test]
    fn session_serializes_with_step_names() {
        let mut session = session();
        session.push_turn(ChatTurn::user("a week in Tokyo"));
        let json = serde_json::to_value(&session).expect("serialize");
        assert_eq!(json["currentStep"], "initial_query");
        assert_eq!(json["conversationHistory"][0]["role"], "user");

        let restored: ConversationSession = serde_json::from_value(json).expect("deserialize");
        assert_eq!(restored, session);
    }
}
