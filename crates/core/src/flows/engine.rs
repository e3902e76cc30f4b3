use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, NoopAuditSink};
use crate::collaborators::{
    ConversationStore, ConversationalResponder, CriteriaExtractor, DraftingError,
    ItineraryDrafter, ResponseContext, StoreError,
};
use crate::domain::criteria::{merge, next_question, CriteriaRecord};
use crate::domain::session::{ChatTurn, ConversationSession, PlanningStep, SessionId};
use crate::domain::trip::GeneratedTrip;
use crate::errors::{ApplicationError, DomainError};
use crate::flows::locks::SessionLocks;
use crate::flows::states::{transition, GenerationGate, PlanningEvent, TransitionOutcome};
use crate::retrieval::{RetrievalAggregator, RetrievalError};

const ACTOR: &str = "conversation-engine";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnRequest {
    pub message: String,
    pub conversation_id: Option<SessionId>,
    pub correlation_id: String,
}

impl TurnRequest {
    pub fn new(message: impl Into<String>, conversation_id: Option<SessionId>) -> Self {
        Self {
            message: message.into(),
            conversation_id,
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnReply {
    pub reply: String,
    pub session_id: SessionId,
    pub step: PlanningStep,
    pub criteria: CriteriaRecord,
    pub suggested_question: Option<String>,
    /// Present only on the turn that produced it.
    pub generated_trip: Option<GeneratedTrip>,
}

/// Why an itinerary could not be produced on a turn where the gate was open.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GenerationFailure {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Drafting(#[from] DraftingError),
    #[error("drafted itinerary rejected: {0}")]
    Invalid(#[from] DomainError),
}

/// Runs one planning dialogue turn at a time per session: merge criteria,
/// check the generation gate, retrieve and draft when it opens, reply, persist.
pub struct ConversationEngine {
    extractor: Arc<dyn CriteriaExtractor>,
    drafter: Arc<dyn ItineraryDrafter>,
    responder: Arc<dyn ConversationalResponder>,
    retrieval: RetrievalAggregator,
    store: Arc<dyn ConversationStore>,
    audit: Arc<dyn AuditSink>,
    locks: SessionLocks,
    gate: GenerationGate,
}

impl ConversationEngine {
    pub fn new(
        extractor: Arc<dyn CriteriaExtractor>,
        drafter: Arc<dyn ItineraryDrafter>,
        responder: Arc<dyn ConversationalResponder>,
        retrieval: RetrievalAggregator,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            extractor,
            drafter,
            responder,
            retrieval,
            store,
            audit: Arc::new(NoopAuditSink),
            locks: SessionLocks::default(),
            gate: GenerationGate::default(),
        }
    }

    pub fn with_gate(mut self, gate: GenerationGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn gate(&self) -> GenerationGate {
        self.gate
    }

    pub fn retrieval(&self) -> &RetrievalAggregator {
        &self.retrieval
    }

    pub async fn session(
        &self,
        id: &SessionId,
    ) -> Result<Option<ConversationSession>, ApplicationError> {
        self.store.get(id).await.map_err(persistence)
    }

    pub async fn handle_message(&self, request: TurnRequest) -> Result<TurnReply, ApplicationError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ApplicationError::InvalidRequest("message must not be empty".to_owned()));
        }

        let (mut session, _guard) = match &request.conversation_id {
            None => {
                let extraction = self.extractor.extract(message).await;
                let session = ConversationSession::start(
                    message,
                    extraction.criteria,
                    extraction.missing_info,
                    Utc::now(),
                );
                let guard = self.locks.acquire(&session.id).await;
                info!(
                    event_name = "conversation.started",
                    session_id = %session.id,
                    correlation_id = %request.correlation_id,
                    confidence = extraction.confidence,
                    "planning conversation started"
                );
                (session, guard)
            }
            Some(id) => {
                let guard = self.locks.acquire(id).await;
                let mut session = self
                    .store
                    .get(id)
                    .await
                    .map_err(persistence)?
                    .ok_or_else(|| ApplicationError::SessionNotFound(id.to_string()))?;
                if session.is_closed() {
                    return Err(ApplicationError::SessionClosed(id.to_string()));
                }

                let extraction = self.extractor.extract(message).await;
                session.extracted_criteria =
                    merge(&session.extracted_criteria, &extraction.criteria);
                if extraction.confidence > 0.0 {
                    session.pending_questions = extraction.missing_info;
                }
                (session, guard)
            }
        };

        session.push_turn(ChatTurn::user(message));
        let turn_count = session.turn_count();
        let audit = AuditContext::new(Some(session.id.clone()), &request.correlation_id, ACTOR);

        let decision = self.gate.evaluate(turn_count, &session.extracted_criteria);
        info!(
            event_name = "flow.gate_evaluated",
            session_id = %session.id,
            correlation_id = %request.correlation_id,
            turn_count,
            score = decision.completeness.score,
            open = decision.open,
            "generation gate evaluated"
        );

        let generated_trip = if decision.open {
            self.apply_event(&mut session, PlanningEvent::GateOpened, &audit)?;
            match self.generate(&session.extracted_criteria, &audit).await {
                Ok(trip) => {
                    session.generated_trip = Some(trip.clone());
                    self.apply_event(&mut session, PlanningEvent::ItineraryReady, &audit)?;
                    Some(trip)
                }
                Err(failure) => {
                    error!(
                        event_name = "generation.failed",
                        session_id = %session.id,
                        correlation_id = %request.correlation_id,
                        error = %failure,
                        "itinerary generation failed, continuing to gather requirements"
                    );
                    self.audit.emit(
                        audit
                            .event(
                                "generation.failed",
                                failure_category(&failure),
                                AuditOutcome::Failed,
                            )
                            .with_metadata("error", failure.to_string()),
                    );
                    self.apply_event(&mut session, PlanningEvent::GenerationFailed, &audit)?;
                    None
                }
            }
        } else {
            self.apply_event(&mut session, PlanningEvent::RequirementsIncomplete, &audit)?;
            None
        };

        let reply = self
            .responder
            .respond(ResponseContext {
                history: session.conversation_history.clone(),
                latest_message: message.to_owned(),
                criteria: session.extracted_criteria.clone(),
                generated_trip: generated_trip.clone(),
                turn_count,
            })
            .await;

        session.push_turn(ChatTurn::assistant(reply.clone()));
        session.updated_at = Utc::now();
        self.store.put(&session).await.map_err(persistence)?;

        let suggested_question = if generated_trip.is_some() {
            None
        } else {
            next_question(&session.extracted_criteria).map(str::to_owned)
        };

        Ok(TurnReply {
            reply,
            session_id: session.id,
            step: session.current_step,
            criteria: session.extracted_criteria,
            suggested_question,
            generated_trip,
        })
    }

    /// Moves a session that is showing results to `completed`.
    pub async fn close(
        &self,
        id: &SessionId,
        correlation_id: &str,
    ) -> Result<ConversationSession, ApplicationError> {
        let _guard = self.locks.acquire(id).await;
        let mut session = self
            .store
            .get(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::SessionNotFound(id.to_string()))?;
        if session.is_closed() {
            return Err(ApplicationError::SessionClosed(id.to_string()));
        }

        let audit = AuditContext::new(Some(id.clone()), correlation_id, ACTOR);
        self.apply_event(&mut session, PlanningEvent::CloseRequested, &audit)?;
        session.updated_at = Utc::now();
        self.store.put(&session).await.map_err(persistence)?;
        Ok(session)
    }

    async fn generate(
        &self,
        criteria: &CriteriaRecord,
        audit: &AuditContext,
    ) -> Result<GeneratedTrip, GenerationFailure> {
        let outcome = self.retrieval.retrieve(criteria).await?;
        self.audit.emit(
            audit
                .event("retrieval.completed", AuditCategory::Retrieval, AuditOutcome::Success)
                .with_metadata("queries", outcome.report.queries.len().to_string())
                .with_metadata("failed_queries", outcome.report.failures.len().to_string())
                .with_metadata("items", outcome.items.len().to_string()),
        );

        let trip = self.drafter.draft(criteria, &outcome.items).await?;
        trip.validate()?;

        info!(
            event_name = "generation.succeeded",
            correlation_id = %audit.correlation_id,
            days = trip.days.len(),
            activities = trip.activity_count(),
            "itinerary generated"
        );
        self.audit.emit(
            audit
                .event("generation.succeeded", AuditCategory::Drafting, AuditOutcome::Success)
                .with_metadata("title", trip.title.clone())
                .with_metadata("days", trip.days.len().to_string()),
        );
        Ok(trip)
    }

    fn apply_event(
        &self,
        session: &mut ConversationSession,
        event: PlanningEvent,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let result = transition(session.current_step, event).and_then(|outcome| {
            session.transition_to(outcome.to)?;
            Ok(outcome)
        });

        match &result {
            Ok(outcome) => {
                info!(
                    event_name = "flow.step_changed",
                    session_id = %session.id,
                    correlation_id = %audit.correlation_id,
                    from = %outcome.from,
                    to = %outcome.to,
                    "planning step changed"
                );
                self.audit.emit(
                    audit
                        .event("flow.step_changed", AuditCategory::Flow, AuditOutcome::Success)
                        .with_metadata("from", outcome.from.as_str())
                        .with_metadata("to", outcome.to.as_str())
                        .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                warn!(
                    event_name = "flow.step_rejected",
                    session_id = %session.id,
                    correlation_id = %audit.correlation_id,
                    error = %error,
                    "planning step change rejected"
                );
                self.audit.emit(
                    audit
                        .event("flow.step_rejected", AuditCategory::Flow, AuditOutcome::Rejected)
                        .with_metadata("error", error.to_string()),
                );
            }
        }

        result.map_err(ApplicationError::from)
    }
}

fn persistence(error: StoreError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn failure_category(failure: &GenerationFailure) -> AuditCategory {
    match failure {
        GenerationFailure::Retrieval(_) => AuditCategory::Retrieval,
        GenerationFailure::Drafting(_) | GenerationFailure::Invalid(_) => AuditCategory::Drafting,
    }
}
