use serde::{Deserialize, Serialize};

use crate::domain::criteria::{completeness, Completeness, CriteriaRecord};
use crate::domain::session::PlanningStep;
use crate::errors::DomainError;

/// History length (user and assistant turns) that must be exceeded before an
/// itinerary is generated.
pub const MIN_HISTORY_BEFORE_GENERATION: usize = 6;
pub const MIN_CRITERIA_SCORE: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanningEvent {
    RequirementsIncomplete,
    GateOpened,
    ItineraryReady,
    GenerationFailed,
    CloseRequested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    AskFollowUp,
    RetrieveTravelInfo,
    DraftItinerary,
    PresentItinerary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: PlanningStep,
    pub to: PlanningStep,
    pub event: PlanningEvent,
    pub actions: Vec<FlowAction>,
}

/// Pure transition table of the planning dialogue.
pub fn transition(
    current: PlanningStep,
    event: PlanningEvent,
) -> Result<TransitionOutcome, DomainError> {
    use FlowAction::{AskFollowUp, DraftItinerary, PresentItinerary, RetrieveTravelInfo};
    use PlanningEvent::{
        CloseRequested, GateOpened, GenerationFailed, ItineraryReady, RequirementsIncomplete,
    };
    use PlanningStep::{
        Completed, GatheringRequirements, GeneratingItinerary, InitialQuery, ShowingResults,
    };

    let (to, actions) = match (current, event) {
        (InitialQuery | GatheringRequirements | ShowingResults, RequirementsIncomplete) => {
            (GatheringRequirements, vec![AskFollowUp])
        }
        (InitialQuery | GatheringRequirements | ShowingResults, GateOpened) => {
            (GeneratingItinerary, vec![RetrieveTravelInfo, DraftItinerary])
        }
        (GeneratingItinerary, ItineraryReady) => (ShowingResults, vec![PresentItinerary]),
        (GeneratingItinerary, GenerationFailed) => (GatheringRequirements, vec![AskFollowUp]),
        (ShowingResults, CloseRequested) => (Completed, Vec::new()),
        _ => {
            return Err(DomainError::InvalidStepTransition {
                from: current,
                to: intended_target(event),
            });
        }
    };

    debug_assert!(current.can_transition_to(to));
    Ok(TransitionOutcome { from: current, to, event, actions })
}

fn intended_target(event: PlanningEvent) -> PlanningStep {
    match event {
        PlanningEvent::RequirementsIncomplete | PlanningEvent::GenerationFailed => {
            PlanningStep::GatheringRequirements
        }
        PlanningEvent::GateOpened => PlanningStep::GeneratingItinerary,
        PlanningEvent::ItineraryReady => PlanningStep::ShowingResults,
        PlanningEvent::CloseRequested => PlanningStep::Completed,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationGate {
    pub min_history_before_generation: usize,
    pub min_criteria_score: u8,
}

impl Default for GenerationGate {
    fn default() -> Self {
        Self {
            min_history_before_generation: MIN_HISTORY_BEFORE_GENERATION,
            min_criteria_score: MIN_CRITERIA_SCORE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GateDecision {
    pub open: bool,
    pub turn_count: usize,
    pub completeness: Completeness,
}

impl GenerationGate {
    /// Opens only when every condition holds: enough history, a destination,
    /// dates or a duration, and a high enough completeness score.
    pub fn evaluate(&self, turn_count: usize, criteria: &CriteriaRecord) -> GateDecision {
        let completeness = completeness(criteria);
        let open = turn_count > self.min_history_before_generation
            && completeness.has_destination
            && completeness.has_dates
            && completeness.score >= self.min_criteria_score;

        GateDecision { open, turn_count, completeness }
    }
}
