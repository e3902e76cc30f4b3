pub mod engine;
pub mod locks;
pub mod states;

pub use engine::{ConversationEngine, GenerationFailure, TurnReply, TurnRequest};
pub use locks::SessionLocks;
pub use states::{
    transition, FlowAction, GateDecision, GenerationGate, PlanningEvent, TransitionOutcome,
    MIN_CRITERIA_SCORE, MIN_HISTORY_BEFORE_GENERATION,
};
