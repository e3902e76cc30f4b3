pub mod audit;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod retrieval;
pub mod store;

pub use collaborators::{
    ConversationStore, ConversationalResponder, CriteriaExtractor, DocumentSearch, DraftingError,
    Extraction, ItineraryDrafter, ResponseContext, SearchError, StoreError,
};
pub use domain::criteria::{completeness, merge, next_question, Completeness, CriteriaRecord};
pub use domain::session::{ChatRole, ChatTurn, ConversationSession, PlanningStep, SessionId};
pub use domain::travel::{PriceRange, RawSearchResult, TravelCategory, TravelItem};
pub use domain::trip::{GeneratedTrip, SavedTrip, TripId, TripStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{ConversationEngine, GenerationGate, TurnReply, TurnRequest};
pub use retrieval::{ProviderCatalog, RetrievalAggregator, RetrievalError, RetrievalSettings};
pub use store::InMemoryConversationStore;
