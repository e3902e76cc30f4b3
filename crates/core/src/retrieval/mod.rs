//! Travel information retrieval: query planning, provider search fan-out,
//! relevance filtering, field extraction, deduplication and ranking.

pub mod aggregator;
pub mod catalog;
pub mod classifier;
pub mod extract;
pub mod planner;

pub use aggregator::{
    QueryFailure, QueryFailureReason, RetrievalAggregator, RetrievalError, RetrievalOutcome,
    RetrievalReport, RetrievalSettings,
};
pub use catalog::{CatalogError, ProviderCatalog, SearchIntent};
pub use classifier::{ContentClassifier, Rejection};
pub use planner::QueryPlanner;
