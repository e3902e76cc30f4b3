use async_trait::async_trait;
use thiserror::Error;

use wayfarer_core::domain::trip::{NewTrip, SavedTrip, TripId, TripPatch, TripStatus};
use wayfarer_core::errors::DomainError;

pub mod conversation;
pub mod memory;
pub mod trip;

pub use conversation::SqlConversationStore;
pub use memory::InMemoryTripRepository;
pub use trip::SqlTripRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TripFilter {
    pub status: Option<TripStatus>,
    pub limit: u32,
}

impl Default for TripFilter {
    fn default() -> Self {
        Self { status: None, limit: 50 }
    }
}

/// Trip management. Listing is newest first.
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn create(&self, input: NewTrip) -> Result<SavedTrip, RepositoryError>;
    async fn find_by_id(&self, id: &TripId) -> Result<Option<SavedTrip>, RepositoryError>;
    async fn list(&self, filter: TripFilter) -> Result<Vec<SavedTrip>, RepositoryError>;
    /// `Ok(None)` when no trip has this id.
    async fn update(
        &self,
        id: &TripId,
        patch: TripPatch,
    ) -> Result<Option<SavedTrip>, RepositoryError>;
    /// `Ok(false)` when no trip has this id.
    async fn delete(&self, id: &TripId) -> Result<bool, RepositoryError>;
}
