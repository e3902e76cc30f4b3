use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use wayfarer_core::domain::trip::{NewTrip, SavedTrip, TripId, TripPatch};

use super::{RepositoryError, TripFilter, TripRepository};

#[derive(Default)]
pub struct InMemoryTripRepository {
    trips: RwLock<HashMap<String, SavedTrip>>,
}

#[async_trait::async_trait]
impl TripRepository for InMemoryTripRepository {
    async fn create(&self, input: NewTrip) -> Result<SavedTrip, RepositoryError> {
        let trip = SavedTrip::create(input, Utc::now())?;
        self.trips.write().await.insert(trip.id.0.clone(), trip.clone());
        Ok(trip)
    }

    async fn find_by_id(&self, id: &TripId) -> Result<Option<SavedTrip>, RepositoryError> {
        Ok(self.trips.read().await.get(&id.0).cloned())
    }

    async fn list(&self, filter: TripFilter) -> Result<Vec<SavedTrip>, RepositoryError> {
        let trips = self.trips.read().await;
        let mut matching: Vec<SavedTrip> = trips
            .values()
            .filter(|trip| filter.status.map_or(true, |status| trip.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        matching.truncate(filter.limit as usize);
        Ok(matching)
    }

    async fn update(
        &self,
        id: &TripId,
        patch: TripPatch,
    ) -> Result<Option<SavedTrip>, RepositoryError> {
        let mut trips = self.trips.write().await;
        let Some(trip) = trips.get_mut(&id.0) else {
            return Ok(None);
        };
        trip.apply(patch, Utc::now())?;
        Ok(Some(trip.clone()))
    }

    async fn delete(&self, id: &TripId) -> Result<bool, RepositoryError> {
        Ok(self.trips.write().await.remove(&id.0).is_some())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use wayfarer_core::domain::trip::{NewTrip, TripPatch, TripStatus};

    use super::InMemoryTripRepository;
    use crate::repositories::{RepositoryError, TripFilter, TripRepository};

    fn new_trip(title: &str) -> NewTrip {
        NewTrip {
            title: title.to_string(),
            destination: "Lisbon, Portugal".to_string(),
            ..NewTrip::default()
        }
    }

    #[tokio::test]
    async fn list_respects_limit_and_status_filter() {
        let repo = InMemoryTripRepository::default();
        for title in ["One", "Two", "Three"] {
            repo.create(new_trip(title)).await.expect("create");
        }

        let limited =
            repo.list(TripFilter { limit: 2, ..TripFilter::default() }).await.expect("list");
        assert_eq!(limited.len(), 2);

        let completed = repo
            .list(TripFilter { status: Some(TripStatus::Completed), ..TripFilter::default() })
            .await
            .expect("list completed");
        assert!(completed.is_empty());
    }

    #[tokio::test]
    async fn rejected_patch_leaves_trip_unchanged() {
        let repo = InMemoryTripRepository::default();
        let trip = repo
            .create(NewTrip {
                start_date: NaiveDate::from_ymd_opt(2026, 5, 10),
                ..new_trip("Spring")
            })
            .await
            .expect("create");

        let result = repo
            .update(
                &trip.id,
                TripPatch { end_date: NaiveDate::from_ymd_opt(2026, 5, 1), ..TripPatch::default() },
            )
            .await;
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));

        let stored = repo.find_by_id(&trip.id).await.expect("find").expect("present");
        assert_eq!(stored, trip);
    }
}
