use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use wayfarer_core::domain::criteria::TravelStyle;
use wayfarer_core::domain::trip::{NewTrip, SavedTrip, TripId, TripPatch, TripStatus};

use super::{RepositoryError, TripFilter, TripRepository};
use crate::DbPool;

const TRIP_COLUMNS: &str = "id, title, destination, start_date, end_date, budget, currency, \
     travelers, travel_style, itinerary, status, source_session_id, created_at, updated_at";

pub struct SqlTripRepository {
    pool: DbPool,
}

impl SqlTripRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn write(&self, trip: &SavedTrip) -> Result<(), RepositoryError> {
        let itinerary = trip
            .itinerary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO trip
                (id, title, destination, start_date, end_date, budget, currency, travelers,
                 travel_style, itinerary, status, source_session_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                destination = excluded.destination,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                budget = excluded.budget,
                travelers = excluded.travelers,
                itinerary = excluded.itinerary,
                status = excluded.status,
                updated_at = excluded.updated_at",
        )
        .bind(&trip.id.0)
        .bind(&trip.title)
        .bind(&trip.destination)
        .bind(trip.start_date.map(|date| date.to_string()))
        .bind(trip.end_date.map(|date| date.to_string()))
        .bind(trip.budget.map(|budget| budget.to_string()))
        .bind(&trip.currency)
        .bind(i64::from(trip.travelers))
        .bind(trip.travel_style.map(|style| style.as_str()))
        .bind(itinerary)
        .bind(trip.status.as_str())
        .bind(&trip.source_session_id)
        .bind(trip.created_at.to_rfc3339())
        .bind(trip.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn decode_err(error: impl ToString) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>, RepositoryError> {
    raw.map(|value| NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(decode_err)).transpose()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(decode_err)
}

fn row_to_trip(row: &sqlx::sqlite::SqliteRow) -> Result<SavedTrip, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let title: String = row.try_get("title").map_err(decode_err)?;
    let destination: String = row.try_get("destination").map_err(decode_err)?;
    let start_date: Option<String> = row.try_get("start_date").map_err(decode_err)?;
    let end_date: Option<String> = row.try_get("end_date").map_err(decode_err)?;
    let budget: Option<String> = row.try_get("budget").map_err(decode_err)?;
    let currency: String = row.try_get("currency").map_err(decode_err)?;
    let travelers: i64 = row.try_get("travelers").map_err(decode_err)?;
    let travel_style: Option<String> = row.try_get("travel_style").map_err(decode_err)?;
    let itinerary: Option<String> = row.try_get("itinerary").map_err(decode_err)?;
    let status: String = row.try_get("status").map_err(decode_err)?;
    let source_session_id: Option<String> =
        row.try_get("source_session_id").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(SavedTrip {
        id: TripId(id),
        title,
        destination,
        start_date: parse_date(start_date)?,
        end_date: parse_date(end_date)?,
        budget: budget.map(|value| Decimal::from_str(&value).map_err(decode_err)).transpose()?,
        currency,
        travelers: u32::try_from(travelers).map_err(decode_err)?,
        travel_style: travel_style
            .map(|value| TravelStyle::from_str(&value).map_err(decode_err))
            .transpose()?,
        itinerary: itinerary
            .map(|value| serde_json::from_str(&value).map_err(decode_err))
            .transpose()?,
        status: TripStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown trip status `{status}`")))?,
        source_session_id,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl TripRepository for SqlTripRepository {
    async fn create(&self, input: NewTrip) -> Result<SavedTrip, RepositoryError> {
        let trip = SavedTrip::create(input, Utc::now())?;
        self.write(&trip).await?;
        Ok(trip)
    }

    async fn find_by_id(&self, id: &TripId) -> Result<Option<SavedTrip>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trip WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_trip).transpose()
    }

    async fn list(&self, filter: TripFilter) -> Result<Vec<SavedTrip>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trip
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, id
             LIMIT ?2"
        ))
        .bind(filter.status.map(|status| status.as_str()))
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_trip).collect::<Result<Vec<_>, _>>()
    }

    async fn update(
        &self,
        id: &TripId,
        patch: TripPatch,
    ) -> Result<Option<SavedTrip>, RepositoryError> {
        let Some(mut trip) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        trip.apply(patch, Utc::now())?;
        self.write(&trip).await?;
        Ok(Some(trip))
    }

    async fn delete(&self, id: &TripId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM trip WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use wayfarer_core::domain::criteria::TravelStyle;
    use wayfarer_core::domain::trip::{
        GeneratedTrip, ItineraryDay, NewTrip, PlannedActivity, TripId, TripPatch, TripStatus,
    };

    use super::SqlTripRepository;
    use crate::repositories::{RepositoryError, TripFilter, TripRepository};
    use crate::{connect_with_settings, migrations::run_pending};

    async fn repository() -> SqlTripRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        SqlTripRepository::new(pool)
    }

    fn new_trip(title: &str) -> NewTrip {
        NewTrip {
            title: title.to_string(),
            destination: "Paris, France".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 2, 14),
            end_date: NaiveDate::from_ymd_opt(2026, 2, 16),
            budget: Some(Decimal::new(150050, 2)),
            travelers: Some(2),
            travel_style: Some(TravelStyle::Romantic),
            itinerary: Some(GeneratedTrip {
                title: title.to_string(),
                days: vec![ItineraryDay {
                    day_number: 1,
                    activities: vec![PlannedActivity {
                        title: "Seine cruise".to_string(),
                        rating: Some(4.5),
                        ..PlannedActivity::default()
                    }],
                    ..ItineraryDay::default()
                }],
                ..GeneratedTrip::default()
            }),
            ..NewTrip::default()
        }
    }

    #[tokio::test]
    async fn create_then_find_returns_equal_trip() {
        let repo = repository().await;
        let created = repo.create(new_trip("Romantic Weekend")).await.expect("create");

        let found = repo.find_by_id(&created.id).await.expect("find").expect("present");
        assert_eq!(found.title, created.title);
        assert_eq!(found.budget, Some(Decimal::new(150050, 2)));
        assert_eq!(found.travel_style, Some(TravelStyle::Romantic));
        assert_eq!(found.itinerary, created.itinerary);
        assert_eq!(found.created_at, created.created_at);
        assert_eq!(found.currency, "USD");
    }

    #[tokio::test]
    async fn invalid_trip_is_rejected_before_write() {
        let repo = repository().await;
        let result = repo.create(NewTrip { title: "  ".to_string(), ..new_trip("x") }).await;
        assert!(matches!(result, Err(RepositoryError::Invalid(_))));
        assert!(repo.list(TripFilter::default()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn update_applies_patch_and_filters_by_status() {
        let repo = repository().await;
        let first = repo.create(new_trip("First")).await.expect("create first");
        repo.create(new_trip("Second")).await.expect("create second");

        let updated = repo
            .update(&first.id, TripPatch { status: Some(TripStatus::Confirmed), ..TripPatch::default() })
            .await
            .expect("update")
            .expect("present");
        assert_eq!(updated.status, TripStatus::Confirmed);

        let confirmed = repo
            .list(TripFilter { status: Some(TripStatus::Confirmed), ..TripFilter::default() })
            .await
            .expect("list confirmed");
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, first.id);
        assert_eq!(repo.list(TripFilter::default()).await.expect("list all").len(), 2);

        let missing = repo
            .update(&TripId("trip_missing".to_string()), TripPatch::default())
            .await
            .expect("update missing");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let repo = repository().await;
        let trip = repo.create(new_trip("Doomed")).await.expect("create");

        assert!(repo.delete(&trip.id).await.expect("delete"));
        assert!(!repo.delete(&trip.id).await.expect("second delete"));
        assert!(repo.find_by_id(&trip.id).await.expect("find").is_none());
    }
}
