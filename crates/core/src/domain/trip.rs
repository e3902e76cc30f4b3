use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::criteria::TravelStyle;
use crate::domain::session::ConversationSession;
use crate::errors::DomainError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedActivity {
    #[serde(default)]
    pub time: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tips: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDay {
    #[serde(default)]
    pub date: String,
    pub day_number: u32,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub activities: Vec<PlannedActivity>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetBreakdown {
    pub accommodation: Decimal,
    pub food: Decimal,
    pub activities: Decimal,
    pub transportation: Decimal,
}

impl BudgetBreakdown {
    pub fn total(&self) -> Decimal {
        self.accommodation + self.food + self.activities + self.transportation
    }
}

/// Day-by-day itinerary produced by the drafter once the generation gate opens.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTrip {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub days: Vec<ItineraryDay>,
    #[serde(default)]
    pub total_estimated_cost: Option<Decimal>,
    #[serde(default)]
    pub packing_tips: Vec<String>,
    #[serde(default)]
    pub local_tips: Vec<String>,
    #[serde(default)]
    pub budget_breakdown: Option<BudgetBreakdown>,
}

impl GeneratedTrip {
    /// Structural checks a drafted trip must pass before it is stored.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::InvariantViolation("generated trip has no title".to_string()));
        }
        if self.days.is_empty() {
            return Err(DomainError::InvariantViolation("generated trip has no days".to_string()));
        }
        if let Some(day) = self.days.iter().find(|day| day.activities.iter().any(|a| a.title.trim().is_empty())) {
            return Err(DomainError::InvariantViolation(format!(
                "day {} contains an activity without a title",
                day.day_number
            )));
        }
        Ok(())
    }

    pub fn activity_count(&self) -> usize {
        self.days.iter().map(|day| day.activities.len()).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripId(pub String);

impl TripId {
    pub fn generate() -> Self {
        Self(format!("trip_{}", uuid::Uuid::new_v4().simple()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    #[default]
    Draft,
    Confirmed,
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A trip record managed through the trip repository.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTrip {
    pub id: TripId,
    pub title: String,
    pub destination: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
    pub currency: String,
    pub travelers: u32,
    pub travel_style: Option<TravelStyle>,
    pub itinerary: Option<GeneratedTrip>,
    pub status: TripStatus,
    pub source_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTrip {
    pub title: String,
    pub destination: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
    pub currency: Option<String>,
    pub travelers: Option<u32>,
    pub travel_style: Option<TravelStyle>,
    pub itinerary: Option<GeneratedTrip>,
    pub source_session_id: Option<String>,
}

impl NewTrip {
    /// A draft built from a session that has produced an itinerary.
    pub fn from_session(session: &ConversationSession) -> Option<Self> {
        let itinerary = session.generated_trip.clone()?;
        let criteria = &session.extracted_criteria;
        let destination = criteria.destination()?.to_string();

        Some(Self {
            title: itinerary.title.clone(),
            destination,
            start_date: criteria.start_date,
            end_date: criteria.end_date,
            budget: criteria.budget,
            currency: None,
            travelers: criteria.travelers,
            travel_style: criteria.travel_style,
            itinerary: Some(itinerary),
            source_session_id: Some(session.id.0.clone()),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TripPatch {
    pub title: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
    pub travelers: Option<u32>,
    pub status: Option<TripStatus>,
    pub itinerary: Option<GeneratedTrip>,
}

impl SavedTrip {
    pub fn create(input: NewTrip, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let trip = Self {
            id: TripId::generate(),
            title: input.title.trim().to_string(),
            destination: input.destination.trim().to_string(),
            start_date: input.start_date,
            end_date: input.end_date,
            budget: input.budget,
            currency: input.currency.unwrap_or_else(|| "USD".to_string()),
            travelers: input.travelers.unwrap_or(1),
            travel_style: input.travel_style,
            itinerary: input.itinerary,
            status: TripStatus::Draft,
            source_session_id: input.source_session_id,
            created_at: now,
            updated_at: now,
        };
        trip.validate()?;
        Ok(trip)
    }

    pub fn apply(&mut self, patch: TripPatch, now: DateTime<Utc>) -> Result<(), DomainError> {
        let mut next = self.clone();
        if let Some(title) = patch.title {
            next.title = title.trim().to_string();
        }
        if let Some(destination) = patch.destination {
            next.destination = destination.trim().to_string();
        }
        if patch.start_date.is_some() {
            next.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            next.end_date = patch.end_date;
        }
        if patch.budget.is_some() {
            next.budget = patch.budget;
        }
        if let Some(travelers) = patch.travelers {
            next.travelers = travelers;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if patch.itinerary.is_some() {
            next.itinerary = patch.itinerary;
        }
        next.updated_at = now;
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.is_empty() {
            return Err(DomainError::InvariantViolation("trip title is required".to_string()));
        }
        if self.destination.is_empty() {
            return Err(DomainError::InvariantViolation("trip destination is required".to_string()));
        }
        if self.travelers == 0 {
            return Err(DomainError::InvariantViolation(
                "trip must have at least one traveler".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(DomainError::InvariantViolation(format!(
                    "trip end date {end} is before start date {start}"
                )));
            }
        }
        if self.budget.is_some_and(|budget| budget < Decimal::ZERO) {
            return Err(DomainError::InvariantViolation("trip budget cannot be negative".to_string()));
        }
        Ok(())
    }
}
