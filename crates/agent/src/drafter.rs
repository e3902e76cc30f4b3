use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::warn;
use wayfarer_core::collaborators::{DraftingError, ItineraryDrafter};
use wayfarer_core::domain::criteria::CriteriaRecord;
use wayfarer_core::domain::travel::TravelItem;
use wayfarer_core::domain::trip::GeneratedTrip;

use crate::llm::{strip_code_fences, ChatMessage, CompletionRequest, LlmClient, LlmError};

const REQUEST_TEMPLATE: &str = "itinerary_request";
const DEFAULT_TRIP_DAYS: i64 = 3;

pub struct LlmItineraryDrafter {
    llm: Arc<dyn LlmClient>,
    templates: Tera,
}

#[derive(Debug, Serialize)]
struct PromptItem<'a> {
    title: &'a str,
    category: &'a str,
    location: &'a str,
    rating: String,
    price: String,
    description: &'a str,
    url: &'a str,
}

impl LlmItineraryDrafter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Result<Self, tera::Error> {
        let mut templates = Tera::default();
        templates.add_raw_template(
            REQUEST_TEMPLATE,
            include_str!("../../../templates/prompts/itinerary_request.tera"),
        )?;
        Ok(Self { llm, templates })
    }

    pub fn render_request(
        &self,
        criteria: &CriteriaRecord,
        items: &[TravelItem],
    ) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("duration", &trip_days(criteria));
        context.insert("destination", criteria.destination().unwrap_or("the destination"));
        context.insert(
            "budget",
            &criteria.budget.map_or_else(|| "flexible".to_string(), |budget| format!("${budget}")),
        );
        context.insert("travelers", &criteria.travelers.unwrap_or(1));
        context.insert(
            "style",
            criteria.travel_style.map_or("balanced", |style| style.as_str()),
        );
        context.insert("interests", &join_or(&criteria.activities, "general sightseeing"));
        context.insert(
            "accommodation",
            criteria.accommodation_type.map_or("hotel", |kind| kind.as_str()),
        );
        context.insert("dietary", &join_or(&criteria.dietary_restrictions, ""));
        context.insert("accessibility", &join_or(&criteria.accessibility, ""));

        let prompt_items: Vec<PromptItem<'_>> = items
            .iter()
            .map(|item| PromptItem {
                title: &item.title,
                category: item.category.as_str(),
                location: &item.location,
                rating: item.rating.map_or_else(|| "N/A".to_string(), |rating| format!("{rating:.1}")),
                price: item
                    .price_range
                    .as_ref()
                    .map_or_else(|| "N/A".to_string(), |price| price.as_str().to_string()),
                description: &item.description,
                url: &item.url,
            })
            .collect();
        context.insert("items", &prompt_items);

        self.templates.render(REQUEST_TEMPLATE, &context)
    }
}

/// Explicit duration first, then the inclusive date span, then three days.
fn trip_days(criteria: &CriteriaRecord) -> i64 {
    if let Some(days) = criteria.duration.filter(|days| *days > 0) {
        return i64::from(days);
    }
    match (criteria.start_date, criteria.end_date) {
        (Some(start), Some(end)) if end >= start => (end - start).num_days() + 1,
        _ => DEFAULT_TRIP_DAYS,
    }
}

fn join_or(values: &std::collections::BTreeSet<String>, fallback: &str) -> String {
    if values.is_empty() {
        fallback.to_string()
    } else {
        values.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Decodes and validates a drafted itinerary.
pub fn parse_trip(raw: &str) -> Result<GeneratedTrip, DraftingError> {
    let trip: GeneratedTrip = serde_json::from_str(strip_code_fences(raw))
        .map_err(|error| DraftingError::Malformed(error.to_string()))?;
    trip.validate().map_err(|error| DraftingError::Malformed(error.to_string()))?;
    Ok(trip)
}

#[async_trait]
impl ItineraryDrafter for LlmItineraryDrafter {
    async fn draft(
        &self,
        criteria: &CriteriaRecord,
        items: &[TravelItem],
    ) -> Result<GeneratedTrip, DraftingError> {
        let prompt = self
            .render_request(criteria, items)
            .map_err(|error| DraftingError::Unavailable(format!("prompt rendering failed: {error}")))?;

        let request = CompletionRequest::new(
            include_str!("../../../templates/prompts/itinerary_system.tera"),
            vec![ChatMessage::user(prompt)],
        )
        .with_temperature(0.7)
        .with_max_tokens(3000)
        .json();

        let raw = self.llm.complete(request).await.map_err(|error| match error {
            LlmError::NotConfigured(reason) => DraftingError::Configuration(reason),
            other => {
                warn!(event_name = "drafting.llm_failed", error = %other, "itinerary completion failed");
                DraftingError::Unavailable(other.to_string())
            }
        })?;

        parse_trip(&raw)
    }
}
