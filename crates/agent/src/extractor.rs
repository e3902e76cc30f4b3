use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use wayfarer_core::collaborators::{CriteriaExtractor, Extraction};
use wayfarer_core::domain::criteria::CriteriaRecord;

use crate::llm::{strip_code_fences, ChatMessage, CompletionRequest, LlmClient, LlmError};

pub const UNPARSABLE_NOTE: &str = "Unable to parse trip planning criteria";
pub const UNCONFIGURED_NOTE: &str =
    "The language model API key is not configured properly. Check your configuration.";

const EXTRACTION_PROMPT: &str = r#"You are an AI travel planning assistant. Extract travel planning criteria from user messages and identify what information might be missing.

Available travel styles: "luxury", "budget", "adventure", "family", "romantic", "business", "cultural", "relaxation"
Available activities: "food", "culture", "adventure", "relaxation", "nightlife", "shopping", "nature", "history", "art", "sports"
Available accommodation types: "hotel", "airbnb", "resort", "hostel", "boutique", "luxury"

Extract the following information from the user's message:
- destination: Where they want to travel
- startDate: When they want to start (YYYY-MM-DD format if specific)
- endDate: When they want to end (YYYY-MM-DD format if specific)
- budget: Total budget amount (number only)
- travelers: Number of people traveling
- travelStyle: Style of travel
- activities: Array of activities they're interested in
- accommodationType: Type of accommodation preferred
- duration: Number of days (if mentioned)
- dietaryRestrictions: Array of dietary needs (if mentioned)
- accessibility: Array of accessibility needs (if mentioned)

Return a JSON object with:
{
  "criteria": { extracted criteria object },
  "confidence": number between 0-1,
  "missingInfo": ["list of important missing information"]
}"#;

/// Extracts criteria with a language model. Never fails: model and parse
/// errors become [`Extraction::failed`].
pub struct LlmCriteriaExtractor {
    llm: Arc<dyn LlmClient>,
}

impl LlmCriteriaExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CriteriaExtractor for LlmCriteriaExtractor {
    async fn extract(&self, message: &str) -> Extraction {
        let request = CompletionRequest::new(EXTRACTION_PROMPT, vec![ChatMessage::user(message)])
            .with_temperature(0.1)
            .with_max_tokens(500)
            .json();

        match self.llm.complete(request).await {
            Ok(raw) => parse_extraction(&raw).unwrap_or_else(|error| {
                warn!(event_name = "extraction.unparsable", error = %error, "extraction reply was not valid JSON");
                Extraction::failed(UNPARSABLE_NOTE)
            }),
            Err(LlmError::NotConfigured(reason)) => {
                warn!(event_name = "extraction.unconfigured", reason = %reason, "criteria extraction skipped");
                Extraction::failed(UNCONFIGURED_NOTE)
            }
            Err(error) => {
                warn!(event_name = "extraction.failed", error = %error, "criteria extraction failed");
                Extraction::failed(UNPARSABLE_NOTE)
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ExtractionPayload {
    criteria: Option<CriteriaRecord>,
    confidence: Option<serde_json::Value>,
    missing_info: Option<Vec<serde_json::Value>>,
}

/// Parses a model reply, tolerating code fences and schema drift. Values that
/// do not fit the criteria schema are dropped rather than failing the reply.
pub fn parse_extraction(raw: &str) -> Result<Extraction, serde_json::Error> {
    let payload: ExtractionPayload = serde_json::from_str(strip_code_fences(raw))?;

    let mut criteria = payload.criteria.unwrap_or_default();
    criteria.normalize_activities();

    let confidence = payload
        .confidence
        .and_then(|value| match value {
            serde_json::Value::Number(number) => number.as_f64(),
            serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        })
        .unwrap_or(0.0) as f32;

    let missing_info = payload
        .missing_info
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| value.as_str().map(str::to_string))
        .collect();

    Ok(Extraction::new(criteria, confidence, missing_info))
}
