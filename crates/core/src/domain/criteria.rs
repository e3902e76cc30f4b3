use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Interests the extractor is allowed to report.
pub const ACTIVITY_VOCABULARY: &[&str] = &[
    "food",
    "culture",
    "adventure",
    "relaxation",
    "nightlife",
    "shopping",
    "nature",
    "history",
    "art",
    "sports",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelStyle {
    Luxury,
    Budget,
    Adventure,
    Family,
    Romantic,
    Business,
    Cultural,
    Relaxation,
}

impl TravelStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Luxury => "luxury",
            Self::Budget => "budget",
            Self::Adventure => "adventure",
            Self::Family => "family",
            Self::Romantic => "romantic",
            Self::Business => "business",
            Self::Cultural => "cultural",
            Self::Relaxation => "relaxation",
        }
    }
}

impl fmt::Display for TravelStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TravelStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "luxury" => Ok(Self::Luxury),
            "budget" => Ok(Self::Budget),
            "adventure" => Ok(Self::Adventure),
            "family" => Ok(Self::Family),
            "romantic" => Ok(Self::Romantic),
            "business" => Ok(Self::Business),
            "cultural" => Ok(Self::Cultural),
            "relaxation" => Ok(Self::Relaxation),
            other => Err(format!("unknown travel style `{other}`")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccommodationType {
    Hotel,
    Airbnb,
    Resort,
    Hostel,
    Boutique,
    Luxury,
}

impl AccommodationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hotel => "hotel",
            Self::Airbnb => "airbnb",
            Self::Resort => "resort",
            Self::Hostel => "hostel",
            Self::Boutique => "boutique",
            Self::Luxury => "luxury",
        }
    }
}

impl FromStr for AccommodationType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hotel" => Ok(Self::Hotel),
            "airbnb" => Ok(Self::Airbnb),
            "resort" => Ok(Self::Resort),
            "hostel" => Ok(Self::Hostel),
            "boutique" => Ok(Self::Boutique),
            "luxury" => Ok(Self::Luxury),
            other => Err(format!("unknown accommodation type `{other}`")),
        }
    }
}

/// Accumulated understanding of a trip request.
///
/// Every field is optional; the same shape doubles as the partial record an
/// extractor returns for a single message. Deserialization is lenient: values
/// that do not fit the schema (an unknown style, a date that is not
/// `YYYY-MM-DD`) are dropped instead of failing the whole record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CriteriaRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(deserialize_with = "lenient_decimal", skip_serializing_if = "Option::is_none")]
    pub budget: Option<Decimal>,
    #[serde(deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
    pub travelers: Option<u32>,
    #[serde(deserialize_with = "lenient_parse", skip_serializing_if = "Option::is_none")]
    pub travel_style: Option<TravelStyle>,
    #[serde(deserialize_with = "lenient_set", skip_serializing_if = "BTreeSet::is_empty")]
    pub activities: BTreeSet<String>,
    #[serde(deserialize_with = "lenient_parse", skip_serializing_if = "Option::is_none")]
    pub accommodation_type: Option<AccommodationType>,
    #[serde(deserialize_with = "lenient_set", skip_serializing_if = "BTreeSet::is_empty")]
    pub dietary_restrictions: BTreeSet<String>,
    #[serde(deserialize_with = "lenient_set", skip_serializing_if = "BTreeSet::is_empty")]
    pub accessibility: BTreeSet<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completeness {
    pub has_destination: bool,
    pub has_dates: bool,
    pub has_budget: bool,
    pub has_travelers: bool,
    pub has_style: bool,
    pub score: u8,
}

impl CriteriaRecord {
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref().map(str::trim).filter(|value| !value.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Keeps only activities from [`ACTIVITY_VOCABULARY`], lower-cased.
    pub fn normalize_activities(&mut self) {
        self.activities = self
            .activities
            .iter()
            .map(|activity| activity.trim().to_ascii_lowercase())
            .filter(|activity| ACTIVITY_VOCABULARY.contains(&activity.as_str()))
            .collect();
    }
}

/// Field-by-field merge. A present incoming value replaces the existing one,
/// an absent or empty one never erases it. Sets replace, they do not union.
pub fn merge(existing: &CriteriaRecord, incoming: &CriteriaRecord) -> CriteriaRecord {
    CriteriaRecord {
        destination: pick(&existing.destination, &incoming.destination, |value| {
            !value.trim().is_empty()
        }),
        start_date: incoming.start_date.or(existing.start_date),
        end_date: incoming.end_date.or(existing.end_date),
        duration: pick(&existing.duration, &incoming.duration, |value| *value > 0),
        budget: pick(&existing.budget, &incoming.budget, |value| *value > Decimal::ZERO),
        travelers: pick(&existing.travelers, &incoming.travelers, |value| *value > 0),
        travel_style: incoming.travel_style.or(existing.travel_style),
        activities: pick_set(&existing.activities, &incoming.activities),
        accommodation_type: incoming.accommodation_type.or(existing.accommodation_type),
        dietary_restrictions: pick_set(
            &existing.dietary_restrictions,
            &incoming.dietary_restrictions,
        ),
        accessibility: pick_set(&existing.accessibility, &incoming.accessibility),
    }
}

fn pick<T: Clone>(existing: &Option<T>, incoming: &Option<T>, present: fn(&T) -> bool) -> Option<T> {
    match incoming {
        Some(value) if present(value) => Some(value.clone()),
        _ => existing.clone(),
    }
}

fn pick_set(existing: &BTreeSet<String>, incoming: &BTreeSet<String>) -> BTreeSet<String> {
    if incoming.is_empty() {
        existing.clone()
    } else {
        incoming.clone()
    }
}

pub fn completeness(criteria: &CriteriaRecord) -> Completeness {
    let has_destination = criteria.destination().is_some();
    let has_dates = criteria.start_date.is_some() || criteria.duration.is_some_and(|days| days > 0);
    let has_budget = criteria.budget.is_some_and(|budget| budget > Decimal::ZERO);
    let has_travelers = criteria.travelers.is_some_and(|count| count > 0);
    let has_style = criteria.travel_style.is_some();

    let score = [has_destination, has_dates, has_budget, has_travelers, has_style]
        .into_iter()
        .filter(|signal| *signal)
        .count() as u8;

    Completeness { has_destination, has_dates, has_budget, has_travelers, has_style, score }
}

/// The single follow-up question worth asking next, most important gap first.
pub fn next_question(criteria: &CriteriaRecord) -> Option<&'static str> {
    let signals = completeness(criteria);
    if !signals.has_destination {
        Some("Where would you like to travel?")
    } else if !signals.has_dates {
        Some("When are you planning to travel?")
    } else if !signals.has_travelers {
        Some("How many people are traveling?")
    } else if !signals.has_budget {
        Some("What's your budget for this trip?")
    } else if !signals.has_style {
        Some("What kind of travel experience are you looking for?")
    } else if criteria.activities.is_empty() {
        Some("What activities interest you most?")
    } else {
        None
    }
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(|value| {
        let value = value.trim();
        let date_part = value.get(..10).unwrap_or(value);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|value| *value >= 0.0).map(|value| value.round() as u64))
            .and_then(|value| u32::try_from(value).ok()),
        Some(serde_json::Value::String(text)) => text.trim().parse::<u32>().ok(),
        _ => None,
    })
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(number)) => number.to_string().parse::<Decimal>().ok(),
        Some(serde_json::Value::String(text)) => {
            text.trim().trim_start_matches('$').replace(',', "").parse::<Decimal>().ok()
        }
        _ => None,
    })
}

fn lenient_parse<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(|value| value.parse::<T>().ok()))
}

fn lenient_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let values = match raw {
        Some(serde_json::Value::Array(values)) => values,
        Some(serde_json::Value::String(value)) => vec![serde_json::Value::String(value)],
        _ => Vec::new(),
    };
    Ok(values
        .iter()
        .filter_map(serde_json::Value::as_str)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect())
}
