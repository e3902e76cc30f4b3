use std::fmt;

use serde::{Deserialize, Serialize};

/// One document as returned by a search provider, before classification.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSearchResult {
    pub id: String,
    pub title: String,
    pub url: String,
    pub published_date: Option<String>,
    pub author: Option<String>,
    pub score: f64,
    pub text: String,
    pub highlights: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelCategory {
    Accommodation,
    Restaurant,
    Activity,
    Attraction,
    Transportation,
}

impl TravelCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accommodation => "accommodation",
            Self::Restaurant => "restaurant",
            Self::Activity => "activity",
            Self::Attraction => "attraction",
            Self::Transportation => "transportation",
        }
    }
}

impl fmt::Display for TravelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price signal found in page text. Anything that is not one of the known
/// tiers is kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PriceRange {
    Budget,
    Moderate,
    Expensive,
    Luxury,
    Raw(String),
}

impl PriceRange {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Budget => "Budget",
            Self::Moderate => "Moderate",
            Self::Expensive => "Expensive",
            Self::Luxury => "Luxury",
            Self::Raw(token) => token,
        }
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for PriceRange {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Budget" => Self::Budget,
            "Moderate" => Self::Moderate,
            "Expensive" => Self::Expensive,
            "Luxury" => Self::Luxury,
            _ => Self::Raw(value),
        }
    }
}

impl From<PriceRange> for String {
    fn from(value: PriceRange) -> Self {
        value.as_str().to_string()
    }
}

/// A classified, field-extracted search result used as itinerary material.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub category: TravelCategory,
    pub location: String,
    pub relevance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}
