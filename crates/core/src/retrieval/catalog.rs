//! Provider catalog: the configurable data behind query planning and
//! classification.
//!
//! The planner and the classifier never name a provider domain in their own
//! control flow. Everything domain-specific (which sites to search, how to
//! phrase a query for each of them, which hosts count as travel content, which
//! cues map to which category, and how to label a host) lives here so that a
//! deployment can add or swap providers through a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::travel::TravelCategory;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub domain: String,
    pub label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchIntent {
    Accommodation,
    Dining,
    Attractions,
    Guides,
    Transportation,
    /// Rendered once per activity of interest.
    Interest,
    /// Rendered only when the trip duration is known.
    Duration,
}

/// A query phrasing. Placeholders: `{destination}`, `{budget_tier}`,
/// `{style}`, `{activity}`, `{duration_label}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTemplate {
    pub intent: SearchIntent,
    pub template: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: TravelCategory,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCatalog {
    pub providers: Vec<Provider>,
    pub travel_vocabulary: Vec<String>,
    /// Checked in order, first match wins.
    pub category_rules: Vec<CategoryRule>,
    pub query_templates: Vec<QueryTemplate>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read provider catalog `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse provider catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("provider catalog is invalid: {0}")]
    Validation(String),
}

impl ProviderCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CatalogError> {
        let catalog = toml::from_str::<Self>(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.providers.is_empty() {
            return Err(CatalogError::Validation("at least one provider is required".to_string()));
        }
        if self.travel_vocabulary.is_empty() {
            return Err(CatalogError::Validation("travel_vocabulary must not be empty".to_string()));
        }
        if !self.query_templates.iter().any(|template| is_unconditional(template.intent)) {
            return Err(CatalogError::Validation(
                "at least one query template must not depend on activities or duration"
                    .to_string(),
            ));
        }
        if let Some(provider) = self.providers.iter().find(|provider| provider.domain.trim().is_empty()) {
            return Err(CatalogError::Validation(format!(
                "provider `{}` has an empty domain",
                provider.label
            )));
        }
        Ok(())
    }

    pub fn provider_domains(&self) -> Vec<String> {
        self.providers.iter().map(|provider| provider.domain.clone()).collect()
    }

    pub fn is_allowed_host(&self, host: &str) -> bool {
        self.providers.iter().any(|provider| host_matches(host, &provider.domain))
    }

    pub fn label_for_host(&self, host: &str) -> Option<&str> {
        self.providers
            .iter()
            .find(|provider| host_matches(host, &provider.domain))
            .map(|provider| provider.label.as_str())
    }

    pub fn templates_for(&self, intent: SearchIntent) -> impl Iterator<Item = &QueryTemplate> {
        self.query_templates.iter().filter(move |template| template.intent == intent)
    }

    pub fn builtin() -> Self {
        let providers = [
            ("tripadvisor.com", "TripAdvisor"),
            ("booking.com", "Booking.com"),
            ("airbnb.com", "Airbnb"),
            ("expedia.com", "Expedia"),
            ("hotels.com", "Hotels.com"),
            ("yelp.com", "Yelp"),
            ("timeout.com", "Time Out"),
            ("lonelyplanet.com", "Lonely Planet"),
            ("fodors.com", "Fodors"),
            ("frommers.com", "Frommers"),
            ("viator.com", "Viator"),
            ("getyourguide.com", "GetYourGuide"),
            ("klook.com", "Klook"),
            ("tiqets.com", "Tiqets"),
            ("opentable.com", "OpenTable"),
            ("resy.com", "Resy"),
            ("zomato.com", "Zomato"),
            ("kayak.com", "Kayak"),
            ("skyscanner.com", "Skyscanner"),
            ("rome2rio.com", "Rome2rio"),
        ]
        .into_iter()
        .map(|(domain, label)| Provider { domain: domain.to_string(), label: label.to_string() })
        .collect();

        let travel_vocabulary = [
            "hotel",
            "restaurant",
            "attraction",
            "tour",
            "activity",
            "travel",
            "visit",
            "guide",
            "booking",
            "reservation",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let category_rules = vec![
            rule(
                TravelCategory::Accommodation,
                &["booking.com", "hotels.com", "airbnb.com"],
                &["hotel", "accommodation", "stay"],
            ),
            rule(
                TravelCategory::Restaurant,
                &["yelp.com", "opentable.com", "resy.com"],
                &["restaurant", "dining", "food"],
            ),
            rule(
                TravelCategory::Activity,
                &["viator.com", "getyourguide.com", "klook.com"],
                &["tour", "activity", "experience"],
            ),
            rule(
                TravelCategory::Transportation,
                &["kayak.com", "skyscanner.com", "rome2rio.com"],
                &["flight", "transport"],
            ),
        ];

        use SearchIntent::{
            Accommodation, Attractions, Dining, Duration, Guides, Interest, Transportation,
        };
        let query_templates = [
            (Accommodation, r#"site:booking.com "{destination}" hotels {budget_tier} {style}"#),
            (Accommodation, r#"site:airbnb.com "{destination}" {style} accommodation"#),
            (Accommodation, r#"site:hotels.com "{destination}" {budget_tier} hotels"#),
            (Dining, r#"site:tripadvisor.com "{destination}" restaurants best food"#),
            (Dining, r#"site:yelp.com "{destination}" restaurants dining"#),
            (Dining, r#"site:opentable.com "{destination}" restaurants reservations"#),
            (Dining, r#"site:timeout.com "{destination}" best restaurants food guide"#),
            (Attractions, r#"site:tripadvisor.com "{destination}" things to do attractions"#),
            (Attractions, r#"site:viator.com "{destination}" tours activities"#),
            (Attractions, r#"site:getyourguide.com "{destination}" attractions tours"#),
            (Attractions, r#"site:klook.com "{destination}" activities experiences"#),
            (Guides, r#"site:lonelyplanet.com "{destination}" travel guide"#),
            (Guides, r#"site:fodors.com "{destination}" travel guide"#),
            (Guides, r#"site:frommers.com "{destination}" travel guide"#),
            (Transportation, r#"site:kayak.com flights to "{destination}""#),
            (Transportation, r#"site:rome2rio.com "{destination}" transportation"#),
            (Interest, r#"site:tripadvisor.com "{destination}" "{activity}" activities"#),
            (Interest, r#"site:viator.com "{destination}" "{activity}" tours"#),
            (Duration, r#""{destination}" {duration_label} itinerary guide"#),
            (Duration, r#"site:timeout.com "{destination}" {duration_label} guide"#),
        ]
        .into_iter()
        .map(|(intent, template)| QueryTemplate { intent, template: template.to_string() })
        .collect();

        Self { providers, travel_vocabulary, category_rules, query_templates }
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn rule(category: TravelCategory, domains: &[&str], keywords: &[&str]) -> CategoryRule {
    CategoryRule {
        category,
        domains: domains.iter().map(|domain| domain.to_string()).collect(),
        keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
    }
}

fn is_unconditional(intent: SearchIntent) -> bool {
    !matches!(intent, SearchIntent::Interest | SearchIntent::Duration)
}

/// `host` equals `domain` or is one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.trim().to_ascii_lowercase();
    host == domain || host.strip_suffix(&domain).is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::{host_matches, CatalogError, ProviderCatalog, SearchIntent};
    use crate::domain::travel::TravelCategory;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = ProviderCatalog::builtin();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.providers.len(), 20);
        assert_eq!(catalog.templates_for(SearchIntent::Accommodation).count(), 3);
        assert_eq!(catalog.templates_for(SearchIntent::Dining).count(), 4);
        assert_eq!(catalog.templates_for(SearchIntent::Attractions).count(), 4);
        assert_eq!(catalog.templates_for(SearchIntent::Guides).count(), 3);
        assert_eq!(catalog.templates_for(SearchIntent::Transportation).count(), 2);
        assert_eq!(catalog.category_rules[0].category, TravelCategory::Accommodation);
    }

    #[test]
    fn host_matching_accepts_subdomains_only() {
        assert!(host_matches("booking.com", "booking.com"));
        assert!(host_matches("www.booking.com", "booking.com"));
        assert!(host_matches("en.tripadvisor.com", "tripadvisor.com"));
        assert!(!host_matches("notbooking.com", "booking.com"));
        assert!(!host_matches("booking.com.evil.io", "booking.com"));
    }

    #[test]
    fn labels_resolve_through_subdomains() {
        let catalog = ProviderCatalog::builtin();
        assert_eq!(catalog.label_for_host("www.timeout.com"), Some("Time Out"));
        assert_eq!(catalog.label_for_host("example.org"), None);
        assert!(catalog.is_allowed_host("m.yelp.com"));
        assert!(!catalog.is_allowed_host("example.org"));
    }

    #[test]
    fn catalog_loads_from_toml() {
        let catalog = ProviderCatalog::from_toml_str(
            r#"
travel_vocabulary = ["hotel", "tour"]

[[providers]]
domain = "hostelworld.com"
label = "Hostelworld"

[[category_rules]]
category = "accommodation"
domains = ["hostelworld.com"]
keywords = ["hostel"]

[[query_templates]]
intent = "accommodation"
template = 'site:hostelworld.com "{destination}" hostels'
"#,
        )
        .expect("catalog should parse");

        assert_eq!(catalog.provider_domains(), vec!["hostelworld.com".to_string()]);
        assert_eq!(catalog.query_templates.len(), 1);
    }

    #[test]
    fn catalog_without_unconditional_templates_is_rejected() {
        let error = ProviderCatalog::from_toml_str(
            r#"
travel_vocabulary = ["hotel"]

[[providers]]
domain = "viator.com"
label = "Viator"

[[query_templates]]
intent = "interest"
template = 'site:viator.com "{destination}" "{activity}" tours'
"#,
        )
        .expect_err("catalog should be rejected");

        assert!(matches!(error, CatalogError::Validation(_)));
    }
}
