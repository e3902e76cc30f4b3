use std::fmt;

use url::Url;

use crate::domain::criteria::CriteriaRecord;
use crate::domain::travel::{RawSearchResult, TravelCategory, TravelItem};
use crate::retrieval::catalog::{host_matches, ProviderCatalog};
use crate::retrieval::extract;

pub const UNKNOWN_SOURCE: &str = "Unknown Source";
pub const UNSPECIFIED_LOCATION: &str = "Location not specified";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    UnparsableUrl(String),
    UntrustedHost(String),
    NoTravelVocabulary,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparsableUrl(url) => write!(f, "url `{url}` could not be parsed"),
            Self::UntrustedHost(host) => write!(f, "host `{host}` is not an allowed provider"),
            Self::NoTravelVocabulary => f.write_str("no travel vocabulary in title or text"),
        }
    }
}

/// Decides whether a raw result is travel content and, if so, turns it into
/// a [`TravelItem`].
#[derive(Clone, Copy, Debug)]
pub struct ContentClassifier<'a> {
    catalog: &'a ProviderCatalog,
}

impl<'a> ContentClassifier<'a> {
    pub fn new(catalog: &'a ProviderCatalog) -> Self {
        Self { catalog }
    }

    pub fn classify(
        &self,
        raw: &RawSearchResult,
        criteria: &CriteriaRecord,
    ) -> Result<TravelItem, Rejection> {
        let host = parse_host(&raw.url).ok_or_else(|| Rejection::UnparsableUrl(raw.url.clone()))?;
        if !self.catalog.is_allowed_host(&host) {
            return Err(Rejection::UntrustedHost(host));
        }
        if !self.mentions_travel(raw) {
            return Err(Rejection::NoTravelVocabulary);
        }

        Ok(TravelItem {
            id: raw.id.clone(),
            title: raw.title.trim().to_string(),
            description: extract::build_description(&raw.highlights, &raw.text),
            url: raw.url.clone(),
            source: self.source_label(&raw.url),
            category: self.categorize(&host, &raw.text),
            location: criteria.destination().unwrap_or(UNSPECIFIED_LOCATION).to_string(),
            relevance: raw.score,
            rating: extract::extract_rating(&raw.text),
            price_range: extract::extract_price_range(&raw.text),
            address: extract::extract_address(&raw.text),
            hours: extract::extract_hours(&raw.text),
            contact: extract::extract_contact(&raw.text),
        })
    }

    fn mentions_travel(&self, raw: &RawSearchResult) -> bool {
        let title = raw.title.to_lowercase();
        let text = raw.text.to_lowercase();
        self.catalog
            .travel_vocabulary
            .iter()
            .map(|token| token.to_lowercase())
            .any(|token| title.contains(&token) || text.contains(&token))
    }

    /// First matching rule wins; unmatched content is an attraction.
    pub fn categorize(&self, host: &str, text: &str) -> TravelCategory {
        let text = text.to_lowercase();
        self.catalog
            .category_rules
            .iter()
            .find(|rule| {
                rule.domains.iter().any(|domain| host_matches(host, domain))
                    || rule.keywords.iter().any(|keyword| text.contains(&keyword.to_lowercase()))
            })
            .map(|rule| rule.category)
            .unwrap_or(TravelCategory::Attraction)
    }

    pub fn source_label(&self, url: &str) -> String {
        let Some(host) = parse_host(url) else {
            return UNKNOWN_SOURCE.to_string();
        };
        let host = host.strip_prefix("www.").unwrap_or(&host);

        if let Some(label) = self.catalog.label_for_host(host) {
            return label.to_string();
        }

        let first = host.split('.').next().unwrap_or_default();
        let mut chars = first.chars();
        match chars.next() {
            Some(initial) => initial.to_uppercase().chain(chars).collect(),
            None => UNKNOWN_SOURCE.to_string(),
        }
    }
}

fn parse_host(url: &str) -> Option<String> {
    Url::parse(url.trim()).ok()?.host_str().map(|host| host.to_ascii_lowercase())
}
