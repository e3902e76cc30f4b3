use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::domain::criteria::CriteriaRecord;
use crate::retrieval::catalog::{ProviderCatalog, SearchIntent};

pub const FALLBACK_DESTINATION: &str = "popular destination";
pub const DEFAULT_MAX_ACTIVITY_QUERIES: usize = 5;

const INTENT_ORDER: [SearchIntent; 5] = [
    SearchIntent::Accommodation,
    SearchIntent::Dining,
    SearchIntent::Attractions,
    SearchIntent::Guides,
    SearchIntent::Transportation,
];

/// Turns a criteria record into provider-targeted search queries.
#[derive(Clone, Debug)]
pub struct QueryPlanner<'a> {
    catalog: &'a ProviderCatalog,
    max_activity_queries: usize,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(catalog: &'a ProviderCatalog) -> Self {
        Self { catalog, max_activity_queries: DEFAULT_MAX_ACTIVITY_QUERIES }
    }

    pub fn with_max_activity_queries(mut self, max_activity_queries: usize) -> Self {
        self.max_activity_queries = max_activity_queries;
        self
    }

    /// Deterministic and never empty for a valid catalog.
    pub fn plan(&self, criteria: &CriteriaRecord) -> Vec<String> {
        let destination = criteria.destination().unwrap_or(FALLBACK_DESTINATION);
        let style = criteria.travel_style.map(|style| style.as_str()).unwrap_or_default();
        let budget_tier = criteria.budget.map(budget_tier).unwrap_or_default();

        let mut seen = HashSet::new();
        let mut queries = Vec::new();
        let mut push = |query: String| {
            let query = collapse_whitespace(&query);
            if !query.is_empty() && seen.insert(query.clone()) {
                queries.push(query);
            }
        };

        let base = PlaceholderValues { destination, budget_tier, style, activity: "", duration_label: "" };

        for intent in INTENT_ORDER {
            for template in self.catalog.templates_for(intent) {
                push(base.render(&template.template));
            }
        }

        for activity in criteria.activities.iter().take(self.max_activity_queries) {
            let values = PlaceholderValues { activity, ..base };
            for template in self.catalog.templates_for(SearchIntent::Interest) {
                push(values.render(&template.template));
            }
        }

        if let Some(days) = criteria.duration.filter(|days| *days > 0) {
            let values = PlaceholderValues { duration_label: duration_label(days), ..base };
            for template in self.catalog.templates_for(SearchIntent::Duration) {
                push(values.render(&template.template));
            }
        }

        queries
    }
}

#[derive(Clone, Copy)]
struct PlaceholderValues<'v> {
    destination: &'v str,
    budget_tier: &'static str,
    style: &'static str,
    activity: &'v str,
    duration_label: &'static str,
}

impl PlaceholderValues<'_> {
    fn render(&self, template: &str) -> String {
        template
            .replace("{destination}", self.destination)
            .replace("{budget_tier}", self.budget_tier)
            .replace("{style}", self.style)
            .replace("{activity}", self.activity)
            .replace("{duration_label}", self.duration_label)
    }
}

pub fn budget_tier(budget: Decimal) -> &'static str {
    if budget > Decimal::from(2000) {
        "luxury"
    } else if budget > Decimal::from(1000) {
        "mid-range"
    } else {
        "budget"
    }
}

pub fn duration_label(days: u32) -> &'static str {
    match days {
        1 => "day trip",
        2..=3 => "weekend",
        4..=7 => "week",
        _ => "long trip",
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
