use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::json;
use wayfarer_core::config::LoadOptions;
use wayfarer_core::domain::criteria::{merge, AccommodationType, CriteriaRecord, TravelStyle};
use wayfarer_core::retrieval::QueryPlanner;

use crate::commands::{load_config, CommandResult, EXIT_CONFIG, EXIT_INVALID_INPUT};

/// Trip criteria given on the command line. Flags override `--criteria-json`.
#[derive(Debug, Clone, Default, Args)]
pub struct CriteriaArgs {
    #[arg(long, help = "Criteria as a JSON object using the extractor's camelCase field names")]
    pub criteria_json: Option<String>,
    #[arg(long)]
    pub destination: Option<String>,
    #[arg(long, help = "First day of the trip (YYYY-MM-DD)")]
    pub start_date: Option<NaiveDate>,
    #[arg(long, help = "Last day of the trip (YYYY-MM-DD)")]
    pub end_date: Option<NaiveDate>,
    #[arg(long, help = "Trip length in days")]
    pub duration: Option<u32>,
    #[arg(long, help = "Total budget in USD")]
    pub budget: Option<Decimal>,
    #[arg(long)]
    pub travelers: Option<u32>,
    #[arg(long, help = "luxury, budget, adventure, family, romantic, business, cultural or relaxation")]
    pub style: Option<TravelStyle>,
    #[arg(long = "activity", help = "Activity of interest; repeat for several")]
    pub activities: Vec<String>,
    #[arg(long, help = "hotel, airbnb, resort, hostel, boutique or luxury")]
    pub accommodation: Option<AccommodationType>,
}

impl CriteriaArgs {
    pub fn to_criteria(&self) -> Result<CriteriaRecord, String> {
        let base = match &self.criteria_json {
            Some(raw) => serde_json::from_str::<CriteriaRecord>(raw)
                .map_err(|error| format!("criteria JSON is invalid: {error}"))?,
            None => CriteriaRecord::default(),
        };

        let flags = CriteriaRecord {
            destination: self.destination.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            duration: self.duration,
            budget: self.budget,
            travelers: self.travelers,
            travel_style: self.style,
            activities: self.activities.iter().cloned().collect(),
            accommodation_type: self.accommodation,
            ..CriteriaRecord::default()
        };

        let mut criteria = merge(&base, &flags);
        criteria.normalize_activities();
        Ok(criteria)
    }
}

pub fn run(options: &LoadOptions, args: &CriteriaArgs) -> CommandResult {
    let config = match load_config("queries", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let criteria = match args.to_criteria() {
        Ok(criteria) => criteria,
        Err(message) => {
            return CommandResult::failure("queries", "invalid_input", message, EXIT_INVALID_INPUT)
        }
    };
    let catalog = match config.search.load_catalog() {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure("queries", "catalog", error.to_string(), EXIT_CONFIG)
        }
    };

    let queries = QueryPlanner::new(&catalog)
        .with_max_activity_queries(config.retrieval.max_activity_queries)
        .plan(&criteria);

    CommandResult::success_with_data(
        "queries",
        format!("planned {} search queries", queries.len()),
        json!({ "criteria": criteria, "queries": queries }),
    )
}
