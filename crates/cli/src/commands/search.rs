use serde_json::json;
use wayfarer_agent::AgentRuntime;
use wayfarer_core::config::LoadOptions;
use wayfarer_core::retrieval::RetrievalError;

use crate::commands::queries::CriteriaArgs;
use crate::commands::{
    async_runtime, load_config, to_value, CommandResult, EXIT_CONFIG, EXIT_INTERNAL,
    EXIT_INVALID_INPUT, EXIT_UNAVAILABLE,
};

pub fn run(options: &LoadOptions, args: &CriteriaArgs) -> CommandResult {
    let config = match load_config("search", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let criteria = match args.to_criteria() {
        Ok(criteria) => criteria,
        Err(message) => {
            return CommandResult::failure("search", "invalid_input", message, EXIT_INVALID_INPUT)
        }
    };
    let retrieval = match AgentRuntime::builder(&config) {
        Ok(builder) => builder.retrieval(),
        Err(error) => {
            return CommandResult::failure(
                "search",
                "runtime_build",
                format!("{error:#}"),
                EXIT_INTERNAL,
            )
        }
    };
    let runtime = match async_runtime("search") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(retrieval.retrieve(&criteria)) {
        Ok(outcome) => {
            let items = match to_value("search", &outcome.items) {
                Ok(items) => items,
                Err(failure) => return failure,
            };
            let failures: Vec<_> = outcome
                .report
                .failures
                .iter()
                .map(|failure| json!({ "query": failure.query, "reason": failure.reason.to_string() }))
                .collect();
            CommandResult::success_with_data(
                "search",
                format!(
                    "{} items from {} queries ({} failed, {} rejected)",
                    outcome.items.len(),
                    outcome.report.queries.len(),
                    outcome.report.failures.len(),
                    outcome.report.rejected_count,
                ),
                json!({
                    "queries": outcome.report.queries,
                    "failures": failures,
                    "items": items,
                }),
            )
        }
        Err(error @ RetrievalError::Configuration(_)) => {
            CommandResult::failure("search", "credential_missing", error.to_string(), EXIT_CONFIG)
        }
        Err(error @ RetrievalError::AllQueriesFailed { .. }) => CommandResult::failure(
            "search",
            "service_unavailable",
            error.to_string(),
            EXIT_UNAVAILABLE,
        ),
    }
}
