use std::env;
use std::fs;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use toml::Value;
use wayfarer_core::config::{resolve_config_path, usable_secret, AppConfig, LoadOptions};

struct Field<'a> {
    key: &'static str,
    value: String,
    env_keys: &'a [&'a str],
    overridden: bool,
}

impl<'a> Field<'a> {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'a [&'a str]) -> Self {
        Self { key, value: value.into(), env_keys, overridden: false }
    }

    fn overridden_by_flag(mut self, overridden: bool) -> Self {
        self.overridden = overridden;
        self
    }
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let overrides = &options.overrides;

    let fields = effective_fields(&config, overrides);
    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in fields {
        let source = field_source(
            &field,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(
    config: &AppConfig,
    overrides: &wayfarer_core::config::ConfigOverrides,
) -> Vec<Field<'static>> {
    let optional = |value: Option<String>| value.unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field::new("database.url", config.database.url.clone(), &["WAYFARER_DATABASE_URL"])
            .overridden_by_flag(overrides.database_url.is_some()),
        Field::new(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["WAYFARER_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["WAYFARER_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new("llm.provider", config.llm.provider.as_str(), &["WAYFARER_LLM_PROVIDER"])
            .overridden_by_flag(overrides.llm_provider.is_some()),
        Field::new("llm.model", config.llm.model.clone(), &["WAYFARER_LLM_MODEL"])
            .overridden_by_flag(overrides.llm_model.is_some()),
        Field::new("llm.base_url", config.llm.effective_base_url(), &["WAYFARER_LLM_BASE_URL"])
            .overridden_by_flag(overrides.llm_base_url.is_some()),
        Field::new(
            "llm.api_key",
            redact_secret(config.llm.api_key.as_ref()),
            &["WAYFARER_LLM_API_KEY", "OPENAI_API_KEY"],
        ),
        Field::new(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["WAYFARER_LLM_TIMEOUT_SECS"],
        ),
        Field::new(
            "llm.max_retries",
            config.llm.max_retries.to_string(),
            &["WAYFARER_LLM_MAX_RETRIES"],
        ),
        Field::new("search.base_url", config.search.base_url.clone(), &["WAYFARER_SEARCH_BASE_URL"]),
        Field::new(
            "search.api_key",
            redact_secret(config.search.api_key.as_ref()),
            &["WAYFARER_SEARCH_API_KEY", "EXASEARCH_API_KEY"],
        ),
        Field::new(
            "search.results_per_query",
            config.search.results_per_query.to_string(),
            &["WAYFARER_SEARCH_RESULTS_PER_QUERY"],
        ),
        Field::new(
            "search.lookback_days",
            config.search.lookback_days.to_string(),
            &["WAYFARER_SEARCH_LOOKBACK_DAYS"],
        ),
        Field::new(
            "search.timeout_secs",
            config.search.timeout_secs.to_string(),
            &["WAYFARER_SEARCH_TIMEOUT_SECS"],
        ),
        Field::new(
            "search.catalog_path",
            optional(config.search.catalog_path.as_ref().map(|path| path.display().to_string())),
            &["WAYFARER_SEARCH_CATALOG_PATH"],
        )
        .overridden_by_flag(overrides.search_catalog_path.is_some()),
        Field::new(
            "retrieval.max_results",
            config.retrieval.max_results.to_string(),
            &["WAYFARER_RETRIEVAL_MAX_RESULTS"],
        )
        .overridden_by_flag(overrides.retrieval_max_results.is_some()),
        Field::new(
            "retrieval.per_query_timeout_secs",
            config.retrieval.per_query_timeout_secs.to_string(),
            &["WAYFARER_RETRIEVAL_PER_QUERY_TIMEOUT_SECS"],
        ),
        Field::new(
            "retrieval.batch_timeout_secs",
            optional(config.retrieval.batch_timeout_secs.map(|secs| secs.to_string())),
            &["WAYFARER_RETRIEVAL_BATCH_TIMEOUT_SECS"],
        ),
        Field::new(
            "retrieval.max_activity_queries",
            config.retrieval.max_activity_queries.to_string(),
            &["WAYFARER_RETRIEVAL_MAX_ACTIVITY_QUERIES"],
        ),
        Field::new(
            "conversation.min_history_before_generation",
            config.conversation.min_history_before_generation.to_string(),
            &["WAYFARER_CONVERSATION_MIN_HISTORY_BEFORE_GENERATION"],
        ),
        Field::new(
            "conversation.min_criteria_score",
            config.conversation.min_criteria_score.to_string(),
            &["WAYFARER_CONVERSATION_MIN_CRITERIA_SCORE"],
        ),
        Field::new(
            "logging.level",
            config.logging.level.clone(),
            &["WAYFARER_LOGGING_LEVEL", "WAYFARER_LOG_LEVEL"],
        )
        .overridden_by_flag(overrides.log_level.is_some()),
        Field::new(
            "logging.format",
            config.logging.format.as_str(),
            &["WAYFARER_LOGGING_FORMAT", "WAYFARER_LOG_FORMAT"],
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field<'_>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if field.overridden {
        return "flag".to_string();
    }

    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    if usable_secret(Some(secret)).is_none() {
        return "<placeholder>".to_string();
    }

    let exposed = secret.expose_secret().trim(); // ubs:ignore
    if let Some((prefix, _)) = exposed.split_once('-') {
        if prefix.len() <= 4 {
            return format!("{prefix}-***");
        }
    }

    "<redacted>".to_string()
}
