use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::states::GenerationGate;
use crate::retrieval::{CatalogError, ProviderCatalog, RetrievalSettings};

/// Files probed, in order, when no explicit config path is given.
pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["wayfarer.toml", "config/wayfarer.toml"];

/// Values shipped in sample env files that must never be sent to a provider.
pub const PLACEHOLDER_SECRETS: [&str; 2] = ["your_openai_api_key_here", "your_exa_api_key_here"];

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.exa.ai";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub retrieval: RetrievalConfig,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub results_per_query: u32,
    pub lookback_days: u32,
    pub timeout_secs: u64,
    pub catalog_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    pub max_results: usize,
    pub per_query_timeout_secs: u64,
    pub batch_timeout_secs: Option<u64>,
    pub max_activity_queries: usize,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub min_history_before_generation: usize,
    pub min_criteria_score: u8,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub search_catalog_path: Option<PathBuf>,
    pub retrieval_max_results: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
    #[error("{key} is not configured: {hint}")]
    MissingCredential { key: String, hint: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://wayfarer.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o".to_string(),
                timeout_secs: 60,
                max_retries: 2,
            },
            search: SearchConfig {
                api_key: None,
                base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
                results_per_query: 10,
                lookback_days: 365,
                timeout_secs: 20,
                catalog_path: None,
            },
            retrieval: RetrievalConfig {
                max_results: crate::retrieval::aggregator::DEFAULT_MAX_RESULTS,
                per_query_timeout_secs: 20,
                batch_timeout_secs: None,
                max_activity_queries: crate::retrieval::planner::DEFAULT_MAX_ACTIVITY_QUERIES,
            },
            conversation: ConversationConfig {
                min_history_before_generation: crate::flows::states::MIN_HISTORY_BEFORE_GENERATION,
                min_criteria_score: crate::flows::states::MIN_CRITERIA_SCORE,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

/// Present, non-blank and not a sample placeholder.
pub fn usable_secret(secret: Option<&SecretString>) -> Option<&SecretString> {
    secret.filter(|value| {
        let exposed = value.expose_secret().trim(); // ubs:ignore
        !exposed.is_empty() && !PLACEHOLDER_SECRETS.contains(&exposed)
    })
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    pub fn effective_base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) if !url.trim().is_empty() => url.trim(),
            (_, LlmProvider::OpenAi) => DEFAULT_OPENAI_BASE_URL,
            (_, LlmProvider::Ollama) => DEFAULT_OLLAMA_BASE_URL,
        }
    }

    /// OpenAI needs a real key; Ollama runs without one.
    pub fn credential(&self) -> Result<Option<&SecretString>, ConfigError> {
        match (self.provider, usable_secret(self.api_key.as_ref())) {
            (LlmProvider::OpenAi, None) => Err(ConfigError::MissingCredential {
                key: "llm.api_key".to_string(),
                hint: "set WAYFARER_LLM_API_KEY (or OPENAI_API_KEY) to a valid OpenAI key"
                    .to_string(),
            }),
            (_, key) => Ok(key),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SearchConfig {
    pub fn credential(&self) -> Result<&SecretString, ConfigError> {
        usable_secret(self.api_key.as_ref()).ok_or_else(|| ConfigError::MissingCredential {
            key: "search.api_key".to_string(),
            hint: "set WAYFARER_SEARCH_API_KEY (or EXASEARCH_API_KEY) to a valid search key"
                .to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn load_catalog(&self) -> Result<ProviderCatalog, ConfigError> {
        match &self.catalog_path {
            Some(path) => Ok(ProviderCatalog::load(path)?),
            None => Ok(ProviderCatalog::builtin()),
        }
    }
}

impl RetrievalConfig {
    pub fn settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            max_results: self.max_results,
            per_query_timeout: Duration::from_secs(self.per_query_timeout_secs),
            batch_timeout: self.batch_timeout_secs.map(Duration::from_secs),
            max_activity_queries: self.max_activity_queries,
        }
    }
}

impl ConversationConfig {
    pub fn gate(&self) -> GenerationGate {
        GenerationGate {
            min_history_before_generation: self.min_history_before_generation,
            min_criteria_score: self.min_criteria_score,
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options
                .config_path
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value)); // ubs:ignore
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(search) = patch.search {
            if let Some(search_api_key_value) = search.api_key {
                self.search.api_key = Some(secret_value(search_api_key_value)); // ubs:ignore
            }
            if let Some(base_url) = search.base_url {
                self.search.base_url = base_url;
            }
            if let Some(results_per_query) = search.results_per_query {
                self.search.results_per_query = results_per_query;
            }
            if let Some(lookback_days) = search.lookback_days {
                self.search.lookback_days = lookback_days;
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
            if let Some(catalog_path) = search.catalog_path {
                self.search.catalog_path = Some(catalog_path);
            }
        }

        if let Some(retrieval) = patch.retrieval {
            if let Some(max_results) = retrieval.max_results {
                self.retrieval.max_results = max_results;
            }
            if let Some(per_query_timeout_secs) = retrieval.per_query_timeout_secs {
                self.retrieval.per_query_timeout_secs = per_query_timeout_secs;
            }
            if let Some(batch_timeout_secs) = retrieval.batch_timeout_secs {
                self.retrieval.batch_timeout_secs = Some(batch_timeout_secs);
            }
            if let Some(max_activity_queries) = retrieval.max_activity_queries {
                self.retrieval.max_activity_queries = max_activity_queries;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(min_history) = conversation.min_history_before_generation {
                self.conversation.min_history_before_generation = min_history;
            }
            if let Some(min_score) = conversation.min_criteria_score {
                self.conversation.min_criteria_score = min_score;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("WAYFARER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("WAYFARER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("WAYFARER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("WAYFARER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("WAYFARER_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let llm_api_key = read_env("WAYFARER_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = llm_api_key {
            self.llm.api_key = Some(secret_value(value)); // ubs:ignore
        }
        if let Some(value) = read_env("WAYFARER_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("WAYFARER_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("WAYFARER_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("WAYFARER_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("WAYFARER_LLM_MAX_RETRIES", &value)?;
        }

        let search_api_key =
            read_env("WAYFARER_SEARCH_API_KEY").or_else(|| read_env("EXASEARCH_API_KEY"));
        if let Some(value) = search_api_key {
            self.search.api_key = Some(secret_value(value)); // ubs:ignore
        }
        if let Some(value) = read_env("WAYFARER_SEARCH_BASE_URL") {
            self.search.base_url = value;
        }
        if let Some(value) = read_env("WAYFARER_SEARCH_RESULTS_PER_QUERY") {
            self.search.results_per_query =
                parse_u32("WAYFARER_SEARCH_RESULTS_PER_QUERY", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_SEARCH_LOOKBACK_DAYS") {
            self.search.lookback_days = parse_u32("WAYFARER_SEARCH_LOOKBACK_DAYS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_SEARCH_TIMEOUT_SECS") {
            self.search.timeout_secs = parse_u64("WAYFARER_SEARCH_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_SEARCH_CATALOG_PATH") {
            self.search.catalog_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("WAYFARER_RETRIEVAL_MAX_RESULTS") {
            self.retrieval.max_results = parse_usize("WAYFARER_RETRIEVAL_MAX_RESULTS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_RETRIEVAL_PER_QUERY_TIMEOUT_SECS") {
            self.retrieval.per_query_timeout_secs =
                parse_u64("WAYFARER_RETRIEVAL_PER_QUERY_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_RETRIEVAL_BATCH_TIMEOUT_SECS") {
            self.retrieval.batch_timeout_secs =
                Some(parse_u64("WAYFARER_RETRIEVAL_BATCH_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = read_env("WAYFARER_RETRIEVAL_MAX_ACTIVITY_QUERIES") {
            self.retrieval.max_activity_queries =
                parse_usize("WAYFARER_RETRIEVAL_MAX_ACTIVITY_QUERIES", &value)?;
        }

        if let Some(value) = read_env("WAYFARER_CONVERSATION_MIN_HISTORY_BEFORE_GENERATION") {
            self.conversation.min_history_before_generation =
                parse_usize("WAYFARER_CONVERSATION_MIN_HISTORY_BEFORE_GENERATION", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_CONVERSATION_MIN_CRITERIA_SCORE") {
            self.conversation.min_criteria_score =
                parse_u8("WAYFARER_CONVERSATION_MIN_CRITERIA_SCORE", &value)?;
        }

        let log_level =
            read_env("WAYFARER_LOGGING_LEVEL").or_else(|| read_env("WAYFARER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("WAYFARER_LOGGING_FORMAT").or_else(|| read_env("WAYFARER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(catalog_path) = overrides.search_catalog_path {
            self.search.catalog_path = Some(catalog_path);
        }
        if let Some(max_results) = overrides.retrieval_max_results {
            self.retrieval.max_results = max_results;
        }
    }

    /// Structural checks only. Credentials are checked by the operation that
    /// needs them, see [`LlmConfig::credential`] and [`SearchConfig::credential`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_search(&self.search)?;
        validate_retrieval(&self.retrieval)?;
        validate_conversation(&self.conversation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file [`AppConfig::load`] would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

const MAX_LLM_RETRIES: u32 = 10;

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.max_retries > MAX_LLM_RETRIES {
        return Err(ConfigError::Validation(format!(
            "llm.max_retries must be in range 0..={MAX_LLM_RETRIES}"
        )));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if let Some(base_url) = &llm.base_url {
        validate_http_url("llm.base_url", base_url)?;
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    validate_http_url("search.base_url", &search.base_url)?;

    if search.results_per_query == 0 || search.results_per_query > 100 {
        return Err(ConfigError::Validation(
            "search.results_per_query must be in range 1..=100".to_string(),
        ));
    }
    if search.timeout_secs == 0 || search.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "search.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_retrieval(retrieval: &RetrievalConfig) -> Result<(), ConfigError> {
    if retrieval.max_results == 0 {
        return Err(ConfigError::Validation(
            "retrieval.max_results must be greater than zero".to_string(),
        ));
    }
    if retrieval.per_query_timeout_secs == 0 || retrieval.per_query_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "retrieval.per_query_timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if retrieval.batch_timeout_secs.is_some_and(|secs| secs == 0 || secs > 600) {
        return Err(ConfigError::Validation(
            "retrieval.batch_timeout_secs must be in range 1..=600 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.min_criteria_score > 5 {
        return Err(ConfigError::Validation(
            "conversation.min_criteria_score must be in range 0..=5".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value.trim())
        .map_err(|error| ConfigError::Validation(format!("{key} is not a valid URL: {error}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    search: Option<SearchPatch>,
    retrieval: Option<RetrievalPatch>,
    conversation: Option<ConversationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    results_per_query: Option<u32>,
    lookback_days: Option<u32>,
    timeout_secs: Option<u64>,
    catalog_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrievalPatch {
    max_results: Option<usize>,
    per_query_timeout_secs: Option<u64>,
    batch_timeout_secs: Option<u64>,
    max_activity_queries: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    min_history_before_generation: Option<usize>,
    min_criteria_score: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
// ubs:ignore
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    use secrecy::{ExposeSecret, SecretString};
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LlmConfig, LlmProvider, LoadOptions, LogFormat,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_load_without_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.retrieval.max_results == 30, "default result budget should be 30")?;
        ensure(config.retrieval.batch_timeout_secs.is_none(), "batch timeout is off by default")?;
        ensure(
            config.conversation.gate().min_history_before_generation == 6,
            "default history threshold should be 6",
        )?;
        ensure(config.conversation.gate().min_criteria_score == 4, "default score should be 4")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact logs by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_WAYFARER_SEARCH_KEY", "exa-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("wayfarer.toml");
            fs::write(
                &path,
                r#"
[search]
api_key = "${TEST_WAYFARER_SEARCH_KEY}" # ubs:ignore
results_per_query = 5

[retrieval]
batch_timeout_secs = 45
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let key = config.search.credential().map_err(|err| err.to_string())?;
            ensure(key.expose_secret() == "exa-from-env", "search key should come from env")?;
            ensure(config.search.results_per_query == 5, "results per query should be 5")?;
            ensure(
                config.retrieval.settings().batch_timeout == Some(Duration::from_secs(45)),
                "batch timeout should be loaded from file",
            )
        })();

        clear_vars(&["TEST_WAYFARER_SEARCH_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WAYFARER_LOG_LEVEL", "warn");
        env::set_var("WAYFARER_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["WAYFARER_LOG_LEVEL", "WAYFARER_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WAYFARER_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("WAYFARER_LLM_MODEL", "gpt-4o-mini");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("wayfarer.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[llm]
provider = "ollama"
model = "llama3.1"

[retrieval]
max_results = 12

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.llm.model == "gpt-4o-mini", "env model should win over file")?;
            ensure(config.llm.provider == LlmProvider::Ollama, "file provider should apply")?;
            ensure(config.retrieval.max_results == 12, "file result budget should apply")?;
            ensure(
                config.llm.effective_base_url() == "http://localhost:11434",
                "ollama should default to the local endpoint",
            )
        })();

        clear_vars(&["WAYFARER_DATABASE_URL", "WAYFARER_LLM_MODEL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WAYFARER_RETRIEVAL_MAX_RESULTS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("retrieval.max_results")
            );
            ensure(has_message, "validation failure should mention retrieval.max_results")
        })();

        clear_vars(&["WAYFARER_RETRIEVAL_MAX_RESULTS"]);
        result
    }

    #[test]
    fn out_of_range_retry_and_deadline_settings_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let cases = [
            ("WAYFARER_RETRIEVAL_BATCH_TIMEOUT_SECS", "18446744073709551615", "retrieval.batch_timeout_secs"),
            ("WAYFARER_RETRIEVAL_BATCH_TIMEOUT_SECS", "0", "retrieval.batch_timeout_secs"),
            ("WAYFARER_LLM_MAX_RETRIES", "4294967295", "llm.max_retries"),
        ];

        let result = (|| -> Result<(), String> {
            for (key, value, expected) in cases {
                env::set_var(key, value);
                let outcome = AppConfig::load(LoadOptions::default());
                env::remove_var(key);
                match outcome {
                    Err(ConfigError::Validation(message)) if message.contains(expected) => {}
                    Err(other) => return Err(format!("{key}={value}: unexpected error: {other}")),
                    Ok(_) => return Err(format!("{key}={value}: expected validation failure")),
                }
            }

            env::set_var("WAYFARER_RETRIEVAL_BATCH_TIMEOUT_SECS", "30");
            let loaded = AppConfig::load(LoadOptions::default()).map_err(|error| error.to_string())?;
            ensure(
                loaded.retrieval.batch_timeout_secs == Some(30),
                "an in-range batch deadline should load",
            )
        })();

        clear_vars(&["WAYFARER_RETRIEVAL_BATCH_TIMEOUT_SECS", "WAYFARER_LLM_MAX_RETRIES"]);
        result
    }

    #[test]
    fn malformed_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WAYFARER_SEARCH_TIMEOUT_SECS", "soon");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "WAYFARER_SEARCH_TIMEOUT_SECS", "error should name the variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected an invalid override error".to_string()),
        };

        clear_vars(&["WAYFARER_SEARCH_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn placeholder_keys_count_as_missing() -> Result<(), String> {
        let llm = LlmConfig {
            provider: LlmProvider::OpenAi,
            api_key: Some(SecretString::from("your_openai_api_key_here".to_string())),
            base_url: None,
            model: "gpt-4o".to_string(),
            timeout_secs: 30,
            max_retries: 1,
        };
        ensure(
            matches!(llm.credential(), Err(ConfigError::MissingCredential { .. })),
            "placeholder openai key must be rejected",
        )?;

        let ollama = LlmConfig { provider: LlmProvider::Ollama, api_key: None, ..llm.clone() };
        ensure(
            matches!(ollama.credential(), Ok(None)),
            "ollama runs without a key",
        )?;

        let mut config = AppConfig::default();
        config.search.api_key = Some(SecretString::from("your_exa_api_key_here".to_string()));
        ensure(config.search.credential().is_err(), "placeholder search key must be rejected")?;
        config.search.api_key = Some(SecretString::from("   ".to_string()));
        ensure(config.search.credential().is_err(), "blank search key must be rejected")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WAYFARER_LLM_API_KEY", "sk-secret-value");
        env::set_var("WAYFARER_SEARCH_API_KEY", "exa-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain llm key")?;
            ensure(
                !debug.contains("exa-secret-value"),
                "debug output should not contain search key",
            )?;
            ensure(config.llm.credential().is_ok(), "llm key should be usable")
        })();

        clear_vars(&["WAYFARER_LLM_API_KEY", "WAYFARER_SEARCH_API_KEY"]);
        result
    }
}
