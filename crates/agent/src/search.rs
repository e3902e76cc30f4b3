//! Neural web search over the trusted travel providers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use wayfarer_core::collaborators::{DocumentSearch, SearchError};
use wayfarer_core::config::SearchConfig;
use wayfarer_core::domain::travel::RawSearchResult;
use wayfarer_core::retrieval::ProviderCatalog;

pub struct ExaSearchClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
    missing_credential: Option<String>,
    results_per_query: u32,
    lookback_days: u32,
    include_domains: Vec<String>,
}

impl ExaSearchClient {
    /// Builds the client without requiring credentials; a missing key is
    /// reported by [`DocumentSearch::check_configured`].
    pub fn from_config(config: &SearchConfig, catalog: &ProviderCatalog) -> Result<Self, SearchError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|error| SearchError::Configuration(format!("http client: {error}")))?;
        let (api_key, missing_credential) = match config.credential() {
            Ok(key) => (Some(key.clone()), None),
            Err(error) => (None, Some(error.to_string())),
        };

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            missing_credential,
            results_per_query: config.results_per_query,
            lookback_days: config.lookback_days,
            include_domains: catalog.provider_domains(),
        })
    }

    pub fn request_body(&self, query: &str, now: DateTime<Utc>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "query": query,
            "type": "neural",
            "useAutoprompt": false,
            "numResults": self.results_per_query,
            "contents": { "text": true, "highlights": true },
            "includeDomains": self.include_domains,
        });
        if self.lookback_days > 0 {
            let since = now - Duration::days(i64::from(self.lookback_days));
            body["startPublishedDate"] =
                serde_json::json!(since.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    highlights: Option<Vec<String>>,
}

impl From<WireResult> for RawSearchResult {
    fn from(wire: WireResult) -> Self {
        Self {
            id: wire.id.unwrap_or_else(|| wire.url.clone()),
            title: wire.title.unwrap_or_default(),
            url: wire.url,
            published_date: wire.published_date,
            author: wire.author,
            score: wire.score.unwrap_or(0.0),
            text: wire.text.unwrap_or_default(),
            highlights: wire.highlights.unwrap_or_default(),
        }
    }
}

pub fn parse_results(raw: &str) -> Result<Vec<RawSearchResult>, SearchError> {
    let response: SearchResponse =
        serde_json::from_str(raw).map_err(|error| SearchError::Decode(error.to_string()))?;
    Ok(response.results.into_iter().map(RawSearchResult::from).collect())
}

#[async_trait]
impl DocumentSearch for ExaSearchClient {
    async fn search(&self, query: &str) -> Result<Vec<RawSearchResult>, SearchError> {
        self.check_configured()?;
        let Some(api_key) = &self.api_key else {
            return Err(SearchError::Configuration("search.api_key is not configured".to_string()));
        };

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", api_key.expose_secret())
            .json(&self.request_body(query, Utc::now()))
            .send()
            .await
            .map_err(|error| SearchError::Transport(error.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|error| SearchError::Transport(error.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(SearchError::Status { status, body: text });
        }

        let results = parse_results(&text)?;
        debug!(query, result_count = results.len(), "search query completed");
        Ok(results)
    }

    fn check_configured(&self) -> Result<(), SearchError> {
        match &self.missing_credential {
            Some(reason) => Err(SearchError::Configuration(reason.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use wayfarer_core::collaborators::{DocumentSearch, SearchError};
    use wayfarer_core::config::AppConfig;
    use wayfarer_core::retrieval::ProviderCatalog;

    use super::{parse_results, ExaSearchClient};

    fn client(api_key: Option<&str>) -> ExaSearchClient {
        let mut config = AppConfig::default().search;
        config.api_key = api_key.map(|key| key.to_string().into());
        ExaSearchClient::from_config(&config, &ProviderCatalog::builtin()).expect("client builds")
    }

    #[test]
    fn body_restricts_domains_and_lookback() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).single().expect("valid time");
        let body = client(Some("exa-key")).request_body("Lisbon hotels", now);

        assert_eq!(body["query"], "Lisbon hotels");
        assert_eq!(body["type"], "neural");
        assert_eq!(body["numResults"], 10);
        assert_eq!(body["contents"]["highlights"], true);
        assert_eq!(body["startPublishedDate"], "2025-10-19T12:00:00.000Z");
        let domains = body["includeDomains"].as_array().expect("domains");
        assert_eq!(domains.len(), 20);
        assert!(domains.iter().any(|domain| domain == "tripadvisor.com"));
    }

    #[test]
    fn nullable_wire_fields_are_defaulted() {
        let raw = r#"{"results":[
            {"url":"https://www.booking.com/hotel/x","title":null,"score":0.8,"highlights":null},
            {"id":"abc","url":"https://www.yelp.com/biz/y","title":"Y","text":"Great food"}
        ]}"#;
        let results = parse_results(raw).expect("decodes");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "https://www.booking.com/hotel/x");
        assert_eq!(results[0].title, "");
        assert!(results[0].highlights.is_empty());
        assert_eq!(results[1].score, 0.0);
        assert_eq!(results[1].text, "Great food");
    }

    #[test]
    fn undecodable_response_is_a_decode_error() {
        assert!(matches!(parse_results("<html>"), Err(SearchError::Decode(_))));
        assert!(parse_results("{}").expect("empty body decodes").is_empty());
    }

    #[tokio::test]
    async fn placeholder_key_is_a_configuration_error() {
        let search = client(Some("your_exa_api_key_here"));
        assert!(matches!(search.check_configured(), Err(SearchError::Configuration(_))));
        assert!(matches!(search.search("Rome").await, Err(SearchError::Configuration(_))));
        assert!(client(Some("exa-key")).check_configured().is_ok());
    }
}
