use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collaborators::{DocumentSearch, SearchError};
use crate::domain::criteria::CriteriaRecord;
use crate::domain::travel::{RawSearchResult, TravelItem};
use crate::retrieval::catalog::ProviderCatalog;
use crate::retrieval::classifier::ContentClassifier;
use crate::retrieval::planner::{QueryPlanner, DEFAULT_MAX_ACTIVITY_QUERIES};

pub const DEFAULT_MAX_RESULTS: usize = 30;
pub const DEFAULT_PER_QUERY_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievalSettings {
    pub max_results: usize,
    pub per_query_timeout: Duration,
    /// When set, queries still running at the deadline are abandoned.
    pub batch_timeout: Option<Duration>,
    pub max_activity_queries: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            per_query_timeout: DEFAULT_PER_QUERY_TIMEOUT,
            batch_timeout: None,
            max_activity_queries: DEFAULT_MAX_ACTIVITY_QUERIES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryFailureReason {
    Search(SearchError),
    TimedOut,
    BatchDeadline,
}

impl fmt::Display for QueryFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search(error) => write!(f, "{error}"),
            Self::TimedOut => f.write_str("query timed out"),
            Self::BatchDeadline => f.write_str("batch deadline reached before the query finished"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryFailure {
    pub query: String,
    pub reason: QueryFailureReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetrievalReport {
    pub queries: Vec<String>,
    pub failures: Vec<QueryFailure>,
    pub raw_count: usize,
    pub unique_count: usize,
    pub rejected_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalOutcome {
    pub items: Vec<TravelItem>,
    pub report: RetrievalReport,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("document search is not configured: {0}")]
    Configuration(String),
    #[error("all {attempted} search queries failed")]
    AllQueriesFailed { attempted: usize, failures: Vec<QueryFailure> },
}

type QueryOutcome = Result<Vec<RawSearchResult>, QueryFailureReason>;

/// Fans planned queries out over [`DocumentSearch`] and folds the answers into
/// a ranked, deduplicated list of travel items.
#[derive(Clone)]
pub struct RetrievalAggregator {
    search: Arc<dyn DocumentSearch>,
    catalog: Arc<ProviderCatalog>,
    settings: RetrievalSettings,
}

impl RetrievalAggregator {
    pub fn new(
        search: Arc<dyn DocumentSearch>,
        catalog: Arc<ProviderCatalog>,
        settings: RetrievalSettings,
    ) -> Self {
        Self { search, catalog, settings }
    }

    pub fn plan(&self, criteria: &CriteriaRecord) -> Vec<String> {
        QueryPlanner::new(&self.catalog)
            .with_max_activity_queries(self.settings.max_activity_queries)
            .plan(criteria)
    }

    pub async fn retrieve(
        &self,
        criteria: &CriteriaRecord,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        self.search
            .check_configured()
            .map_err(|error| RetrievalError::Configuration(error.to_string()))?;

        let queries = self.plan(criteria);
        let slots = self.run_queries(&queries).await;

        let mut raw = Vec::new();
        let mut failures = Vec::new();
        for (query, slot) in queries.iter().zip(slots) {
            match slot {
                Some(Ok(results)) => raw.extend(results),
                Some(Err(reason)) => {
                    warn!(
                        event_name = "retrieval.query_failed",
                        query = %query,
                        reason = %reason,
                        "search query failed"
                    );
                    failures.push(QueryFailure { query: query.clone(), reason });
                }
                None => failures.push(QueryFailure {
                    query: query.clone(),
                    reason: QueryFailureReason::BatchDeadline,
                }),
            }
        }

        if let Some(error) = failures.iter().find_map(|failure| match &failure.reason {
            QueryFailureReason::Search(error) if error.is_configuration() => Some(error),
            _ => None,
        }) {
            return Err(RetrievalError::Configuration(error.to_string()));
        }

        if failures.len() == queries.len() {
            return Err(RetrievalError::AllQueriesFailed { attempted: queries.len(), failures });
        }

        let raw_count = raw.len();
        let unique = dedup_by_url(raw);
        let unique_count = unique.len();

        let classifier = ContentClassifier::new(&self.catalog);
        let mut rejected_count = 0;
        let mut items = Vec::with_capacity(unique_count);
        for result in &unique {
            match classifier.classify(result, criteria) {
                Ok(item) => items.push(item),
                Err(rejection) => {
                    rejected_count += 1;
                    debug!(url = %result.url, %rejection, "search result rejected");
                }
            }
        }

        items.sort_by(|left, right| right.relevance.total_cmp(&left.relevance));
        items.truncate(self.settings.max_results);

        info!(
            event_name = "retrieval.batch_completed",
            queries = queries.len(),
            failed_queries = failures.len(),
            raw_count,
            unique_count,
            rejected_count,
            items = items.len(),
            "retrieval batch completed"
        );

        Ok(RetrievalOutcome {
            items,
            report: RetrievalReport { queries, failures, raw_count, unique_count, rejected_count },
        })
    }

    /// One slot per query, in query order. `None` marks a query that was
    /// still running when the batch deadline fired.
    async fn run_queries(&self, queries: &[String]) -> Vec<Option<QueryOutcome>> {
        let mut slots: Vec<Option<QueryOutcome>> = queries.iter().map(|_| None).collect();
        let per_query_timeout = self.settings.per_query_timeout;

        let mut pending = queries
            .iter()
            .enumerate()
            .map(|(index, query)| {
                let search = Arc::clone(&self.search);
                async move {
                    let outcome =
                        match tokio::time::timeout(per_query_timeout, search.search(query)).await {
                            Ok(Ok(results)) => Ok(results),
                            Ok(Err(error)) => Err(QueryFailureReason::Search(error)),
                            Err(_) => Err(QueryFailureReason::TimedOut),
                        };
                    (index, outcome)
                }
            })
            .collect::<FuturesUnordered<_>>();

        // A deadline past the clock's range behaves like no deadline.
        let deadline = self
            .settings
            .batch_timeout
            .and_then(|timeout| tokio::time::Instant::now().checked_add(timeout));

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            event_name = "retrieval.batch_deadline",
                            unfinished = pending.len(),
                            "batch deadline reached, continuing with completed queries"
                        );
                        break;
                    }
                },
                None => pending.next().await,
            };

            let Some((index, outcome)) = next else {
                break;
            };
            slots[index] = Some(outcome);
        }

        slots
    }
}

fn dedup_by_url(results: Vec<RawSearchResult>) -> Vec<RawSearchResult> {
    let mut seen = HashSet::new();
    results.into_iter().filter(|result| seen.insert(result.url.clone())).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{QueryFailureReason, RetrievalAggregator, RetrievalError, RetrievalSettings};
    use crate::collaborators::{DocumentSearch, SearchError};
    use crate::domain::criteria::CriteriaRecord;
    use crate::domain::travel::RawSearchResult;
    use crate::retrieval::catalog::ProviderCatalog;

    type Responder = dyn Fn(&str) -> Result<Vec<RawSearchResult>, SearchError> + Send + Sync;

    struct FakeSearch {
        respond: Box<Responder>,
        configured: bool,
        slow_marker: Option<&'static str>,
    }

    impl FakeSearch {
        fn new(
            respond: impl Fn(&str) -> Result<Vec<RawSearchResult>, SearchError> + Send + Sync + 'static,
        ) -> Self {
            Self { respond: Box::new(respond), configured: true, slow_marker: None }
        }
    }

    #[async_trait]
    impl DocumentSearch for FakeSearch {
        async fn search(&self, query: &str) -> Result<Vec<RawSearchResult>, SearchError> {
            if self.slow_marker.is_some_and(|marker| query.contains(marker)) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            (self.respond)(query)
        }

        fn check_configured(&self) -> Result<(), SearchError> {
            if self.configured {
                Ok(())
            } else {
                Err(SearchError::Configuration("search api key missing".to_string()))
            }
        }
    }

    fn result(id: &str, url: &str, score: f64) -> RawSearchResult {
        RawSearchResult {
            id: id.to_string(),
            title: format!("{id} hotel"),
            url: url.to_string(),
            score,
            text: "A central hotel close to the river".to_string(),
            ..RawSearchResult::default()
        }
    }

    fn aggregator(search: FakeSearch, settings: RetrievalSettings) -> RetrievalAggregator {
        RetrievalAggregator::new(Arc::new(search), Arc::new(ProviderCatalog::builtin()), settings)
    }

    fn porto() -> CriteriaRecord {
        CriteriaRecord { destination: Some("Porto".to_string()), ..CriteriaRecord::default() }
    }

    #[tokio::test]
    async fn duplicate_urls_keep_first_query_occurrence() {
        let search = FakeSearch::new(|query| {
            if query.starts_with("site:booking.com") {
                Ok(vec![result("first", "https://www.booking.com/hotel/pt/ribeira.html", 0.4)])
            } else if query.starts_with("site:airbnb.com") {
                Ok(vec![
                    result("second", "https://www.booking.com/hotel/pt/ribeira.html", 0.9),
                    result("other", "https://www.airbnb.com/rooms/1", 0.5),
                ])
            } else {
                Ok(Vec::new())
            }
        });

        let outcome = aggregator(search, RetrievalSettings::default())
            .retrieve(&porto())
            .await
            .expect("retrieval succeeds");

        assert_eq!(outcome.report.raw_count, 3);
        assert_eq!(outcome.report.unique_count, 2);
        assert_eq!(outcome.items.len(), 2);
        let ribeira = outcome
            .items
            .iter()
            .find(|item| item.url.contains("ribeira"))
            .expect("deduplicated item");
        assert_eq!(ribeira.id, "first");
        assert_eq!(outcome.items[0].id, "other");
    }

    #[tokio::test]
    async fn items_are_ranked_by_score_and_truncated() {
        let search = FakeSearch::new(|query| {
            let slug = query.split_whitespace().next().unwrap_or_default().replace("site:", "");
            Ok(vec![
                result("low", &format!("https://www.tripadvisor.com/{slug}/low"), 0.1),
                result("high", &format!("https://www.tripadvisor.com/{slug}/high"), 0.9),
            ])
        });
        let settings = RetrievalSettings { max_results: 5, ..RetrievalSettings::default() };

        let outcome = aggregator(search, settings).retrieve(&porto()).await.expect("retrieval succeeds");

        assert_eq!(outcome.items.len(), 5);
        assert!(outcome.items.iter().all(|item| item.id == "high"));
        assert!(outcome.items.windows(2).all(|pair| pair[0].relevance >= pair[1].relevance));
    }

    #[tokio::test]
    async fn partial_failures_are_recorded_and_skipped() {
        let search = FakeSearch::new(|query| {
            if query.starts_with("site:yelp.com") {
                Err(SearchError::Status { status: 503, body: "busy".to_string() })
            } else if query.starts_with("site:booking.com") {
                Ok(vec![result("ok", "https://www.booking.com/hotel/pt/a.html", 0.7)])
            } else {
                Ok(Vec::new())
            }
        });

        let outcome = aggregator(search, RetrievalSettings::default())
            .retrieve(&porto())
            .await
            .expect("one failing query is tolerated");

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.report.failures.len(), 1);
        assert!(outcome.report.failures[0].query.starts_with("site:yelp.com"));
    }

    #[tokio::test]
    async fn every_query_failing_fails_the_batch() {
        let search =
            FakeSearch::new(|_| Err(SearchError::Transport("connection refused".to_string())));

        let error = aggregator(search, RetrievalSettings::default())
            .retrieve(&porto())
            .await
            .expect_err("batch must fail");

        assert!(matches!(error, RetrievalError::AllQueriesFailed { attempted: 16, .. }));
    }

    #[tokio::test]
    async fn missing_configuration_is_fatal_before_any_query() {
        let mut search = FakeSearch::new(|_| panic!("no query may run"));
        search.configured = false;

        let error = aggregator(search, RetrievalSettings::default())
            .retrieve(&porto())
            .await
            .expect_err("configuration failure");

        assert!(matches!(error, RetrievalError::Configuration(_)));
    }

    #[tokio::test]
    async fn configuration_error_from_a_query_is_fatal() {
        let search = FakeSearch::new(|query| {
            if query.starts_with("site:kayak.com") {
                Err(SearchError::Configuration("key revoked".to_string()))
            } else {
                Ok(Vec::new())
            }
        });

        let error = aggregator(search, RetrievalSettings::default())
            .retrieve(&porto())
            .await
            .expect_err("configuration failure");

        assert_eq!(error, RetrievalError::Configuration("document search is not configured: key revoked".to_string()));
    }

    #[tokio::test]
    async fn slow_queries_time_out_individually() {
        let mut search = FakeSearch::new(|query| {
            Ok(vec![result(query, &format!("https://www.booking.com/{}", query.len()), 0.5)])
        });
        search.slow_marker = Some("site:fodors.com");
        let settings = RetrievalSettings {
            per_query_timeout: Duration::from_millis(50),
            ..RetrievalSettings::default()
        };

        let outcome = aggregator(search, settings).retrieve(&porto()).await.expect("retrieval succeeds");

        assert_eq!(outcome.report.failures.len(), 1);
        assert_eq!(outcome.report.failures[0].reason, QueryFailureReason::TimedOut);
    }

    #[tokio::test]
    async fn batch_deadline_abandons_unfinished_queries() {
        let mut search = FakeSearch::new(|_| {
            Ok(vec![result("guide", "https://www.lonelyplanet.com/portugal/porto", 0.5)])
        });
        search.slow_marker = Some("site:frommers.com");
        let settings = RetrievalSettings {
            batch_timeout: Some(Duration::from_millis(100)),
            ..RetrievalSettings::default()
        };

        let outcome = aggregator(search, settings).retrieve(&porto()).await.expect("retrieval succeeds");

        assert_eq!(outcome.report.failures.len(), 1);
        assert_eq!(outcome.report.failures[0].reason, QueryFailureReason::BatchDeadline);
        assert_eq!(outcome.items.len(), 1);
    }

    #[tokio::test]
    async fn unrepresentable_batch_deadline_runs_without_one() {
        let search = FakeSearch::new(|_| {
            Ok(vec![result("guide", "https://www.lonelyplanet.com/portugal/porto", 0.5)])
        });
        let settings = RetrievalSettings {
            batch_timeout: Some(Duration::from_secs(u64::MAX)),
            ..RetrievalSettings::default()
        };

        let outcome = aggregator(search, settings).retrieve(&porto()).await.expect("retrieval succeeds");

        assert!(outcome.report.failures.is_empty());
        assert_eq!(outcome.items.len(), 1);
    }

    #[tokio::test]
    async fn non_travel_results_are_counted_as_rejected() {
        let search = FakeSearch::new(|query| {
            if query.starts_with("site:booking.com") {
                Ok(vec![RawSearchResult {
                    id: "spam".to_string(),
                    title: "Win a prize".to_string(),
                    url: "https://spam.example/win".to_string(),
                    text: "Click here".to_string(),
                    ..RawSearchResult::default()
                }])
            } else {
                Ok(Vec::new())
            }
        });

        let outcome = aggregator(search, RetrievalSettings::default())
            .retrieve(&porto())
            .await
            .expect("retrieval succeeds");

        assert!(outcome.items.is_empty());
        assert_eq!(outcome.report.rejected_count, 1);
    }
}
