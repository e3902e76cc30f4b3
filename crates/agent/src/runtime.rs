use std::sync::Arc;

use anyhow::{Context, Result};
use wayfarer_core::audit::{AuditSink, NoopAuditSink};
use wayfarer_core::collaborators::{ConversationStore, DocumentSearch};
use wayfarer_core::config::AppConfig;
use wayfarer_core::flows::ConversationEngine;
use wayfarer_core::retrieval::{ProviderCatalog, RetrievalAggregator};

use crate::drafter::LlmItineraryDrafter;
use crate::extractor::LlmCriteriaExtractor;
use crate::llm::{LlmClient, OpenAiChatClient};
use crate::responder::LlmConversationalResponder;
use crate::search::ExaSearchClient;

/// Configured adapters wired into a ready conversation engine.
pub struct AgentRuntime {
    engine: ConversationEngine,
}

impl AgentRuntime {
    pub fn from_config(config: &AppConfig, store: Arc<dyn ConversationStore>) -> Result<Self> {
        Self::builder(config)?.build(store)
    }

    pub fn builder(config: &AppConfig) -> Result<AgentRuntimeBuilder> {
        let llm: Arc<dyn LlmClient> = Arc::new(
            OpenAiChatClient::from_config(&config.llm).context("failed to build llm client")?,
        );
        let catalog = Arc::new(config.search.load_catalog().context("failed to load provider catalog")?);
        let search: Arc<dyn DocumentSearch> = Arc::new(
            ExaSearchClient::from_config(&config.search, &catalog)
                .context("failed to build search client")?,
        );

        Ok(AgentRuntimeBuilder {
            config: config.clone(),
            llm,
            search,
            catalog,
            audit: Arc::new(NoopAuditSink),
        })
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }
}

/// Lets callers swap individual adapters before the engine is assembled.
pub struct AgentRuntimeBuilder {
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn DocumentSearch>,
    catalog: Arc<ProviderCatalog>,
    audit: Arc<dyn AuditSink>,
}

impl AgentRuntimeBuilder {
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_search(mut self, search: Arc<dyn DocumentSearch>) -> Self {
        self.search = search;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn retrieval(&self) -> RetrievalAggregator {
        RetrievalAggregator::new(
            Arc::clone(&self.search),
            Arc::clone(&self.catalog),
            self.config.retrieval.settings(),
        )
    }

    pub fn build(self, store: Arc<dyn ConversationStore>) -> Result<AgentRuntime> {
        let gate = self.config.conversation.gate();
        let drafter = LlmItineraryDrafter::new(Arc::clone(&self.llm))
            .context("failed to load itinerary prompt templates")?;
        let responder = LlmConversationalResponder::new(Arc::clone(&self.llm))
            .with_early_threshold(gate.min_history_before_generation);

        let engine = ConversationEngine::new(
            Arc::new(LlmCriteriaExtractor::new(Arc::clone(&self.llm))),
            Arc::new(drafter),
            Arc::new(responder),
            self.retrieval(),
            store,
        )
        .with_gate(gate)
        .with_audit_sink(self.audit);

        Ok(AgentRuntime { engine })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use wayfarer_core::audit::InMemoryAuditSink;
    use wayfarer_core::collaborators::{DocumentSearch, SearchError};
    use wayfarer_core::config::AppConfig;
    use wayfarer_core::domain::session::PlanningStep;
    use wayfarer_core::domain::travel::RawSearchResult;
    use wayfarer_core::flows::TurnRequest;
    use wayfarer_core::store::InMemoryConversationStore;

    use super::AgentRuntime;
    use crate::responder::UNCONFIGURED_REPLY;
    use crate::testing::ScriptedLlm;

    struct EmptySearch;

    #[async_trait]
    impl DocumentSearch for EmptySearch {
        async fn search(&self, _query: &str) -> Result<Vec<RawSearchResult>, SearchError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn runtime_builds_without_credentials_and_replies_softly() {
        let runtime = AgentRuntime::from_config(
            &AppConfig::default(),
            Arc::new(InMemoryConversationStore::default()),
        )
        .expect("runtime builds lazily");

        let reply = runtime
            .engine()
            .handle_message(TurnRequest::new("A week in Rome", None))
            .await
            .expect("turn succeeds");

        assert_eq!(reply.reply, UNCONFIGURED_REPLY);
        assert_eq!(reply.step, PlanningStep::GatheringRequirements);
    }

    #[tokio::test]
    async fn scripted_adapters_drive_the_engine() {
        let llm = Arc::new(ScriptedLlm::replying([
            Ok(r#"{"criteria":{"destination":"Rome","duration":7},"confidence":0.9}"#.to_string()),
            Ok("Lovely! How many people are traveling?".to_string()),
        ]));
        let audit = Arc::new(InMemoryAuditSink::default());
        let runtime = AgentRuntime::builder(&AppConfig::default())
            .expect("builder")
            .with_llm(llm)
            .with_search(Arc::new(EmptySearch))
            .with_audit_sink(audit.clone())
            .build(Arc::new(InMemoryConversationStore::default()))
            .expect("runtime builds");

        let reply = runtime
            .engine()
            .handle_message(TurnRequest::new("A week in Rome", None))
            .await
            .expect("turn succeeds");

        assert_eq!(reply.reply, "Lovely! How many people are traveling?");
        assert_eq!(reply.criteria.destination.as_deref(), Some("Rome"));
        assert_eq!(reply.suggested_question.as_deref(), Some("How many people are traveling?"));
        assert!(!audit.events_of_type("flow.step_changed").is_empty());
    }
}
