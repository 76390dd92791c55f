//! Query orchestration
//!
//! Composes the conversation context, lets the reasoning layer answer with
//! the weather tools at hand, and records the exchange. Every failure turns
//! into an `Error: ...` answer; nothing propagates to the caller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, instrument};

use crate::Result;
use crate::config::WeatherAiConfig;
use crate::context::ContextAssembler;
use crate::engine::WeatherEngine;
use crate::error::WeatherAiError;
use crate::history::{FjallHistoryStore, HistoryStore};
use crate::models::Exchange;
use crate::reasoning::{GeminiAgent, ReasoningLayer};
use crate::tools::WeatherTools;

/// Shared collaborators of the orchestrator
pub struct EngineContext {
    pub engine: Arc<WeatherEngine>,
    pub reasoning: Arc<dyn ReasoningLayer>,
    pub history: Arc<dyn HistoryStore>,
    /// Number of past exchanges prepended to each query
    pub context_size: usize,
    /// Upper bound for one reasoning run
    pub reasoning_timeout: Duration,
}

impl EngineContext {
    /// Wire up real clients and the on-disk history store
    pub fn from_config(config: &WeatherAiConfig) -> anyhow::Result<Self> {
        let engine = WeatherEngine::from_config(config).context("Failed to set up weather engine")?;
        let reasoning = GeminiAgent::new(&config.reasoning).context("Failed to set up reasoning layer")?;
        let history = FjallHistoryStore::open(&config.history.path)
            .with_context(|| format!("Failed to open history store at {}", config.history.path))?;

        Ok(Self {
            engine: Arc::new(engine),
            reasoning: Arc::new(reasoning),
            history: Arc::new(history),
            context_size: config.history.context_size,
            reasoning_timeout: Duration::from_secs(config.reasoning.timeout_seconds),
        })
    }
}

/// Entry point for answering natural-language weather questions
pub struct QueryOrchestrator {
    context: EngineContext,
    assembler: ContextAssembler,
}

impl QueryOrchestrator {
    pub fn new(context: EngineContext) -> Self {
        let assembler = ContextAssembler::new(context.history.clone(), context.context_size);
        Self { context, assembler }
    }

    pub fn from_config(config: &WeatherAiConfig) -> anyhow::Result<Self> {
        Ok(Self::new(EngineContext::from_config(config)?))
    }

    pub fn history(&self) -> Arc<dyn HistoryStore> {
        self.context.history.clone()
    }

    /// Answer a question; failures come back as `Error: <description>`
    #[instrument(skip(self))]
    pub async fn handle(&self, query_text: &str) -> String {
        match self.answer(query_text).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Query failed: {}", e);
                format!("Error: {e}")
            }
        }
    }

    async fn answer(&self, query_text: &str) -> Result<String> {
        let input = self.assembler.assemble(query_text).await?;
        let tools = WeatherTools::new(self.context.engine.clone());

        let timeout = self.context.reasoning_timeout;
        let answer = tokio::time::timeout(timeout, self.context.reasoning.run(&input, &tools))
            .await
            .map_err(|_| {
                WeatherAiError::reasoning(format!(
                    "no answer within {} seconds",
                    timeout.as_secs_f64()
                ))
            })??;

        let lookup = tools.last_lookup();
        let exchange = Exchange::new(query_text, answer.clone()).with_lookup(
            lookup.as_ref().map(|l| l.city.clone()),
            lookup.map(|l| l.date),
        );
        self.context.history.append(exchange).await?;

        info!("Answered query ({} chars)", answer.len());
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{CannedGateway, engine};
    use crate::history::MemoryHistoryStore;
    use crate::reasoning::{ToolCall, ToolExecutor};
    use crate::tools::CURRENT_WEATHER;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Calls CurrentWeather once and echoes the first line of its output
    #[derive(Default)]
    struct ScriptedReasoning {
        inputs: Mutex<Vec<String>>,
        delay: Option<Duration>,
        fail: bool,
    }

    #[async_trait]
    impl ReasoningLayer for ScriptedReasoning {
        async fn run(&self, input: &str, tools: &dyn ToolExecutor) -> Result<String> {
            self.inputs.lock().unwrap().push(input.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(WeatherAiError::reasoning("Gemini request failed"));
            }

            let output = tools
                .execute(&ToolCall {
                    name: CURRENT_WEATHER.to_string(),
                    arguments: serde_json::json!({"city": "Dhaka"}),
                })
                .await
                .map_err(|e| WeatherAiError::reasoning(e.to_string()))?;
            Ok(format!("Here you go. {}", output.lines().nth(1).unwrap_or_default()))
        }
    }

    fn orchestrator(
        reasoning: Arc<ScriptedReasoning>,
        history: Arc<MemoryHistoryStore>,
    ) -> QueryOrchestrator {
        QueryOrchestrator::new(EngineContext {
            engine: Arc::new(engine(None, CannedGateway::default())),
            reasoning,
            history,
            context_size: 5,
            reasoning_timeout: Duration::from_millis(200),
        })
    }

    #[tokio::test]
    async fn test_handle_persists_exchange_with_lookup() {
        let reasoning = Arc::new(ScriptedReasoning::default());
        let history = Arc::new(MemoryHistoryStore::new());
        let orchestrator = orchestrator(reasoning.clone(), history.clone());

        let answer = orchestrator.handle("How hot is Dhaka?").await;
        assert_eq!(answer, "Here you go. 📍 Current weather in Dhaka:");

        let stored = history.recent(5).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].query, "How hot is Dhaka?");
        assert_eq!(stored[0].response, answer);
        assert_eq!(stored[0].city.as_deref(), Some("Dhaka"));
        assert_eq!(stored[0].date.as_deref(), Some("2026-10-16"));

        assert_eq!(
            reasoning.inputs.lock().unwrap()[0],
            "User: How hot is Dhaka?\nAssistant:"
        );
    }

    #[tokio::test]
    async fn test_second_query_sees_first_exchange() {
        let reasoning = Arc::new(ScriptedReasoning::default());
        let orchestrator = orchestrator(reasoning.clone(), Arc::new(MemoryHistoryStore::new()));

        let first = orchestrator.handle("How hot is Dhaka?").await;
        orchestrator.handle("And tomorrow?").await;

        let inputs = reasoning.inputs.lock().unwrap();
        assert_eq!(
            inputs[1],
            format!("User: How hot is Dhaka?\nAssistant: {first}\n\nUser: And tomorrow?\nAssistant:")
        );
    }

    #[tokio::test]
    async fn test_reasoning_failure_becomes_error_text() {
        let reasoning = Arc::new(ScriptedReasoning {
            fail: true,
            ..ScriptedReasoning::default()
        });
        let history = Arc::new(MemoryHistoryStore::new());
        let orchestrator = orchestrator(reasoning, history.clone());

        let answer = orchestrator.handle("weather?").await;
        assert_eq!(answer, "Error: Reasoning error: Gemini request failed");
        assert!(history.recent(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reasoning_timeout_becomes_error_text() {
        let reasoning = Arc::new(ScriptedReasoning {
            delay: Some(Duration::from_secs(2)),
            ..ScriptedReasoning::default()
        });
        let orchestrator = orchestrator(reasoning, Arc::new(MemoryHistoryStore::new()));

        let answer = orchestrator.handle("weather?").await;
        assert!(answer.starts_with("Error: Reasoning error: no answer within"));
    }
}
