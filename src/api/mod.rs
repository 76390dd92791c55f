use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::error;

use crate::history::HistoryOrder;
use crate::models::Exchange;
use crate::orchestrator::QueryOrchestrator;

const MAX_HISTORY: usize = 100;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiExchange {
    pub query: String,
    pub response: String,
    pub city: Option<String>,
    pub date: Option<String>,
    pub timestamp: String,
}

impl From<Exchange> for ApiExchange {
    fn from(exchange: Exchange) -> Self {
        Self {
            query: exchange.query,
            response: exchange.response,
            city: exchange.city,
            date: exchange.date,
            timestamp: exchange.timestamp.to_rfc3339(),
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({"error": message})))
}

pub fn router(orchestrator: Arc<QueryOrchestrator>) -> Router {
    Router::new()
        .route("/query", post(ask))
        .route("/history", get(get_history))
        .with_state(orchestrator)
}

async fn ask(
    State(orchestrator): State<Arc<QueryOrchestrator>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "query must not be empty"));
    }

    let answer = orchestrator.handle(query).await;
    Ok(Json(QueryResponse { answer }))
}

/// Most recent exchanges, newest first
async fn get_history(
    State(orchestrator): State<Arc<QueryOrchestrator>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ApiExchange>>, ApiError> {
    let history = orchestrator.history();
    let limit = params.limit.unwrap_or(10).min(MAX_HISTORY);

    let mut exchanges = history.recent(limit).await.map_err(|e| {
        error!("Failed to load history: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "history unavailable")
    })?;
    if history.order() == HistoryOrder::OldestFirst {
        exchanges.reverse();
    }

    Ok(Json(exchanges.into_iter().map(ApiExchange::from).collect()))
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "version": crate::VERSION}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{CannedGateway, engine};
    use crate::history::MemoryHistoryStore;
    use crate::orchestrator::EngineContext;
    use crate::reasoning::{ReasoningLayer, ToolExecutor};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct EchoReasoning;

    #[async_trait]
    impl ReasoningLayer for EchoReasoning {
        async fn run(&self, input: &str, _tools: &dyn ToolExecutor) -> crate::Result<String> {
            let question = input
                .lines()
                .rev()
                .find_map(|line| line.strip_prefix("User: "))
                .unwrap_or_default();
            Ok(format!("You asked: {question}"))
        }
    }

    fn app() -> Router {
        let orchestrator = QueryOrchestrator::new(EngineContext {
            engine: Arc::new(engine(None, CannedGateway::default())),
            reasoning: Arc::new(EchoReasoning),
            history: Arc::new(MemoryHistoryStore::new()),
            context_size: 5,
            reasoning_timeout: Duration::from_secs(5),
        });
        router(Arc::new(orchestrator))
    }

    fn post_query(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_returns_answer() {
        let response = app()
            .oneshot(post_query(r#"{"query": "Is it raining?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["answer"], "You asked: Is it raining?");
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let response = app().oneshot(post_query(r#"{"query": "  "}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let app = app();
        for question in ["first", "second"] {
            app.clone()
                .oneshot(post_query(&format!(r#"{{"query": "{question}"}}"#)))
                .await
                .unwrap();
        }

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/history?limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body[0]["query"], "second");
        assert_eq!(body[1]["query"], "first");
        assert_eq!(body[1]["response"], "You asked: first");
    }
}
