//! Gemini function-calling agent
//!
//! Drives a `generateContent` conversation: the model either answers in text
//! or requests function calls, whose results are fed back until it answers
//! or the step budget runs out.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::{FALLBACK_ANSWER, ReasoningLayer, ToolCall, ToolDescriptor, ToolExecutor};
use crate::Result;
use crate::config::ReasoningConfig;
use crate::error::WeatherAiError;

const MALFORMED_FUNCTION_CALL: &str = "MALFORMED_FUNCTION_CALL";

const CORRECTION: &str = "Your previous reply could not be parsed. Either call one of the \
available functions with valid arguments or answer the user directly in plain text.";

// Gemini API request/response structures

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [Value],
    system_instruction: SystemInstruction,
    tools: Vec<ToolBlock>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolBlock {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    /// Kept raw so it can be echoed back verbatim as the model turn
    content: Option<Value>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl From<&ToolDescriptor> for FunctionDeclaration {
    fn from(tool: &ToolDescriptor) -> Self {
        let properties: serde_json::Map<String, Value> = tool
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    json!({"type": "STRING", "description": p.description}),
                )
            })
            .collect();

        Self {
            name: tool.name.to_string(),
            description: tool.description.to_string(),
            parameters: json!({"type": "OBJECT", "properties": properties}),
        }
    }
}

/// What one model turn asked for
enum Turn {
    Answer(String),
    Calls(Value, Vec<FunctionCall>),
    Unusable,
}

fn classify(candidate: Candidate) -> Turn {
    if candidate.finish_reason.as_deref() == Some(MALFORMED_FUNCTION_CALL) {
        return Turn::Unusable;
    }
    let Some(content) = candidate.content else {
        return Turn::Unusable;
    };
    let parts: Vec<Part> = match content.get("parts").cloned().map(serde_json::from_value) {
        Some(Ok(parts)) => parts,
        _ => return Turn::Unusable,
    };

    let mut calls = Vec::new();
    let mut text = String::new();
    for part in parts {
        if let Some(call) = part.function_call {
            calls.push(call);
        } else if let Some(t) = part.text {
            text.push_str(&t);
        }
    }

    if !calls.is_empty() {
        Turn::Calls(content, calls)
    } else if text.trim().is_empty() {
        Turn::Unusable
    } else {
        Turn::Answer(text.trim().to_string())
    }
}

fn user_text(text: &str) -> Value {
    json!({"role": "user", "parts": [{"text": text}]})
}

/// Reasoning layer backed by the Gemini `generateContent` API
pub struct GeminiAgent {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
    max_steps: u32,
}

impl GeminiAgent {
    pub fn new(config: &ReasoningConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| WeatherAiError::config("Gemini API key is not configured"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| WeatherAiError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_steps: config.max_steps,
        })
    }

    fn build_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn system_instruction() -> String {
        format!(
            "You are a helpful weather assistant. Today is {}. \
             Use the available functions to look up current conditions, forecasts \
             and historical weather; pass dates and times exactly as the user phrased them. \
             The input may start with earlier conversation turns; answer only the latest \
             user message. If a function returns a message starting with ❌, explain \
             that problem to the user instead of guessing.",
            Local::now().format("%B %d, %Y")
        )
    }

    async fn generate(&self, contents: &[Value], tools: &[ToolDescriptor]) -> Result<GenerateResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| WeatherAiError::config("Gemini API key contains invalid characters"))?;
        headers.insert("x-goog-api-key", key);

        let body = GenerateRequest {
            contents,
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: Self::system_instruction(),
                }],
            },
            tools: vec![ToolBlock {
                function_declarations: tools.iter().map(FunctionDeclaration::from).collect(),
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.build_url())
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| WeatherAiError::reasoning(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| WeatherAiError::reasoning(format!("Gemini response unreadable: {e}")))?;
        debug!(
            "Gemini responded {} in {:.3}s",
            status,
            start.elapsed().as_secs_f64()
        );

        let parsed: Option<GenerateResponse> = serde_json::from_str(&text).ok();
        if let Some(error) = parsed.as_ref().and_then(|p| p.error.as_ref()) {
            return Err(WeatherAiError::reasoning(format!(
                "Gemini API error: {}",
                error.message
            )));
        }
        if !status.is_success() {
            return Err(WeatherAiError::reasoning(format!("Gemini returned HTTP {status}")));
        }

        parsed.ok_or_else(|| WeatherAiError::reasoning("Malformed Gemini response"))
    }
}

#[async_trait]
impl ReasoningLayer for GeminiAgent {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn run(&self, input: &str, tools: &dyn ToolExecutor) -> Result<String> {
        let catalog = tools.catalog();
        let mut contents = vec![user_text(input)];

        for step in 1..=self.max_steps {
            let response = self.generate(&contents, &catalog).await?;
            let candidate = response
                .candidates
                .and_then(|c| c.into_iter().next())
                .ok_or_else(|| WeatherAiError::reasoning("Gemini returned no candidates"))?;

            match classify(candidate) {
                Turn::Answer(answer) => {
                    info!("Answer produced after {} step(s)", step);
                    return Ok(answer);
                }
                Turn::Unusable => {
                    warn!("Unusable model turn at step {}, asking for a correction", step);
                    contents.push(user_text(CORRECTION));
                }
                Turn::Calls(model_turn, calls) => {
                    contents.push(model_turn);
                    let mut results = Vec::with_capacity(calls.len());
                    for call in calls {
                        debug!("Model requested tool {}", call.name);
                        let tool_call = ToolCall {
                            name: call.name.clone(),
                            arguments: call.args,
                        };
                        let response = match tools.execute(&tool_call).await {
                            Ok(output) => json!({"result": output}),
                            Err(e) => {
                                warn!("Tool call rejected: {}", e);
                                json!({"error": e.to_string()})
                            }
                        };
                        results.push(json!({
                            "functionResponse": {"name": call.name, "response": response}
                        }));
                    }
                    contents.push(json!({"role": "user", "parts": results}));
                }
            }
        }

        warn!("No answer after {} steps", self.max_steps);
        Ok(FALLBACK_ANSWER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::{ToolCallError, ToolParameter};
    use std::sync::Mutex;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingTools {
        calls: Mutex<Vec<ToolCall>>,
    }

    #[async_trait]
    impl ToolExecutor for RecordingTools {
        fn catalog(&self) -> Vec<ToolDescriptor> {
            vec![ToolDescriptor {
                name: "CurrentWeather",
                description: "Current weather",
                parameters: vec![ToolParameter {
                    name: "city",
                    description: "City name",
                }],
            }]
        }

        async fn execute(&self, call: &ToolCall) -> std::result::Result<String, ToolCallError> {
            self.calls.lock().unwrap().push(call.clone());
            if call.name == "CurrentWeather" {
                Ok("📍 Current weather in Dhaka: 30.5°C".to_string())
            } else {
                Err(ToolCallError::UnknownTool(call.name.clone()))
            }
        }
    }

    fn agent(server: &MockServer, max_steps: u32) -> GeminiAgent {
        GeminiAgent::new(&ReasoningConfig {
            api_key: Some("test-key".to_string()),
            endpoint: server.uri(),
            max_steps,
            ..ReasoningConfig::default()
        })
        .unwrap()
    }

    fn text_reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        }))
    }

    fn call_reply(name: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": name, "args": {"city": "Dhaka"}}}
                ]},
                "finishReason": "STOP"
            }]
        }))
    }

    #[test]
    fn test_function_declaration_schema() {
        let tools = RecordingTools::default();
        let declaration = FunctionDeclaration::from(&tools.catalog()[0]);
        assert_eq!(declaration.name, "CurrentWeather");
        assert_eq!(declaration.parameters["type"], "OBJECT");
        assert_eq!(declaration.parameters["properties"]["city"]["type"], "STRING");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = GeminiAgent::new(&ReasoningConfig::default());
        assert!(matches!(result, Err(WeatherAiError::Config { .. })));
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_string_contains("functionDeclarations"))
            .respond_with(text_reply("Hello! Ask me about the weather."))
            .expect(1)
            .mount(&server)
            .await;

        let tools = RecordingTools::default();
        let answer = agent(&server, 6).run("User: hi\nAssistant:", &tools).await.unwrap();
        assert_eq!(answer, "Hello! Ask me about the weather.");
        assert!(tools.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_function_call_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("functionResponse"))
            .respond_with(text_reply("It is 30.5°C in Dhaka."))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(call_reply("CurrentWeather"))
            .with_priority(2)
            .mount(&server)
            .await;

        let tools = RecordingTools::default();
        let answer = agent(&server, 6)
            .run("User: weather in Dhaka?\nAssistant:", &tools)
            .await
            .unwrap();
        assert_eq!(answer, "It is 30.5°C in Dhaka.");

        let calls = tools.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["city"], "Dhaka");
    }

    #[tokio::test]
    async fn test_recovers_from_malformed_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "MALFORMED_FUNCTION_CALL"}]
            })))
            .with_priority(1)
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("could not be parsed"))
            .respond_with(text_reply("Recovered."))
            .with_priority(2)
            .mount(&server)
            .await;

        let tools = RecordingTools::default();
        let answer = agent(&server, 6).run("User: hi\nAssistant:", &tools).await.unwrap();
        assert_eq!(answer, "Recovered.");
    }

    #[tokio::test]
    async fn test_exhausting_steps_returns_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(call_reply("NoSuchTool"))
            .expect(3)
            .mount(&server)
            .await;

        let tools = RecordingTools::default();
        let answer = agent(&server, 3).run("User: hi\nAssistant:", &tools).await.unwrap();
        assert_eq!(answer, FALLBACK_ANSWER);
        assert_eq!(tools.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_api_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid."}
            })))
            .mount(&server)
            .await;

        let tools = RecordingTools::default();
        let err = agent(&server, 6).run("User: hi\nAssistant:", &tools).await.unwrap_err();
        assert!(matches!(err, WeatherAiError::Reasoning { .. }));
        assert!(err.to_string().contains("API key not valid."));
    }
}
