//! Shared HTTP plumbing for upstream weather services

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::error::WeatherAiError;

/// Query parameters whose values never reach the logs
const SECRET_PARAMS: &[&str] = &["key", "appid", "token"];

/// Build an HTTP client with a bounded request timeout
pub fn build_client(timeout_seconds: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("WeatherAI/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| WeatherAiError::config(format!("Failed to create HTTP client: {e}")))
}

/// Replace secret query parameter values with `***`
pub fn redact(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let params: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if SECRET_PARAMS.contains(&name) => format!("{name}=***"),
            _ => pair.to_string(),
        })
        .collect();

    format!("{base}?{}", params.join("&"))
}

/// Pull a human-readable message out of a provider error body
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Perform a GET request and decode the JSON body.
///
/// Network failures, timeouts, non-success statuses and undecodable bodies
/// all map to provider errors. No retries are attempted.
#[instrument(level = "debug", skip(client, url))]
pub async fn get_json<T: DeserializeOwned>(client: &Client, url: &str, service: &str) -> Result<T> {
    let start = Instant::now();
    debug!("{} request: {}", service, redact(url));

    let response = client.get(url).send().await.map_err(|e| {
        let kind = if e.is_timeout() { "timed out" } else { "failed" };
        warn!("{} request {}: {}", service, kind, e.without_url());
        WeatherAiError::provider(format!("{service} request {kind}"))
    })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| WeatherAiError::provider(format!("{service} response unreadable: {}", e.without_url())))?;

    if !status.is_success() {
        let message = error_message(&body)
            .unwrap_or_else(|| format!("{service} returned HTTP {}", status.as_u16()));
        warn!("{} returned {}: {}", service, status, message);
        return Err(WeatherAiError::provider(message));
    }

    let parsed = serde_json::from_str(&body).map_err(|e| {
        warn!("Failed to parse {} response: {}", service, e);
        WeatherAiError::provider(format!("Malformed {service} response"))
    })?;

    let elapsed = start.elapsed();
    info!(
        "{} request succeeded in {:.3}s",
        service,
        elapsed.as_secs_f64()
    );
    if elapsed.as_secs() > 5 {
        warn!("Slow {} response: {:.3}s", service, elapsed.as_secs_f64());
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Echo {
        value: i32,
    }

    #[test]
    fn test_redact_hides_keys() {
        assert_eq!(
            redact("https://api.example.com/forecast.json?key=abc123&q=Dhaka&days=2"),
            "https://api.example.com/forecast.json?key=***&q=Dhaka&days=2"
        );
        assert_eq!(
            redact("https://api.example.com/weather?q=Dhaka&appid=secret"),
            "https://api.example.com/weather?q=Dhaka&appid=***"
        );
        assert_eq!(redact("https://ipinfo.io/json"), "https://ipinfo.io/json");
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"code":1006,"message":"No matching location found."}}"#),
            Some("No matching location found.".to_string())
        );
        assert_eq!(
            error_message(r#"{"cod":"404","message":"city not found"}"#),
            Some("city not found".to_string())
        );
        assert_eq!(error_message("<html>oops</html>"), None);
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/echo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": 7})))
            .mount(&server)
            .await;

        let client = build_client(5).unwrap();
        let echo: Echo = get_json(&client, &format!("{}/echo", server.uri()), "Echo")
            .await
            .unwrap();
        assert_eq!(echo.value, 7);
    }

    #[tokio::test]
    async fn test_get_json_uses_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                serde_json::json!({"error": {"code": 1006, "message": "No matching location found."}}),
            ))
            .mount(&server)
            .await;

        let client = build_client(5).unwrap();
        let err = get_json::<Echo>(&client, &server.uri(), "Echo")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Provider error: No matching location found.");
    }

    #[tokio::test]
    async fn test_get_json_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = build_client(5).unwrap();
        let err = get_json::<Echo>(&client, &server.uri(), "Echo")
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherAiError::Provider { .. }));
    }
}
