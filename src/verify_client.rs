//! HTTP client for the cloud Verify API: request/response shapes, retry and
//! backoff policy, and categorization of failures into [`PiiError`]
//! variants so the Verifier's graceful-degradation logic can branch on
//! error kind without re-inspecting HTTP status codes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    HEALTH_TIMEOUT_SECS, MAX_VERIFY_RETRIES, RETRY_BACKOFF_SECS, USAGE_TIMEOUT_SECS, VERIFY_TIMEOUT_SECS,
};
use crate::error::PiiError;
use crate::model::{Finding, Shard};
use crate::sharder::VerifyContext;

#[derive(Debug, Clone)]
pub struct VerifyClientConfig {
    pub endpoint: String,
    pub api_key: String,
    pub confidence_threshold: f32,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    shards: &'a [Shard],
    context: &'a VerifyContext,
    confidence_threshold: f32,
}

#[derive(Debug, Deserialize)]
struct VerifyResponseBody {
    findings: Vec<Finding>,
}

#[derive(Debug, Deserialize)]
struct UsageResponseBody {
    credits_remaining: f64,
    #[serde(default)]
    purchase_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    retry_after_secs: Option<u64>,
}

pub struct VerifyClient {
    http: reqwest::Client,
    config: VerifyClientConfig,
}

impl VerifyClient {
    pub fn new(config: VerifyClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.config.api_key)
    }

    async fn categorize_error(&self, status: reqwest::StatusCode, body: &str) -> PiiError {
        let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
        match status.as_u16() {
            401 => PiiError::InvalidApiKey,
            402 => {
                let usage: Option<UsageResponseBody> = serde_json::from_str(body).ok();
                PiiError::InsufficientCredits {
                    credits_remaining: usage.as_ref().map(|u| u.credits_remaining).unwrap_or(0.0),
                    purchase_url: usage.map(|u| u.purchase_url).unwrap_or_default(),
                }
            }
            429 => PiiError::RateLimit {
                retry_after_secs: parsed.and_then(|p| p.retry_after_secs).unwrap_or(RETRY_BACKOFF_SECS),
            },
            400..=499 => PiiError::VerifyOther(parsed.map(|p| p.message).unwrap_or_else(|| status.to_string())),
            _ => PiiError::VerifyOther(format!("server error: {status}")),
        }
    }

    /// POST the shard batch and its context. Implements the retry policy:
    /// a 4xx error is categorized and returned immediately without retry; a
    /// 5xx or transport-level error is retried up to [`MAX_VERIFY_RETRIES`]
    /// times with backoff `RETRY_BACKOFF_SECS * (attempt + 1)`.
    pub async fn verify(&self, shards: &[Shard], context: &VerifyContext) -> Result<Vec<Finding>, PiiError> {
        let request = VerifyRequest {
            shards,
            context,
            confidence_threshold: self.config.confidence_threshold,
        };

        let mut last_err: Option<PiiError> = None;
        for attempt in 0..=MAX_VERIFY_RETRIES {
            let send_result = self
                .http
                .post(format!("{}/verify", self.config.endpoint))
                .header("Authorization", self.auth_header())
                .timeout(Duration::from_secs(VERIFY_TIMEOUT_SECS))
                .json(&request)
                .send()
                .await;

            match send_result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body: VerifyResponseBody = resp
                            .json()
                            .await
                            .map_err(|e| PiiError::VerifyOther(e.to_string()))?;
                        return Ok(body.findings);
                    }
                    let text = resp.text().await.unwrap_or_default();
                    let err = self.categorize_error(status, &text).await;
                    if err.is_client_error() {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
                Err(e) if e.is_timeout() => {
                    last_err = Some(PiiError::Timeout);
                }
                Err(e) => {
                    last_err = Some(PiiError::VerifyOther(e.to_string()));
                }
            }

            if attempt < MAX_VERIFY_RETRIES {
                let backoff = RETRY_BACKOFF_SECS * (attempt as u64 + 1);
                tokio::time::sleep(Duration::from_secs(backoff)).await;
            }
        }

        Err(last_err.unwrap_or(PiiError::Timeout))
    }

    pub async fn usage(&self) -> Result<(f64, String), PiiError> {
        let resp = self
            .http
            .get(format!("{}/usage", self.config.endpoint))
            .header("Authorization", self.auth_header())
            .timeout(Duration::from_secs(USAGE_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| PiiError::VerifyOther(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(self.categorize_error(status, &text).await);
        }
        let body: UsageResponseBody = resp.json().await.map_err(|e| PiiError::VerifyOther(e.to_string()))?;
        Ok((body.credits_remaining, body.purchase_url))
    }

    pub async fn health(&self) -> bool {
        self.http
            .get(format!("{}/health", self.config.endpoint))
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(endpoint: String) -> VerifyClient {
        VerifyClient::new(VerifyClientConfig {
            endpoint,
            api_key: "test-key".to_string(),
            confidence_threshold: 0.7,
        })
    }

    #[tokio::test]
    async fn successful_verify_returns_findings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "findings": [{
                    "shard_id": "shard-0",
                    "text": "missed@example.com",
                    "entity_type": "EMAIL",
                    "confidence": 0.95
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let context = VerifyContext { entity_counts: Default::default(), document_type: "general".into() };
        let findings = client.verify(&[], &context).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entity_type, "EMAIL");
    }

    #[tokio::test]
    async fn invalid_api_key_returns_immediately_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({"message": "bad key"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let context = VerifyContext { entity_counts: Default::default(), document_type: "general".into() };
        let err = client.verify(&[], &context).await.unwrap_err();
        assert!(matches!(err, PiiError::InvalidApiKey));
    }

    #[tokio::test]
    async fn rate_limit_reports_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({"retry_after_secs": 30})))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let context = VerifyContext { entity_counts: Default::default(), document_type: "general".into() };
        let err = client.verify(&[], &context).await.unwrap_err();
        match err {
            PiiError::RateLimit { retry_after_secs } => assert_eq!(retry_after_secs, 30),
            other => panic!("expected RateLimit, got {other:?}"),
        }
    }
}
