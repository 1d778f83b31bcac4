use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BackgroundCheckError;
use crate::config::BackgroundCheckConfig;
use crate::http::{create_http_client, truncate_body};
use crate::secrets::resolve_credentials;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchRequest {
    pub doc: String,
    pub typedoc: String,
    pub force: bool,
}

#[derive(Debug, Deserialize)]
struct LaunchResponse {
    jobid: Value,
}

/// One observation of a running check.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CheckResult {
    #[serde(default)]
    pub estado: Option<String>,
    /// `null` and missing both mean no finding yet.
    #[serde(default)]
    pub hallazgo: Option<Value>,
}

#[async_trait]
pub trait BackgroundCheckApi: Send + Sync {
    /// Starts a check and returns its job id.
    async fn launch(&self, request: &LaunchRequest) -> Result<String, BackgroundCheckError>;

    async fn fetch_result(&self, job_id: &str) -> Result<CheckResult, BackgroundCheckError>;
}

/// HTTP client for the tusdatos.co API (basic auth).
pub struct TusDatosClient {
    client: Client,
    base_url: String,
    user: String,
    secret: SecretString,
}

impl TusDatosClient {
    pub fn new(
        base_url: &str,
        user: String,
        secret: SecretString,
        request_timeout: Duration,
    ) -> Result<Self, BackgroundCheckError> {
        let client = create_http_client(request_timeout).map_err(|e| {
            BackgroundCheckError::Unavailable(format!("Failed to create HTTP client: {}", e))
        })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user,
            secret,
        })
    }

    /// Reads the credentials from the environment variables named in config.
    pub fn from_config(config: &BackgroundCheckConfig) -> Result<Self, BackgroundCheckError> {
        let (user, secret) = resolve_credentials(&config.user_env, &config.secret_env)?;
        Self::new(
            &config.base_url,
            user,
            secret,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BackgroundCheckError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(BackgroundCheckError::Unavailable(format!(
            "HTTP {}: {}",
            status,
            truncate_body(&body)
        )))
    }
}

#[async_trait]
impl BackgroundCheckApi for TusDatosClient {
    async fn launch(&self, request: &LaunchRequest) -> Result<String, BackgroundCheckError> {
        let response = self
            .client
            .post(format!("{}/launch", self.base_url))
            .basic_auth(&self.user, Some(self.secret.expose_secret()))
            .json(request)
            .send()
            .await
            .map_err(|e| BackgroundCheckError::Unavailable(e.to_string()))?;

        let body: LaunchResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackgroundCheckError::InvalidResponse(e.to_string()))?;

        match body.jobid {
            Value::String(id) if !id.is_empty() => Ok(id),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(BackgroundCheckError::InvalidResponse(format!(
                "unusable jobid {}",
                other
            ))),
        }
    }

    async fn fetch_result(&self, job_id: &str) -> Result<CheckResult, BackgroundCheckError> {
        let response = self
            .client
            .get(format!("{}/results/{}", self.base_url, job_id))
            .basic_auth(&self.user, Some(self.secret.expose_secret()))
            .send()
            .await
            .map_err(|e| BackgroundCheckError::Unavailable(e.to_string()))?;

        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackgroundCheckError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_null_finding_is_absent() {
        let result: CheckResult =
            serde_json::from_str(r#"{"estado": "procesando", "hallazgo": null}"#).unwrap();
        assert_eq!(result.estado.as_deref(), Some("procesando"));
        assert!(result.hallazgo.is_none());

        let result: CheckResult = serde_json::from_str(r#"{"estado": "finalizado"}"#).unwrap();
        assert!(result.hallazgo.is_none());
    }

    #[test]
    fn test_check_result_structured_finding() {
        let result: CheckResult =
            serde_json::from_str(r#"{"estado": "finalizado", "hallazgo": {"procuraduria": false}}"#)
                .unwrap();
        assert_eq!(result.hallazgo.unwrap()["procuraduria"], false);
    }

    #[test]
    fn test_launch_request_body() {
        let body = serde_json::to_value(LaunchRequest {
            doc: "1020304050".to_string(),
            typedoc: "CC".to_string(),
            force: false,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"doc": "1020304050", "typedoc": "CC", "force": false})
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = TusDatosClient::new(
            "https://checks.example.com/api/",
            "user".to_string(),
            SecretString::from("secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://checks.example.com/api");
    }
}
