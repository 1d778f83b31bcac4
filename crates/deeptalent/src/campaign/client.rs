use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::token::{ClientCredentials, TokenCache};
use super::CampaignError;
use crate::config::CampaignConfig;
use crate::http::{create_http_client, truncate_body};
use crate::secrets::resolve_secret;

/// Country calling code prepended to local mobile numbers.
const COUNTRY_PREFIX: &str = "+57";

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignMessage {
    /// Local mobile number; non-digits are ignored.
    pub phone: String,
    /// Template placeholders in order.
    pub tags: Vec<String>,
}

impl CampaignMessage {
    pub fn receiver(&self) -> Option<String> {
        let digits: String = self.phone.chars().filter(char::is_ascii_digit).collect();
        let local = match digits.strip_prefix("57") {
            Some(rest) if rest.len() == 10 => rest.to_string(),
            _ => digits,
        };
        (!local.is_empty()).then(|| format!("{}{}", COUNTRY_PREFIX, local))
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    template_id: &'a str,
    receiver: String,
    tags_values: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: serde_json::Value,
}

#[async_trait]
pub trait CampaignApi: Send + Sync {
    /// Sends one templated message and returns the provider's message id.
    async fn send(&self, message: &CampaignMessage) -> Result<String, CampaignError>;
}

pub struct CampaignClient {
    client: Client,
    send_url: String,
    template_id: String,
    tokens: Arc<TokenCache>,
}

impl CampaignClient {
    pub fn new(client: Client, send_url: &str, template_id: &str, tokens: Arc<TokenCache>) -> Self {
        Self {
            client,
            send_url: send_url.to_string(),
            template_id: template_id.to_string(),
            tokens,
        }
    }

    /// Builds the client and its token cache from config and environment.
    pub fn from_config(config: &CampaignConfig) -> Result<Self, CampaignError> {
        if !config.is_configured() {
            return Err(CampaignError::NotConfigured);
        }

        let client = create_http_client(Duration::from_secs(config.request_timeout_secs))
            .map_err(|e| CampaignError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        let client_id = resolve_secret(None, None, Some(&config.client_id_env))?;
        let client_secret = resolve_secret(None, None, Some(&config.client_secret_env))?;
        let source = ClientCredentials::new(
            client.clone(),
            &config.token_url,
            client_id.expose_secret().to_string(),
            client_secret,
        );
        let tokens = Arc::new(TokenCache::new(
            Arc::new(source),
            Duration::from_secs(config.token_margin_secs),
        ));

        Ok(Self::new(client, &config.send_url, &config.template_id, tokens))
    }

    fn request_body(&self, message: &CampaignMessage) -> Option<SendRequest<'_>> {
        Some(SendRequest {
            template_id: &self.template_id,
            receiver: message.receiver()?,
            tags_values: message.tags.join(","),
        })
    }
}

#[async_trait]
impl CampaignApi for CampaignClient {
    async fn send(&self, message: &CampaignMessage) -> Result<String, CampaignError> {
        let body = self
            .request_body(message)
            .ok_or_else(|| CampaignError::InvalidReceiver(message.phone.clone()))?;
        let token = self.tokens.get_valid_token().await?;

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| CampaignError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CampaignError::Unavailable(format!(
                "HTTP {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| CampaignError::InvalidResponse(e.to_string()))?;
        match sent.message_id {
            serde_json::Value::String(id) if !id.is_empty() => Ok(id),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            other => Err(CampaignError::InvalidResponse(format!(
                "unusable message_id {}",
                other
            ))),
        }
    }
}
