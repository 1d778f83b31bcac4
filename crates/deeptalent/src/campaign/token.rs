use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::CampaignError;
use crate::http::truncate_body;

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: SecretString,
    pub expires_in: Duration,
}

/// Where fresh tokens come from.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<IssuedToken, CampaignError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3_600
}

/// OAuth2 client-credentials grant against the campaign token endpoint.
pub struct ClientCredentials {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl ClientCredentials {
    pub fn new(client: Client, token_url: &str, client_id: String, client_secret: SecretString) -> Self {
        Self {
            client,
            token_url: token_url.to_string(),
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn fetch_token(&self) -> Result<IssuedToken, CampaignError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| CampaignError::Unavailable(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CampaignError::Unavailable(format!(
                "Token endpoint returned {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CampaignError::InvalidResponse(format!("Invalid token response: {}", e)))?;

        Ok(IssuedToken {
            access_token: SecretString::from(token.access_token),
            expires_in: Duration::from_secs(token.expires_in),
        })
    }
}

struct CachedToken {
    value: SecretString,
    expires_at: Instant,
}

/// Owns the campaign auth token.
///
/// A token is reused until it is within `margin` of expiry; then, or when
/// none is cached, a new one is fetched. Concurrent callers share a single
/// refresh.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    margin: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>, margin: Duration) -> Self {
        Self {
            source,
            margin,
            cached: Mutex::new(None),
        }
    }

    pub async fn get_valid_token(&self) -> Result<SecretString, CampaignError> {
        self.token_at(Instant::now()).await
    }

    pub(crate) async fn token_at(&self, now: Instant) -> Result<SecretString, CampaignError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if now + self.margin < token.expires_at {
                return Ok(token.value.clone());
            }
            log::debug!("Campaign token near expiry, refreshing");
        }

        let issued = self.source.fetch_token().await?;
        let value = issued.access_token.clone();
        *cached = Some(CachedToken {
            value: issued.access_token,
            expires_at: now + issued.expires_in,
        });
        Ok(value)
    }

    /// Drops the cached token, e.g. after the API rejected it.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::CountingSource;
    use super::*;

    fn cache(lifetime: Duration) -> (TokenCache, Arc<CountingSource>) {
        let source = Arc::new(CountingSource::new(lifetime));
        (TokenCache::new(source.clone(), Duration::from_secs(60)), source)
    }

    #[tokio::test]
    async fn test_token_reused_while_valid() {
        let (cache, source) = cache(Duration::from_secs(3600));
        let now = Instant::now();

        let first = cache.token_at(now).await.unwrap();
        let second = cache.token_at(now + Duration::from_secs(1000)).await.unwrap();

        assert_eq!(first.expose_secret(), "token-1");
        assert_eq!(second.expose_secret(), "token-1");
        assert_eq!(source.issued(), 1);
    }

    #[tokio::test]
    async fn test_token_refreshed_within_margin() {
        let (cache, source) = cache(Duration::from_secs(3600));
        let now = Instant::now();

        cache.token_at(now).await.unwrap();
        let refreshed = cache.token_at(now + Duration::from_secs(3550)).await.unwrap();

        assert_eq!(refreshed.expose_secret(), "token-2");
        assert_eq!(source.issued(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let (cache, source) = cache(Duration::from_secs(3600));
        cache.get_valid_token().await.unwrap();
        cache.invalidate().await;
        cache.get_valid_token().await.unwrap();
        assert_eq!(source.issued(), 2);
    }

    #[test]
    fn test_token_response_default_expiry() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(token.expires_in, 3_600);
    }
}
