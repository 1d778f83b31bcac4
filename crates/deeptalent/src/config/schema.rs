use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest batch a single evaluation prompt is allowed to carry.
pub const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub storage: StorageConfig,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub background_check: BackgroundCheckConfig,
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_worker_count() -> usize {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Falls back to `~/.deeptalent/data/deeptalent.db` when unset.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Host part of every public blob URL, e.g. `cvs.s3.amazonaws.com`.
    pub bucket: String,
    pub root_directory: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "cv".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub size: usize,
    /// Pause between batches to stay under the completion service rate limit.
    #[serde(default = "default_batch_delay_ms")]
    pub delay_ms: u64,
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_batch_delay_ms() -> u64 {
    5_000
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            delay_ms: default_batch_delay_ms(),
        }
    }
}

impl BatchConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_tesseract_binary")]
    pub tesseract_binary: String,
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["spa".to_string(), "eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

fn default_tesseract_binary() -> String {
    "tesseract".to_string()
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            dpi: default_dpi(),
            tesseract_binary: default_tesseract_binary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}

fn default_llm_key_env() -> String {
    "OPENAI_KEY".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    180
}

fn default_rate_limit_backoff_ms() -> u64 {
    20_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key_env: default_llm_key_env(),
            api_key_file: None,
            request_timeout_secs: default_llm_timeout_secs(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundCheckConfig {
    #[serde(default = "default_check_base_url")]
    pub base_url: String,
    #[serde(default = "default_check_user_env")]
    pub user_env: String,
    #[serde(default = "default_check_secret_env")]
    pub secret_env: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_http_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_check_base_url() -> String {
    "https://dash-board.tusdatos.co/api".to_string()
}

fn default_check_user_env() -> String {
    "tusDatosUser".to_string()
}

fn default_check_secret_env() -> String {
    "tusDatosSecret".to_string()
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for BackgroundCheckConfig {
    fn default() -> Self {
        Self {
            base_url: default_check_base_url(),
            user_env: default_check_user_env(),
            secret_env: default_check_secret_env(),
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl BackgroundCheckConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    #[serde(default)]
    pub token_url: String,
    #[serde(default)]
    pub send_url: String,
    #[serde(default = "default_campaign_client_id_env")]
    pub client_id_env: String,
    #[serde(default = "default_campaign_client_secret_env")]
    pub client_secret_env: String,
    #[serde(default)]
    pub template_id: String,
    /// Tokens this close to expiry are refreshed before use.
    #[serde(default = "default_token_margin_secs")]
    pub token_margin_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_campaign_client_id_env() -> String {
    "CAMPAIGN_CLIENT_ID".to_string()
}

fn default_campaign_client_secret_env() -> String {
    "CAMPAIGN_CLIENT_SECRET".to_string()
}

fn default_token_margin_secs() -> u64 {
    60
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            send_url: String::new(),
            client_id_env: default_campaign_client_id_env(),
            client_secret_env: default_campaign_client_secret_env(),
            template_id: String::new(),
            token_margin_secs: default_token_margin_secs(),
            request_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl CampaignConfig {
    pub fn is_configured(&self) -> bool {
        !self.token_url.is_empty() && !self.send_url.is_empty() && !self.template_id.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// How long a finished task stays queryable.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Any task older than this is evicted regardless of status.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_retention_secs() -> u64 {
    3_600
}

fn default_max_age_secs() -> u64 {
    86_400
}

fn default_cleanup_interval_secs() -> u64 {
    600
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            max_age_secs: default_max_age_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "version": "1.0",
                "storage": { "bucket": "cvs.example.com", "root_directory": "/tmp/cvs" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.worker_count, 5);
        assert_eq!(config.batch.size, 10);
        assert_eq!(config.storage.category, "cv");
        assert_eq!(config.background_check.max_attempts, 10);
        assert_eq!(config.background_check.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.tasks.retention_secs, 3_600);
        assert!(config.ocr.enabled);
        assert!(!config.campaign.is_configured());
    }
}
