pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    BackgroundCheckConfig, BatchConfig, CampaignConfig, Config, DatabaseConfig, LlmConfig,
    LoggingConfig, OcrConfig, StorageConfig, TaskConfig, MAX_BATCH_SIZE,
};
