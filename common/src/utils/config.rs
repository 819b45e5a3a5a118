use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    OpenAI,
    #[default]
    FastEmbed,
    Hashed,
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    /// Optional model override for the configured backend.
    #[serde(default)]
    pub embedding_model: Option<String>,
    /// Vector width for backends that accept one (OpenAI, hashed).
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_mapping_url")]
    pub catalog_mapping_url: String,
    #[serde(default = "default_latest_prices_url")]
    pub latest_prices_url: String,
    #[serde(default = "default_user_agent")]
    pub http_user_agent: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_dimensions() -> u32 {
    384
}

fn default_mapping_url() -> String {
    "https://prices.runescape.wiki/api/v1/osrs/mapping".to_string()
}

fn default_latest_prices_url() -> String {
    "https://prices.runescape.wiki/api/v1/osrs/latest".to_string()
}

fn default_user_agent() -> String {
    "item-search-service/1.0".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            surrealdb_address: "mem://".to_string(),
            surrealdb_username: "root".to_string(),
            surrealdb_password: "root".to_string(),
            surrealdb_namespace: "items".to_string(),
            surrealdb_database: "items".to_string(),
            http_port: 8000,
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: None,
            embedding_dimensions: default_embedding_dimensions(),
            catalog_mapping_url: default_mapping_url(),
            latest_prices_url: default_latest_prices_url(),
            http_user_agent: default_user_agent(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
