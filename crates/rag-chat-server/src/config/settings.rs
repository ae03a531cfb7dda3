use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub memory: MemoryConfig,
    pub rag: RagConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint, e.g. `https://openrouter.ai/api/v1`
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub max_tokens: usize,
    pub temperature: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub dimension: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    #[serde(default)]
    pub database_url: Option<String>,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
    pub table: String,
    pub max_chunks_per_namespace: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemoryConfig {
    /// Compaction runs once history grows past this many messages
    pub compaction_threshold: usize,
    /// Messages kept verbatim after a compaction
    pub retain_recent: usize,
    /// Keep a retained assistant reply together with its question
    #[serde(default)]
    pub align_pairs: bool,
    pub session_ttl_seconds: u64,
    pub max_sessions: usize,
    pub purge_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RagConfig {
    pub retrieval_top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Deadline applied by the chat service to each generation call (0 = none)
    pub generation_timeout_seconds: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            compaction_threshold: 8,
            retain_recent: 4,
            align_pairs: false,
            session_ttl_seconds: 6 * 60 * 60,
            max_sessions: 10_000,
            purge_interval_seconds: 300,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: 4,
            chunk_size: 1000,
            chunk_overlap: 200,
            generation_timeout_seconds: 60,
        }
    }
}

impl MemoryConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_seconds.max(1))
    }
}

impl RagConfig {
    pub fn generation_deadline(&self) -> Option<Duration> {
        match self.generation_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(env_source())
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}

/// `APP_<SECTION>__<KEY>`, e.g. `APP_LLM__API_KEY`
fn env_source() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
