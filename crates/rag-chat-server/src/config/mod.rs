pub mod settings;

pub use settings::{
    EmbeddingConfig, LlmConfig, MemoryConfig, RagConfig, ServerConfig, Settings, VectorBackend,
    VectorStoreConfig,
};
