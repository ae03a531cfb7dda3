pub mod chat_service;
pub mod conversation;
pub mod document_service;
pub mod embedding_service;
pub mod llm_service;
pub mod providers;
pub mod rag_service;
pub mod vector_store;

pub use chat_service::ChatService;
pub use document_service::DocumentService;
pub use embedding_service::EmbeddingService;
pub use llm_service::LlmService;
pub use providers::{EmbeddingProvider, LlmProvider, VectorStore};
pub use rag_service::{PipelineRequest, PipelineResult, RagPipeline};
