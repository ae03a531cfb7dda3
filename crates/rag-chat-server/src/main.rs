use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

use rag_chat_server::config::{Settings, VectorBackend};
use rag_chat_server::database::{DbPool, Repository};
use rag_chat_server::document::TextChunker;
use rag_chat_server::handlers;
use rag_chat_server::logging;
use rag_chat_server::services::conversation::{
    CompactionPolicy, LlmSummarizer, MemoryManager, SessionStore,
};
use rag_chat_server::services::vector_store::{InMemoryVectorStore, PgVectorStore};
use rag_chat_server::services::{
    ChatService, DocumentService, EmbeddingProvider, EmbeddingService, LlmProvider, LlmService,
    RagPipeline, VectorStore,
};
use rag_chat_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;

    info!("Starting RAG chat server...");

    let settings = Settings::load()?;
    info!("Configuration loaded");

    // Gateways
    let llm: Arc<dyn LlmProvider> = Arc::new(LlmService::new(settings.llm.clone()));
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(EmbeddingService::new(settings.embedding.clone()));

    let vector_store: Arc<dyn VectorStore> = match settings.vector_store.backend {
        VectorBackend::Memory => {
            info!("Using in-memory vector store");
            Arc::new(InMemoryVectorStore::new(
                embedder.clone(),
                settings.vector_store.max_chunks_per_namespace,
            ))
        }
        VectorBackend::Postgres => {
            let db_pool = DbPool::new(&settings.vector_store).await?;
            info!("Database connection established");

            let repository = Arc::new(Repository::new(
                db_pool,
                &settings.vector_store.table,
                settings.embedding.dimension,
            )?);
            repository.ensure_schema().await?;

            Arc::new(PgVectorStore::new(repository, embedder.clone()))
        }
    };

    // Session memory
    let memory = Arc::new(MemoryManager::new(
        SessionStore::from_config(&settings.memory),
        CompactionPolicy::from(&settings.memory),
    ));

    let pipeline = Arc::new(RagPipeline::new(vector_store.clone(), llm.clone(), &settings.rag));
    let chat_service = Arc::new(ChatService::new(
        memory.clone(),
        pipeline,
        Arc::new(LlmSummarizer::new(llm)),
        settings.rag.generation_deadline(),
    ));

    let document_service = Arc::new(DocumentService::new(
        vector_store,
        TextChunker::from_config(&settings.rag)?,
    ));

    // Idle session cleanup
    let purge_interval = settings.memory.purge_interval();
    let purge_memory = memory.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_interval);
        loop {
            ticker.tick().await;
            let purged = purge_memory.purge_expired();
            debug!("Session purge pass removed {} sessions", purged);
        }
    });

    let app = handlers::router(
        AppState::new(chat_service, document_service),
        settings.server.max_body_bytes,
    );

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
