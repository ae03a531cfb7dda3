use axum::extract::FromRef;
use std::sync::Arc;

use crate::services::conversation::MemoryManager;
use crate::services::{ChatService, DocumentService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub document_service: Arc<DocumentService>,
    pub memory: Arc<MemoryManager>,
}

impl AppState {
    pub fn new(chat_service: Arc<ChatService>, document_service: Arc<DocumentService>) -> Self {
        let memory = chat_service.memory().clone();
        Self {
            chat_service,
            document_service,
            memory,
        }
    }
}

impl FromRef<AppState> for Arc<ChatService> {
    fn from_ref(state: &AppState) -> Self {
        state.chat_service.clone()
    }
}

impl FromRef<AppState> for Arc<DocumentService> {
    fn from_ref(state: &AppState) -> Self {
        state.document_service.clone()
    }
}

impl FromRef<AppState> for Arc<MemoryManager> {
    fn from_ref(state: &AppState) -> Self {
        state.memory.clone()
    }
}
