pub mod chat;
pub mod document;

pub use chat::{ChatMessage, Role, SessionKey};
pub use document::RetrievedChunk;
