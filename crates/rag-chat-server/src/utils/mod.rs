pub mod error;
pub mod similarity;

pub use error::{ApiError, RagError};
pub use similarity::cosine_similarity;
