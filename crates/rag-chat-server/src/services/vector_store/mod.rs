//! Vector Store Gateway implementations

mod memory;
mod postgres;

pub use memory::InMemoryVectorStore;
pub use postgres::PgVectorStore;
