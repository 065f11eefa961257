pub mod db;
pub mod embeddings;
pub mod error;
pub mod store;
pub mod types;
pub mod vector;

pub use embeddings::{Embedder, NATIVE_DIMENSIONS};
pub use error::{MemoryError, Result};
pub use store::MemoryStore;
pub use types::{Filter, Record, SearchHit, NS_DOCUMENTS, NS_MEMORIES};
pub use vector::{VectorIndex, VectorIndexConfig};
