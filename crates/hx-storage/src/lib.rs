mod embed;
mod error;
mod vector;

pub use embed::{DenseEmbedder, SparseEmbedder};
pub use error::StorageError;
pub use vector::{
    IndexPoint, InMemoryVectorStore, Payload, PayloadFilter, SearchHit, SearchRequest,
    SparseVector, VectorQuery, VectorStore,
};

/// Name of the single collection the system maintains.
pub const COLLECTION_NAME: &str = "code-index";
