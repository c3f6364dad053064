pub mod embedding_client;
pub mod vector_index_client;

pub use embedding_client::EmbeddingClient;
pub use vector_index_client::VectorIndexClient;
