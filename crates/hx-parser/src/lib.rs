pub mod chunker;
pub mod error;
mod file;
mod file_check;
mod registry;
mod token_counter;

pub use chunker::{ChunkConfig, Chunker};
pub use error::ParserError;
pub use file::{chunk_file, chunk_source};
pub use file_check::{check_file_size, is_binary};
pub use registry::ParserRegistry;
pub use token_counter::TokenCounter;
