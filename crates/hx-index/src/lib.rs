pub mod error;
pub mod hybrid;
pub mod scanner;
pub mod watcher;

pub use error::IndexerError;
pub use hybrid::{HybridIndex, SearchResult};
pub use scanner::scan_files;
pub use watcher::{start, WatcherHandle};
