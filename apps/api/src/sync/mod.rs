// Persistence sync: the progress store abstraction, its HTTP and in-memory
// backends, the coalescing writer and the resumption loader.

pub mod http;
pub mod loader;
pub mod store;
pub mod writer;

#[cfg(test)]
pub mod testing;

use thiserror::Error;

pub use http::HttpProgressStore;
pub use loader::{ResumptionLoader, TaskGuard};
pub use store::{InMemoryProgressStore, ProgressStore};
pub use writer::{CoalescingWriter, RemoteIdentity, SyncStatus, WriteTarget};

/// Failure talking to the progress store. Recoverable: local state is kept
/// and the next write retries with the latest state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("progress API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("progress record {0} not found")]
    NotFound(String),

    #[error("progress API returned a record without an id")]
    MissingIdentity,

    #[error("progress API unavailable after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("progress writer has shut down")]
    WriterClosed,
}
