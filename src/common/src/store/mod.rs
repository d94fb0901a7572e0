//! Key/value persistence used for user context, tags and the session id.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::fmt;

/// Errors raised by a [`KeyValueStore`]. The monitor never propagates these;
/// they end in a warning log.
#[derive(Debug)]
pub enum StoreError {
    /// The store is disabled or refuses access (e.g. quota exceeded).
    Unavailable(String),

    /// Reading or writing the backing file failed
    Io(std::io::Error),

    /// The backing data is not a JSON object of strings
    Serialization(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(reason) => write!(f, "Store unavailable: {}", reason),
            StoreError::Io(e) => write!(f, "Store I/O failed: {}", e),
            StoreError::Serialization(e) => write!(f, "Store data is malformed: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Unavailable(_) => None,
            StoreError::Io(e) => Some(e),
            StoreError::Serialization(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// String key/value storage. Last write wins; no transactions.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}
