//! Previous-sample cache used for rate computation.
//!
//! The processor keeps exactly one [`StoredSample`] per container: every
//! successful fetch overwrites it. `save` flushes to durable backing if the
//! store has one.

mod error;
mod file;
mod memory;

use std::time::SystemTime;

pub use error::{Error, Result};
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::fetcher::RawCpu;

/// CPU counters of the last fetch of a container and when they were taken.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredSample {
    pub timestamp: SystemTime,
    pub cpu: RawCpu,
}

/// Key-value store of [`StoredSample`]s keyed by container ID.
///
/// `get` and `set` on the same key must be linearizable, since samples of
/// different containers may be processed concurrently.
pub trait SampleStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoredSample>>;

    fn set(&self, key: &str, sample: StoredSample) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;

    fn save(&self) -> Result<()>;
}
