use std::time::Duration;

use crate::container::ContainerID;
use crate::{container, fetcher, store};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The container exited longer ago than the TTL; stop sampling it.
    #[error("container `{id}` exited {age:?} ago and is expired")]
    Expired { id: ContainerID, age: Duration },
    /// The container exited recently; no metrics this cycle.
    #[error("container `{id}` has exited and is not expired yet")]
    Unexpired { id: ContainerID },
    #[error("failed to inspect container: {0}")]
    Inspect(#[from] container::Error),
    #[error(transparent)]
    Fetch(#[from] fetcher::Error),
    #[error("sample store failed: {0}")]
    Store(#[from] store::Error),
}

impl Error {
    /// Returns `true` for the exited-container outcomes, which are not failures.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Error::Expired { .. } | Error::Unexpired { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
