//! Container identity and the inspection data the sampler consumes.
//!
//! The [`Inspector`] trait is the seam to the container engine; the engine
//! client itself lives outside this crate. [`HostProcessInspector`] is a
//! procfs-only implementation treating a host process as a container.
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

mod error;
mod process;

pub use error::{Error, Result};
pub use process::HostProcessInspector;

/// The maximum allowed length for a [`ContainerID`].
const CONTAINER_ID_MAX_LEN: usize = 255;

/// A validated container identifier.
///
/// # Examples
///
/// ```
/// # use cgroup_sampler::container::ContainerID;
/// let raw_id = "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd";
/// let container_id = ContainerID::new(raw_id).unwrap();
/// assert_eq!(container_id.as_ref(), raw_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the input is empty or longer
    /// than [`CONTAINER_ID_MAX_LEN`].
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > CONTAINER_ID_MAX_LEN {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for ContainerID {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Lifecycle status as reported by the container engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Other(String),
}

impl From<&str> for ContainerStatus {
    fn from(status: &str) -> Self {
        match status {
            "created" => ContainerStatus::Created,
            "running" => ContainerStatus::Running,
            "paused" => ContainerStatus::Paused,
            "restarting" => ContainerStatus::Restarting,
            "removing" => ContainerStatus::Removing,
            "exited" => ContainerStatus::Exited,
            "dead" => ContainerStatus::Dead,
            other => ContainerStatus::Other(other.to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub status: ContainerStatus,
    /// Host PID of the container's init process, `0` when not running.
    pub pid: u32,
    pub finished_at: Option<SystemTime>,
}

/// Resource settings the container was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostConfig {
    /// Relative CPU weight (`--cpu-shares`).
    pub cpu_shares: u64,
    /// CPU quota in billionths of a CPU (`--cpus`), `0` when unset.
    pub nano_cpus: u64,
    /// Memory soft limit in bytes, `0` when unset.
    pub memory_reservation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInspection {
    pub id: ContainerID,
    pub state: ContainerState,
    pub restart_count: u32,
    pub host_config: HostConfig,
}

/// Engine-wide facts relevant to collection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemInfo {
    /// `"1"` or `"2"`.
    pub cgroup_version: String,
    /// e.g. `"cgroupfs"` or `"systemd"`.
    pub cgroup_driver: String,
}

/// Source of container inspection data.
pub trait Inspector: Send + Sync {
    fn container_inspect(&self, container_id: &str) -> Result<ContainerInspection>;

    fn info(&self) -> Result<SystemInfo>;
}
