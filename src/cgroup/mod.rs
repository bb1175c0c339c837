//! Cgroup introspection for a single process.
//!
//! - [`membership`] parses `/proc/<pid>/cgroup`.
//! - [`paths`] combines it with the mount table into stat-file locations
//!   for cgroup v1 (one hierarchy per controller) and v2 (unified).
//! - [`stats`] parses the individual stat files.
pub mod membership;
pub mod paths;
pub mod stats;

pub use paths::{CgroupPaths, CgroupV1Paths, CgroupV2Paths};
