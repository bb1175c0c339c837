//! Business metrics derived from raw samples.
//!
//! All CPU figures are rates over the interval since the previous sample of
//! the same container; everything else is the instantaneous value of the
//! current sample. Percentages are whole-percent floats.

mod error;
mod processor;

use std::time::SystemTime;

use crate::cgroup::stats::NetworkStat;
use crate::container::ContainerID;

pub use error::{Error, Result};
pub use processor::MetricsProcessor;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CpuMetrics {
    /// Share of one CPU used, up to `100 × online CPUs`.
    pub cpu_percent: f64,
    pub kernel_percent: f64,
    pub user_percent: f64,
    pub used_cores: f64,
    pub limit_cores: f64,
    /// `used_cores` relative to `limit_cores`.
    pub used_cores_percent: f64,
    /// Periods throttled during the interval.
    pub throttled_periods: u64,
    pub throttled_time_ms: f64,
    pub shares: u64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MemoryMetrics {
    /// RSS; page cache is not counted as usage.
    pub usage_bytes: u64,
    pub cache_bytes: u64,
    pub kernel_usage_bytes: u64,
    /// `0` when the container has no limit.
    pub limit_bytes: u64,
    pub usage_percent: f64,
    /// Memory plus swap. Absent when swap accounting is off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_usage_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_only_usage_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_limit_usage_percent: Option<f64>,
    pub swap_limit_bytes: u64,
    pub soft_limit_bytes: u64,
}

/// Cumulative block I/O totals over all devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BlkioMetrics {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_ops: u64,
    pub write_ops: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PidsMetrics {
    pub current: u64,
    /// `0` when unlimited.
    pub limit: u64,
}

/// Derived metrics of one container for one sampling cycle.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Sample {
    pub container_id: ContainerID,
    pub timestamp: SystemTime,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub blkio: BlkioMetrics,
    pub pids: PidsMetrics,
    pub network: NetworkStat,
    pub restart_count: u32,
}
