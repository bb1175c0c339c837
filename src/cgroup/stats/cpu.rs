//! Parsers for CPU accounting files of both cgroup versions.
//!
//! - v1 `cpuacct.stat`: user/system time in clock ticks ([`CpuacctStat`]).
//! - v1 `cpuacct.usage_percpu`: one nanosecond counter per CPU ([`PercpuUsage`]).
//! - v1 `cpu.stat`: CFS throttling counters with `throttled_time` in nanoseconds ([`V1CpuStat`]).
//! - v2 `cpu.stat`: usage and throttling in microseconds ([`CpuStat`]).
//!
//! # Examples
//!
//! ```rust
//! use cgroup_sampler::cgroup::stats::{CpuStat, KeyValueStat};
//!
//! let data = "\
//! usage_usec 1000000
//! user_usec 600000
//! system_usec 400000
//! nr_periods 10
//! nr_throttled 2
//! throttled_usec 50000
//! ";
//! let cpu_stat = CpuStat::from_reader(&mut data.as_bytes()).unwrap();
//! assert_eq!(cpu_stat.nr_throttled, 2);
//! ```

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::LazyLock;

use super::{KeyValueStat, SingleLineStat, StatParseError};

/// Clock ticks per second used by `cpuacct.stat` and `/proc/stat` (`USER_HZ`).
pub const CLOCK_TICKS_PER_SECOND: u64 = 100;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Converts `USER_HZ` clock ticks to nanoseconds.
pub fn ticks_to_nanos(ticks: u64) -> u64 {
    ticks.saturating_mul(NANOS_PER_SECOND / CLOCK_TICKS_PER_SECOND)
}

/// Represents parsed data from a cgroup v2 `cpu.stat` file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuStat {
    /// Total time (in microseconds) that the cgroup used CPU (user + system).
    pub usage_usec: u64,
    /// Time (in microseconds) spent in user space.
    pub user_usec: u64,
    /// Time (in microseconds) spent in kernel (system) space.
    pub system_usec: u64,
    /// Number of elapsed enforcement periods.
    pub nr_periods: u64,
    /// Number of periods in which the cgroup was throttled.
    pub nr_throttled: u64,
    /// Total time (in microseconds) the cgroup was throttled.
    pub throttled_usec: u64,
}

type Setter = fn(&mut CpuStat, u64);

static SETTERS: LazyLock<HashMap<&'static str, Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Setter> = HashMap::with_capacity(6);

    m.insert("usage_usec", |s, v| s.usage_usec = v);
    m.insert("user_usec", |s, v| s.user_usec = v);
    m.insert("system_usec", |s, v| s.system_usec = v);
    m.insert("nr_periods", |s, v| s.nr_periods = v);
    m.insert("nr_throttled", |s, v| s.nr_throttled = v);
    m.insert("throttled_usec", |s, v| s.throttled_usec = v);

    m
});

impl KeyValueStat for CpuStat {
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &SETTERS
    }
}

/// Throttling counters from a cgroup v1 `cpu.stat` file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct V1CpuStat {
    pub nr_periods: u64,
    pub nr_throttled: u64,
    /// Total throttled time in nanoseconds.
    pub throttled_time: u64,
}

type V1Setter = fn(&mut V1CpuStat, u64);

static V1_SETTERS: LazyLock<HashMap<&'static str, V1Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, V1Setter> = HashMap::with_capacity(3);

    m.insert("nr_periods", |s, v| s.nr_periods = v);
    m.insert("nr_throttled", |s, v| s.nr_throttled = v);
    m.insert("throttled_time", |s, v| s.throttled_time = v);

    m
});

impl KeyValueStat for V1CpuStat {
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &V1_SETTERS
    }
}

/// User and system time from `cpuacct.stat`, in clock ticks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuacctStat {
    pub user: u64,
    pub system: u64,
}

type CpuacctSetter = fn(&mut CpuacctStat, u64);

static CPUACCT_SETTERS: LazyLock<HashMap<&'static str, CpuacctSetter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, CpuacctSetter> = HashMap::with_capacity(2);

    m.insert("user", |s, v| s.user = v);
    m.insert("system", |s, v| s.system = v);

    m
});

impl KeyValueStat for CpuacctStat {
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &CPUACCT_SETTERS
    }
}

/// Per-CPU usage in nanoseconds from `cpuacct.usage_percpu`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PercpuUsage(pub Vec<u64>);

impl SingleLineStat for PercpuUsage {
    /// Parses a line of whitespace-separated counters. An empty file yields no CPUs.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let usage = line
            .split_whitespace()
            .map(|value| {
                value
                    .parse::<u64>()
                    .map_err(|source| StatParseError::InvalidValue {
                        value: value.to_owned(),
                        line: 1,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PercpuUsage(usage))
    }
}
