//! Typed readers for individual kernel-authored stat files.
//!
//! Each reader parses one file format into counters; assembling them into a
//! raw sample is the job of [`crate::fetcher`].
//!
//! | Controller | v1 files | v2 files |
//! |---|---|---|
//! | CPU | `cpuacct.usage`, `cpuacct.stat`, `cpuacct.usage_percpu`, `cpu.shares`, `cpu.stat` | `cpu.stat` |
//! | Memory | `memory.usage_in_bytes`, `memory.limit_in_bytes`, `memory.stat`, `memory.kmem.usage_in_bytes`, `memory.soft_limit_in_bytes`, `memory.memsw.*` | `memory.current`, `memory.max`, `memory.stat`, `memory.swap.current`, `memory.swap.max`, `memory.low` |
//! | PIDs | `pids.current`, `pids.max` | same |
//! | Block I/O | `blkio.throttle.io_service_bytes`, `blkio.throttle.io_serviced` | `io.stat` |
//! | Cpuset | `cpuset.cpus` | `cpuset.cpus.effective` |
//!
//! Network counters come from `/proc/<pid>/net/dev`.

mod cpu;
mod cpuset;
mod error;
mod io;
mod memory;
mod net;
mod parser;
mod pids;

pub use cpu::{
    CLOCK_TICKS_PER_SECOND, CpuStat, CpuacctStat, PercpuUsage, V1CpuStat, ticks_to_nanos,
};
pub use cpuset::count_cpuset_cpus;
pub use error::StatParseError;
pub use io::{BlkioEntry, BlkioStats, OP_READ, OP_WRITE, parse_v1_blkio};
pub use memory::{MemoryStat, V1MemoryStat};
pub use net::NetworkStat;
pub use parser::{KeyValueStat, SingleLineStat};
pub use pids::{PidsStat, read_pids};
