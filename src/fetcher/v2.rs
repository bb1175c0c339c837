use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{
    RawCpu, RawMemory, RawMetricsFetcher, RawSample, Result, StatReader, container_pid, host_cpus,
    read_network, resolve_limit_cores,
};
use crate::cgroup::CgroupV2Paths;
use crate::cgroup::stats::{BlkioStats, CpuStat, KeyValueStat, MemoryStat};
use crate::container::{ContainerInspection, HostConfig};
use crate::error::ResultOkLogExt;
use crate::system::SystemCpuReader;

const NANOS_PER_MICRO: u64 = 1_000;

fn micros_to_nanos(micros: u64) -> u64 {
    micros.saturating_mul(NANOS_PER_MICRO)
}

/// Fetcher for hosts with the unified hierarchy.
///
/// Counters are mapped onto the v1 shape: microsecond CPU times become
/// nanoseconds, and the separate swap counters are combined with the
/// memory counters the way `memory.memsw.*` reports them.
#[derive(Debug, Clone)]
pub struct V2Fetcher {
    host_root: PathBuf,
    system: SystemCpuReader,
}

impl V2Fetcher {
    pub fn new(host_root: &Path) -> Self {
        Self {
            host_root: host_root.to_path_buf(),
            system: SystemCpuReader::new(host_root),
        }
    }

    fn read_cpu(&self, reader: &StatReader<'_>, inspection: &ContainerInspection) -> RawCpu {
        let stat = reader
            .parse("cpu", "cpu.stat", CpuStat::from_reader)
            .unwrap_or_default();
        let system = self
            .system
            .read_usage()
            .ok_log_with(format_args!("container `{}`", inspection.id))
            .unwrap_or_default();

        let online_cpus = host_cpus(&system, &[]);
        let cpuset = reader.cpuset("cpuset.cpus.effective");

        RawCpu {
            total_usage: micros_to_nanos(stat.usage_usec),
            usage_in_usermode: micros_to_nanos(stat.user_usec),
            usage_in_kernelmode: micros_to_nanos(stat.system_usec),
            percpu_usage: Vec::new(),
            system_usage: system.usage_ns,
            online_cpus,
            throttling_periods: stat.nr_periods,
            throttled_periods: stat.nr_throttled,
            throttled_time_ns: micros_to_nanos(stat.throttled_usec),
            shares: inspection.host_config.cpu_shares,
            limit_cores: resolve_limit_cores(&inspection.host_config, cpuset, online_cpus),
        }
    }
}

/// `memory.low` holds the soft limit; engines that don't set it leave the
/// reservation only in the container config.
fn read_memory(reader: &StatReader<'_>, host_config: &HostConfig) -> RawMemory {
    let stat = reader
        .parse("memory", "memory.stat", MemoryStat::from_reader)
        .unwrap_or_default();
    let current = reader.uint("memory", "memory.current");
    let max = reader.uint("memory", "memory.max");
    let swap_current = reader.optional_uint("memory", "memory.swap.current");
    let swap_max = reader.optional_uint("memory", "memory.swap.max");

    RawMemory {
        usage_limit: max,
        cache: stat.file,
        rss: stat.anon,
        swap_usage: swap_current.saturating_add(current),
        fuzz_usage: current,
        kernel_usage: stat.kernel_usage(),
        swap_limit: swap_max.saturating_add(max),
        soft_limit: match reader.optional_uint("memory", "memory.low") {
            0 => host_config.memory_reservation,
            low => low,
        },
    }
}

impl RawMetricsFetcher for V2Fetcher {
    fn fetch(&self, inspection: &ContainerInspection) -> Result<RawSample> {
        let id = &inspection.id;
        let pid = container_pid(inspection)?;
        let time = SystemTime::now();

        let paths = CgroupV2Paths::resolve(&self.host_root, pid).map_err(|source| {
            super::Error::CgroupPaths {
                id: id.clone(),
                source,
            }
        })?;
        let network = read_network(&self.host_root, id, pid)?;
        let reader = StatReader::new(id, &paths);

        Ok(RawSample {
            container_id: id.clone(),
            time,
            cpu: self.read_cpu(&reader, inspection),
            memory: read_memory(&reader, &inspection.host_config),
            pids: reader.pids(),
            blkio: reader
                .parse("io", "io.stat", BlkioStats::from_io_stat)
                .unwrap_or_default(),
            network,
        })
    }
}
