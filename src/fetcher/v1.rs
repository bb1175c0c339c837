use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{
    RawCpu, RawMemory, RawMetricsFetcher, RawSample, Result, StatReader, container_pid, host_cpus,
    read_network, resolve_limit_cores,
};
use crate::cgroup::CgroupV1Paths;
use crate::cgroup::stats::{
    BlkioStats, CpuacctStat, KeyValueStat, PercpuUsage, SingleLineStat, V1CpuStat, V1MemoryStat,
    parse_v1_blkio, ticks_to_nanos,
};
use crate::container::ContainerInspection;
use crate::error::ResultOkLogExt;
use crate::system::SystemCpuReader;

/// Fetcher for hosts with one hierarchy per controller.
#[derive(Debug, Clone)]
pub struct V1Fetcher {
    host_root: PathBuf,
    system: SystemCpuReader,
}

impl V1Fetcher {
    pub fn new(host_root: &Path) -> Self {
        Self {
            host_root: host_root.to_path_buf(),
            system: SystemCpuReader::new(host_root),
        }
    }

    fn read_cpu(&self, reader: &StatReader<'_>, inspection: &ContainerInspection) -> RawCpu {
        let acct = reader
            .parse("cpuacct", "cpuacct.stat", CpuacctStat::from_reader)
            .unwrap_or_default();
        let throttling = reader
            .parse("cpu", "cpu.stat", V1CpuStat::from_reader)
            .unwrap_or_default();
        let PercpuUsage(percpu_usage) = reader
            .parse("cpuacct", "cpuacct.usage_percpu", PercpuUsage::from_reader)
            .unwrap_or_default();
        let system = self
            .system
            .read_usage()
            .ok_log_with(format_args!("container `{}`", inspection.id))
            .unwrap_or_default();

        let online_cpus = host_cpus(&system, &percpu_usage);
        let cpuset = reader.cpuset("cpuset.cpus");

        RawCpu {
            total_usage: reader.uint("cpuacct", "cpuacct.usage"),
            usage_in_usermode: ticks_to_nanos(acct.user),
            usage_in_kernelmode: ticks_to_nanos(acct.system),
            percpu_usage,
            system_usage: system.usage_ns,
            online_cpus,
            throttling_periods: throttling.nr_periods,
            throttled_periods: throttling.nr_throttled,
            throttled_time_ns: throttling.throttled_time,
            shares: reader.uint("cpu", "cpu.shares"),
            limit_cores: resolve_limit_cores(&inspection.host_config, cpuset, online_cpus),
        }
    }
}

fn read_memory(reader: &StatReader<'_>) -> RawMemory {
    let stat = reader
        .parse("memory", "memory.stat", V1MemoryStat::from_reader)
        .unwrap_or_default();

    RawMemory {
        usage_limit: reader.uint("memory", "memory.limit_in_bytes"),
        cache: stat.cache,
        rss: stat.rss,
        swap_usage: reader.optional_uint("memory", "memory.memsw.usage_in_bytes"),
        fuzz_usage: reader.uint("memory", "memory.usage_in_bytes"),
        kernel_usage: reader.uint("memory", "memory.kmem.usage_in_bytes"),
        swap_limit: reader.optional_uint("memory", "memory.memsw.limit_in_bytes"),
        soft_limit: reader.uint("memory", "memory.soft_limit_in_bytes"),
    }
}

fn read_blkio(reader: &StatReader<'_>) -> BlkioStats {
    BlkioStats {
        service_bytes: reader
            .parse("blkio", "blkio.throttle.io_service_bytes", parse_v1_blkio)
            .unwrap_or_default(),
        serviced: reader
            .parse("blkio", "blkio.throttle.io_serviced", parse_v1_blkio)
            .unwrap_or_default(),
    }
}

impl RawMetricsFetcher for V1Fetcher {
    fn fetch(&self, inspection: &ContainerInspection) -> Result<RawSample> {
        let id = &inspection.id;
        let pid = container_pid(inspection)?;
        let time = SystemTime::now();

        let paths = CgroupV1Paths::resolve(&self.host_root, pid).map_err(|source| {
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
            memory: read_memory(&reader),
            pids: reader.pids(),
            blkio: read_blkio(&reader),
            network,
        })
    }
}
