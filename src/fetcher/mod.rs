//! Raw metrics acquisition.
//!
//! A [`RawMetricsFetcher`] turns one container inspection into one
//! [`RawSample`]. The implementation is chosen once at startup from the
//! host's cgroup version ([`new_fetcher`]).
//!
//! Failure policy: a fetch fails only when the cgroup location can't be
//! resolved or the network counters can't be read. Any other file that is
//! missing or malformed is logged and leaves its part of the sample zeroed.
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::cgroup::paths::{self, CgroupPaths};
use crate::cgroup::stats::{BlkioStats, NetworkStat, PidsStat, count_cpuset_cpus};
use crate::container::{ContainerID, ContainerInspection, HostConfig};
use crate::error::ResultOkLogExt;
use crate::system::SystemCpuUsage;
use crate::{fsutil, mounts};

mod v1;
mod v2;

pub use v1::V1Fetcher;
pub use v2::V2Fetcher;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("container `{id}` has no running process")]
    NoProcess { id: ContainerID },
    #[error("failed to resolve cgroup of container `{id}`: {source}")]
    CgroupPaths {
        id: ContainerID,
        #[source]
        source: paths::Error,
    },
    #[error("failed to read network stats of container `{id}` from `{path}`: {source}")]
    Network {
        id: ContainerID,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to detect cgroup version: {0}")]
    Detect(#[from] mounts::Error),
    #[error("no cgroup filesystem mounted")]
    NoCgroupMounted,
    #[error("unsupported cgroup version `{0}`")]
    UnsupportedVersion(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// CPU counters of one sample. This is what the sample store persists.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawCpu {
    /// Cumulative CPU time of the group, in nanoseconds.
    pub total_usage: u64,
    /// Cumulative user-mode CPU time, in nanoseconds.
    pub usage_in_usermode: u64,
    /// Cumulative kernel-mode CPU time, in nanoseconds.
    pub usage_in_kernelmode: u64,
    /// Per-CPU cumulative usage in nanoseconds (v1 only).
    pub percpu_usage: Vec<u64>,
    /// Cumulative host CPU time, in nanoseconds.
    pub system_usage: u64,
    pub online_cpus: u32,
    /// Elapsed enforcement periods.
    pub throttling_periods: u64,
    /// Periods in which the group was throttled.
    pub throttled_periods: u64,
    pub throttled_time_ns: u64,
    pub shares: u64,
    /// Effective CPU limit in cores.
    pub limit_cores: f64,
}

/// Memory counters of one sample, in bytes.
///
/// Limits use [`u64::MAX`] (or any near-maximum value) for "no limit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawMemory {
    /// Usage limit.
    pub usage_limit: u64,
    /// Page cache.
    pub cache: u64,
    /// Anonymous memory.
    pub rss: u64,
    /// Combined memory + swap usage.
    pub swap_usage: u64,
    /// The kernel's approximate memory usage counter.
    pub fuzz_usage: u64,
    pub kernel_usage: u64,
    /// Combined memory + swap limit.
    pub swap_limit: u64,
    pub soft_limit: u64,
}

/// Point-in-time raw snapshot of one container.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub container_id: ContainerID,
    pub time: SystemTime,
    pub cpu: RawCpu,
    pub memory: RawMemory,
    pub pids: PidsStat,
    pub blkio: BlkioStats,
    pub network: NetworkStat,
}

/// Collects a [`RawSample`] for an inspected container.
pub trait RawMetricsFetcher: Send + Sync {
    fn fetch(&self, inspection: &ContainerInspection) -> Result<RawSample>;
}

/// Cgroup hierarchy layout of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupVersion {
    V1,
    V2,
}

impl CgroupVersion {
    /// Parses the version as reported by the container engine (`"1"`, `"2"`).
    pub fn from_info_str(version: &str) -> Result<Self> {
        match version.trim() {
            "1" => Ok(CgroupVersion::V1),
            "2" => Ok(CgroupVersion::V2),
            other => Err(Error::UnsupportedVersion(other.to_owned())),
        }
    }
}

/// Detects the cgroup version from the host mount table.
///
/// Hybrid hosts, which mount v1 controllers next to a unified hierarchy,
/// are treated as v1.
pub fn detect_cgroup_version(host_root: &Path) -> Result<CgroupVersion> {
    let mounted = mounts::mounted_cgroups(host_root)?;
    match (mounted.v1, mounted.v2) {
        (true, _) => Ok(CgroupVersion::V1),
        (false, true) => Ok(CgroupVersion::V2),
        (false, false) => Err(Error::NoCgroupMounted),
    }
}

/// Creates the fetcher for `version` reading below `host_root`.
pub fn new_fetcher(version: CgroupVersion, host_root: &Path) -> Box<dyn RawMetricsFetcher> {
    log::debug!("Using cgroup {version:?} fetcher below `{}`", host_root.display());
    match version {
        CgroupVersion::V1 => Box::new(V1Fetcher::new(host_root)),
        CgroupVersion::V2 => Box::new(V2Fetcher::new(host_root)),
    }
}

/// Returns the host PID of an inspected container.
fn container_pid(inspection: &ContainerInspection) -> Result<u32> {
    match inspection.state.pid {
        0 => Err(Error::NoProcess {
            id: inspection.id.clone(),
        }),
        pid => Ok(pid),
    }
}

/// Reads the aggregated network counters of `pid`'s network namespace.
fn read_network(host_root: &Path, id: &ContainerID, pid: u32) -> Result<NetworkStat> {
    let path = fsutil::host_path(host_root, format!("/proc/{pid}/net/dev"));
    fsutil::parse_file(&path, NetworkStat::from_reader).map_err(|source| Error::Network {
        id: id.clone(),
        path,
        source,
    })
}

/// Reads the stat files of one container, treating every failure as partial.
struct StatReader<'a> {
    id: &'a ContainerID,
    paths: &'a dyn CgroupPaths,
}

impl<'a> StatReader<'a> {
    fn new(id: &'a ContainerID, paths: &'a dyn CgroupPaths) -> Self {
        Self { id, paths }
    }

    /// Parses `file` of `controller`, logging a failure as a warning.
    fn parse<T>(
        &self,
        controller: &str,
        file: &str,
        parse: impl FnOnce(&mut BufReader<File>) -> io::Result<T>,
    ) -> Option<T> {
        self.paths
            .stat_file(controller, file)
            .map_err(|err| io::Error::new(io::ErrorKind::NotFound, err))
            .and_then(|path| fsutil::parse_file(path, parse))
            .ok_log_with(format_args!("container `{}`: {file}", self.id))
    }

    /// Reads a single-value file, `0` on failure.
    fn uint(&self, controller: &str, file: &str) -> u64 {
        self.paths
            .single_file_uint_stat(controller, file)
            .ok_log_with(format_args!("container `{}`: {file}", self.id))
            .unwrap_or_default()
    }

    /// Reads a single-value file the kernel only provides when a feature is
    /// enabled (swap accounting, ...). Absence is not a failure.
    fn optional_uint(&self, controller: &str, file: &str) -> u64 {
        match self.paths.single_file_uint_stat(controller, file) {
            Ok(value) => value,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("container `{}`: {file} not present", self.id);
                0
            }
            Err(err) => {
                log::warn!("container `{}`: {file}: {err}", self.id);
                0
            }
        }
    }

    /// Counts the CPUs of a cpuset list file. Only a fallback for the CPU
    /// limit, so failures are not worth a warning.
    fn cpuset(&self, file: &str) -> Option<u64> {
        let cpus = self
            .paths
            .stat_file("cpuset", file)
            .map_err(|err| io::Error::new(io::ErrorKind::NotFound, err))
            .and_then(|path| {
                fsutil::parse_file(path, |buf| {
                    let cpus = fsutil::read_trimmed_line(buf)?;
                    Ok(count_cpuset_cpus(&cpus)?)
                })
            });
        match cpus {
            Ok(cpus) => Some(cpus),
            Err(err) => {
                log::debug!("container `{}`: {file}: {err}", self.id);
                None
            }
        }
    }

    fn pids(&self) -> PidsStat {
        crate::cgroup::stats::read_pids(self.paths)
            .ok_log_with(format_args!("container `{}`: pids", self.id))
            .unwrap_or_default()
    }
}

/// Number of host CPUs: `/proc/stat`, then the per-CPU counters, then the
/// CPUs visible to this process.
fn host_cpus(system: &SystemCpuUsage, percpu: &[u64]) -> u32 {
    if system.online_cpus > 0 {
        return system.online_cpus;
    }
    match u32::try_from(percpu.len()) {
        Ok(n) if n > 0 => n,
        _ => available_cpus(),
    }
}

const NANOS_PER_CPU: f64 = 1e9;

/// Resolves the effective CPU limit in cores.
///
/// An explicit quota wins, then a measurable cpuset, then all host CPUs.
fn resolve_limit_cores(host_config: &HostConfig, cpuset_cpus: Option<u64>, host_cpus: u32) -> f64 {
    if host_config.nano_cpus > 0 {
        return host_config.nano_cpus as f64 / NANOS_PER_CPU;
    }
    match cpuset_cpus {
        Some(cpus) if cpus > 0 => cpus as f64,
        _ => f64::from(host_cpus),
    }
}

/// Number of logical CPUs visible to this process, used when procfs doesn't tell.
fn available_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::Path;

    use crate::container::{
        ContainerID, ContainerInspection, ContainerState, ContainerStatus, HostConfig,
    };

    pub const PID: u32 = 4242;

    pub const PROC_STAT: &str = "\
cpu  100 0 100 800 0 0 0 0 0 0
cpu0 50 0 50 400 0 0 0 0 0 0
cpu1 50 0 50 400 0 0 0 0 0 0
";

    pub const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 999 9 0 0 0 0 0 0 999 9 0 0 0 0 0 0
  eth0: 1000 10 1 2 0 0 0 0 2000 20 3 4 0 0 0 0
";

    pub fn running(host_config: HostConfig) -> ContainerInspection {
        ContainerInspection {
            id: ContainerID::new("abc").unwrap(),
            state: ContainerState {
                status: ContainerStatus::Running,
                pid: PID,
                finished_at: None,
            },
            restart_count: 0,
            host_config,
        }
    }

    pub fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_from_nano_cpus() {
        let host_config = HostConfig {
            nano_cpus: 1_500_000_000,
            ..Default::default()
        };
        assert_eq!(resolve_limit_cores(&host_config, Some(4), 8), 1.5);
    }

    #[test]
    fn test_limit_from_cpuset() {
        assert_eq!(resolve_limit_cores(&HostConfig::default(), Some(4), 8), 4.0);
    }

    #[test]
    fn test_limit_from_host_cpus() {
        assert_eq!(resolve_limit_cores(&HostConfig::default(), None, 8), 8.0);
        assert_eq!(resolve_limit_cores(&HostConfig::default(), Some(0), 8), 8.0);
    }

    #[test]
    fn test_version_from_info() {
        assert_eq!(CgroupVersion::from_info_str("2").unwrap(), CgroupVersion::V2);
        assert!(matches!(
            CgroupVersion::from_info_str("3"),
            Err(Error::UnsupportedVersion(v)) if v == "3"
        ));
    }

    #[test]
    fn test_detect_version() {
        let root = tempfile::tempdir().unwrap();
        testutil::write(
            root.path(),
            "proc/mounts",
            "cgroup2 /sys/fs/cgroup cgroup2 rw,nosuid 0 0\n",
        );
        assert_eq!(detect_cgroup_version(root.path()).unwrap(), CgroupVersion::V2);

        testutil::write(
            root.path(),
            "proc/mounts",
            "cgroup2 /sys/fs/cgroup/unified cgroup2 rw 0 0\ncgroup /sys/fs/cgroup/memory cgroup rw,memory 0 0\n",
        );
        assert_eq!(detect_cgroup_version(root.path()).unwrap(), CgroupVersion::V1);

        testutil::write(
            root.path(),
            "proc/mounts",
            "cgroup2 /sys/fs/cgroup cgroup2 rw,nosuid,nsdelegate 0 0\ncgroup /sys/fs/cgroup/systemd cgroup rw,nosuid,xattr,name=systemd 0 0\n",
        );
        assert_eq!(detect_cgroup_version(root.path()).unwrap(), CgroupVersion::V2);

        testutil::write(root.path(), "proc/mounts", "proc /proc proc rw 0 0\n");
        assert!(matches!(
            detect_cgroup_version(root.path()),
            Err(Error::NoCgroupMounted)
        ));
    }

    #[test]
    fn test_network_read_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let id = ContainerID::new("abc").unwrap();
        let err = read_network(root.path(), &id, testutil::PID).unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
    }

    #[test]
    fn test_host_cpus_fallback() {
        let system = SystemCpuUsage {
            usage_ns: 0,
            online_cpus: 4,
        };
        assert_eq!(host_cpus(&system, &[1, 2]), 4);
        assert_eq!(host_cpus(&SystemCpuUsage::default(), &[1, 2]), 2);
        assert!(host_cpus(&SystemCpuUsage::default(), &[]) >= 1);
    }

    #[test]
    fn test_stat_reader_partial() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memory.current"), "42\n").unwrap();
        std::fs::write(dir.path().join("memory.max"), "garbage\n").unwrap();
        let id = ContainerID::new("abc").unwrap();
        let paths = paths::CgroupV2Paths::new(dir.path(), "/");
        let reader = StatReader::new(&id, &paths);

        assert_eq!(reader.uint("memory", "memory.current"), 42);
        assert_eq!(reader.uint("memory", "memory.max"), 0);
        assert_eq!(reader.optional_uint("memory", "memory.swap.current"), 0);
        assert_eq!(reader.cpuset("cpuset.cpus.effective"), None);
    }

    #[test]
    fn test_no_process() {
        let mut inspection = testutil::running(HostConfig::default());
        inspection.state.pid = 0;
        assert!(matches!(
            container_pid(&inspection),
            Err(Error::NoProcess { .. })
        ));
    }
}
