use crate::cgroup::paths::CgroupPaths;

/// Task counters of the `pids` controller, identical in both cgroup versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PidsStat {
    /// Number of tasks in the group (`pids.current`).
    pub current: u64,
    /// Task limit (`pids.max`), `0` when unlimited.
    pub limit: u64,
}

/// Reads `pids.current` and `pids.max` of the group.
pub fn read_pids(paths: &dyn CgroupPaths) -> std::io::Result<PidsStat> {
    let current = paths.single_file_uint_stat("pids", "pids.current")?;
    let limit = match paths.single_file_uint_stat("pids", "pids.max")? {
        u64::MAX => 0,
        limit => limit,
    };
    Ok(PidsStat { current, limit })
}
