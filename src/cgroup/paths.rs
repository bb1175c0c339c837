//! Resolution of absolute cgroup stat-file paths for a process.
//!
//! The mount table and the process membership are parsed fresh on every
//! resolution, as both may change between samples.

use std::io;
use std::path::{Path, PathBuf};

use crate::fsutil;
use crate::mounts::{self, CGROUP_V1_FS_TYPE, CGROUP_V2_FS_TYPE, MountPoints};

use super::membership::{self, CgroupMembership};
use super::stats::StatParseError;

/// Controllers read by the v1 fetcher.
pub const V1_CONTROLLERS: [&str; 6] = ["blkio", "cpu", "cpuacct", "cpuset", "memory", "pids"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read mount table: {0}")]
    Mounts(#[from] mounts::Error),
    #[error("failed to read cgroup membership: {0}")]
    Membership(#[from] membership::Error),
    #[error("cgroup controller `{controller}` is not mounted or not joined by the process")]
    MissingController { controller: String },
    #[error("no cgroup controller could be resolved for pid {pid}")]
    NoControllers { pid: u32 },
}

impl Error {
    /// Returns `true` if a file needed for resolution is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Mounts(err) => err.is_not_found(),
            Error::Membership(err) => err.is_not_found(),
            Error::MissingController { .. } | Error::NoControllers { .. } => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Absolute stat-file locations of one process, per controller.
pub trait CgroupPaths {
    /// Returns the group directory of `controller`.
    fn full_path(&self, controller: &str) -> Result<PathBuf>;

    /// Returns the path of `file` inside the group directory of `controller`.
    fn stat_file(&self, controller: &str, file: &str) -> Result<PathBuf> {
        Ok(self.full_path(controller)?.join(file))
    }

    /// Reads a single unsigned value from `file` of `controller`.
    ///
    /// See [`parse_uint_stat`] for the normalizations applied.
    fn single_file_uint_stat(&self, controller: &str, file: &str) -> io::Result<u64> {
        let path = self
            .stat_file(controller, file)
            .map_err(|err| io::Error::new(io::ErrorKind::NotFound, err))?;
        single_file_uint_stat(&path)
    }
}

/// Reads and trims `path`, then applies [`parse_uint_stat`].
pub fn single_file_uint_stat(path: &Path) -> io::Result<u64> {
    let value = fsutil::parse_file(path, fsutil::read_trimmed_line)?;
    Ok(parse_uint_stat(&value)?)
}

/// Parses the content of a single-value cgroup file.
///
/// `"max"` becomes [`u64::MAX`], the "no limit" sentinel. A negative value
/// (e.g. `-1` in `memory.soft_limit_in_bytes` on old kernels) becomes `0`,
/// however far it is out of range.
///
/// # Errors
///
/// Returns [`StatParseError::InvalidValue`] for anything else that is not a number.
pub fn parse_uint_stat(value: &str) -> std::result::Result<u64, StatParseError> {
    if value == "max" {
        return Ok(u64::MAX);
    }
    match value.parse::<u64>() {
        Ok(v) => Ok(v),
        Err(_) if is_negative_integer(value) => Ok(0),
        Err(source) => Err(StatParseError::InvalidValue {
            value: value.to_owned(),
            line: 1,
            source,
        }),
    }
}

fn is_negative_integer(value: &str) -> bool {
    value
        .strip_prefix('-')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Paths in cgroup v1, where each controller has its own hierarchy.
#[derive(Debug, Clone)]
pub struct CgroupV1Paths {
    mount_points: MountPoints,
    membership: CgroupMembership,
}

impl CgroupV1Paths {
    /// Resolves the v1 paths of `pid` from the host mount table and membership file.
    ///
    /// # Errors
    ///
    /// Fails if either file can't be read, or if none of [`V1_CONTROLLERS`]
    /// resolves to a directory.
    pub fn resolve(host_root: &Path, pid: u32) -> Result<Self> {
        let mount_points = mounts::cgroup_v1_mount_points(host_root, CGROUP_V1_FS_TYPE)?;
        let membership = membership::read_v1_membership(host_root, pid)?;
        let paths = Self::new(mount_points, membership);

        if !V1_CONTROLLERS.iter().any(|c| paths.full_path(c).is_ok()) {
            return Err(Error::NoControllers { pid });
        }
        Ok(paths)
    }

    pub fn new(mount_points: MountPoints, membership: CgroupMembership) -> Self {
        Self {
            mount_points,
            membership,
        }
    }
}

impl CgroupPaths for CgroupV1Paths {
    fn full_path(&self, controller: &str) -> Result<PathBuf> {
        let missing = || Error::MissingController {
            controller: controller.to_owned(),
        };
        let mount_point = self.mount_points.get(controller).ok_or_else(missing)?;
        let group = self.membership.get(controller).ok_or_else(missing)?;
        Ok(mount_point
            .join(controller)
            .join(group.trim_start_matches('/')))
    }
}

/// Paths in cgroup v2, where all controllers share one unified group directory.
#[derive(Debug, Clone)]
pub struct CgroupV2Paths {
    group_dir: PathBuf,
}

impl CgroupV2Paths {
    /// Resolves the unified group directory of `pid`.
    pub fn resolve(host_root: &Path, pid: u32) -> Result<Self> {
        let mount_point = mounts::cgroup_v2_mount_point(host_root, CGROUP_V2_FS_TYPE)?;
        let group = membership::read_v2_membership(host_root, pid)?;
        Ok(Self::new(&mount_point, &group))
    }

    pub fn new(mount_point: &Path, group: &str) -> Self {
        Self {
            group_dir: mount_point.join(group.trim_start_matches('/')),
        }
    }
}

impl CgroupPaths for CgroupV2Paths {
    fn full_path(&self, _controller: &str) -> Result<PathBuf> {
        Ok(self.group_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_paths() -> CgroupV1Paths {
        let mount_points = MountPoints::from([
            ("cpu".to_owned(), PathBuf::from("/host/sys/fs/cgroup")),
            ("memory".to_owned(), PathBuf::from("/host/sys/fs/cgroup")),
        ]);
        let membership = CgroupMembership::from([
            ("cpu".to_owned(), "/docker/abc".to_owned()),
            ("pids".to_owned(), "/docker/abc".to_owned()),
            ("memory".to_owned(), "/docker/abc".to_owned()),
        ]);
        CgroupV1Paths::new(mount_points, membership)
    }

    #[test]
    fn test_v1_full_path_joins_controller() {
        let paths = v1_paths();
        assert_eq!(
            paths.full_path("memory").unwrap(),
            PathBuf::from("/host/sys/fs/cgroup/memory/docker/abc")
        );
        assert_eq!(
            paths.stat_file("cpu", "cpu.shares").unwrap(),
            PathBuf::from("/host/sys/fs/cgroup/cpu/docker/abc/cpu.shares")
        );
    }

    #[test]
    fn test_v1_missing_mount_or_membership() {
        let paths = v1_paths();
        // joined but not mounted
        assert!(matches!(
            paths.full_path("pids"),
            Err(Error::MissingController { .. })
        ));
        // neither
        assert!(paths.full_path("blkio").is_err());
    }

    #[test]
    fn test_v2_shared_group_dir() {
        let paths = CgroupV2Paths::new(Path::new("/sys/fs/cgroup"), "/system.slice/docker-abc.scope");
        let expected = PathBuf::from("/sys/fs/cgroup/system.slice/docker-abc.scope");
        assert_eq!(paths.full_path("memory").unwrap(), expected);
        assert_eq!(paths.full_path("pids").unwrap(), expected);
    }

    #[test]
    fn test_parse_uint_stat() {
        assert_eq!(parse_uint_stat("4096").unwrap(), 4096);
        assert_eq!(parse_uint_stat("max").unwrap(), u64::MAX);
        assert_eq!(parse_uint_stat("-1").unwrap(), 0);
        assert_eq!(parse_uint_stat("-99999999999999999999").unwrap(), 0);
        assert!(parse_uint_stat("-").is_err());
        assert!(parse_uint_stat("-1x").is_err());
        let err = parse_uint_stat("abc").unwrap_err();
        assert!(matches!(err, StatParseError::InvalidValue { value, .. } if value == "abc"));
    }

    #[test]
    fn test_single_file_uint_stat_trims() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("pids.max");
        std::fs::write(&path, "max\n").unwrap();
        assert_eq!(single_file_uint_stat(&path).unwrap(), u64::MAX);

        std::fs::write(&path, " 12 \n").unwrap();
        assert_eq!(single_file_uint_stat(&path).unwrap(), 12);
    }

    #[test]
    fn test_single_file_uint_stat_missing_file() {
        let err = single_file_uint_stat(Path::new("/definitely/does/not/exist")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_v1_resolve_from_host_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("proc/42")).unwrap();
        std::fs::write(
            root.path().join("proc/mounts"),
            "cgroup /sys/fs/cgroup/memory cgroup rw,nosuid,memory 0 0\n",
        )
        .unwrap();
        std::fs::write(root.path().join("proc/42/cgroup"), "5:memory:/docker/abc\n").unwrap();

        let paths = CgroupV1Paths::resolve(root.path(), 42).unwrap();
        assert_eq!(
            paths.full_path("memory").unwrap(),
            root.path().join("sys/fs/cgroup/memory/docker/abc")
        );
    }

    #[test]
    fn test_v1_resolve_no_controllers() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("proc/42")).unwrap();
        std::fs::write(
            root.path().join("proc/mounts"),
            "cgroup /sys/fs/cgroup/memory cgroup rw,nosuid,memory 0 0\n",
        )
        .unwrap();
        std::fs::write(root.path().join("proc/42/cgroup"), "1:name=systemd:/docker/abc\n").unwrap();

        let err = CgroupV1Paths::resolve(root.path(), 42).unwrap_err();
        assert!(matches!(err, Error::NoControllers { pid: 42 }));
    }
}
