use std::collections::HashMap;
use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::fsutil;

use super::parser::{MountEntry, parse_mount_line};
use super::{Error, Result};

/// Filesystem type of cgroup v1 hierarchies.
pub const CGROUP_V1_FS_TYPE: &str = "cgroup";
/// Filesystem type of the cgroup v2 unified hierarchy.
pub const CGROUP_V2_FS_TYPE: &str = "cgroup2";

/// Controllers that may appear in the options of a cgroup v1 mount.
const KNOWN_CONTROLLERS: [&str; 14] = [
    "blkio",
    "cpu",
    "cpuacct",
    "cpuset",
    "devices",
    "freezer",
    "hugetlb",
    "memory",
    "misc",
    "net_cls",
    "net_prio",
    "perf_event",
    "pids",
    "rdma",
];

/// Controller name to the host-visible directory holding its hierarchy.
///
/// For `/sys/fs/cgroup/cpu,cpuacct` both `cpu` and `cpuacct` map to
/// `/sys/fs/cgroup`; the controller name is joined back on during path
/// resolution.
pub type MountPoints = HashMap<String, PathBuf>;

/// Which cgroup filesystems are present in a mount table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountedCgroups {
    pub v1: bool,
    pub v2: bool,
}

/// Location of the host mount table below `host_root`.
pub fn mounts_path(host_root: &Path) -> PathBuf {
    fsutil::host_path(host_root, "/proc/mounts")
}

/// Builds the controller map from every `fs_type` mount in the mount table.
///
/// # Errors
///
/// - [`Error::FileOpen`] if the mount table can't be opened.
/// - [`Error::ReadLine`] / [`Error::Parse`] if a line can't be read or parsed.
/// - [`Error::MissingMount`] if no mount names a known controller.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use cgroup_sampler::mounts::{cgroup_v1_mount_points, CGROUP_V1_FS_TYPE};
///
/// let mount_points = cgroup_v1_mount_points(Path::new("/"), CGROUP_V1_FS_TYPE).unwrap();
/// println!("memory root: {:?}", mount_points.get("memory"));
/// ```
pub fn cgroup_v1_mount_points(host_root: &Path, fs_type: &str) -> Result<MountPoints> {
    let path = mounts_path(host_root);
    let buf = fsutil::open_file_reader(&path)?;
    cgroup_v1_mount_points_from_reader(buf, &path, host_root, fs_type)
}

/// Returns the host-visible mount point of the first `fs_type` mount.
///
/// # Errors
///
/// Same as [`cgroup_v1_mount_points`], with [`Error::MissingMount`] when no
/// line has the given filesystem type.
pub fn cgroup_v2_mount_point(host_root: &Path, fs_type: &str) -> Result<PathBuf> {
    let path = mounts_path(host_root);
    let buf = fsutil::open_file_reader(&path)?;
    cgroup_v2_mount_point_from_reader(buf, &path, host_root, fs_type)
}

/// Reports which cgroup filesystem versions are mounted.
///
/// A v1 mount only counts when it carries a known controller. Named
/// hierarchies such as `name=systemd` hold no accounting files.
pub fn mounted_cgroups(host_root: &Path) -> Result<MountedCgroups> {
    let path = mounts_path(host_root);
    let buf = fsutil::open_file_reader(&path)?;
    mounted_cgroups_from_reader(buf, &path)
}

fn mounted_cgroups_from_reader<R: BufRead>(reader: R, origin: &Path) -> Result<MountedCgroups> {
    let mut mounted = MountedCgroups::default();
    for_each_mount(reader, origin, |entry| {
        match entry.fs_type {
            CGROUP_V1_FS_TYPE if has_known_controller(entry) => mounted.v1 = true,
            CGROUP_V1_FS_TYPE => {
                log::debug!("Ignoring cgroup v1 mount without controllers: {}", entry.mount_point);
            }
            CGROUP_V2_FS_TYPE => mounted.v2 = true,
            _ => {}
        }
        ControlFlow::Continue(())
    })?;
    Ok(mounted)
}

fn has_known_controller(entry: &MountEntry<'_>) -> bool {
    entry.options().any(|opt| KNOWN_CONTROLLERS.contains(&opt))
}

fn cgroup_v1_mount_points_from_reader<R: BufRead>(
    reader: R,
    origin: &Path,
    host_root: &Path,
    fs_type: &str,
) -> Result<MountPoints> {
    let mut mount_points = MountPoints::new();

    for_each_mount(reader, origin, |entry| {
        if entry.fs_type != fs_type {
            return ControlFlow::Continue(());
        }
        let mount_point = Path::new(entry.mount_point);
        let Some(parent) = mount_point.parent() else {
            log::debug!("Ignoring cgroup mount without parent directory: {mount_point:?}");
            return ControlFlow::Continue(());
        };
        for controller in entry
            .options()
            .filter(|opt| KNOWN_CONTROLLERS.contains(opt))
        {
            log::trace!(
                "Found cgroup v1 controller `{controller}` mounted at `{}`",
                entry.mount_point
            );
            mount_points.insert(controller.to_owned(), fsutil::host_path(host_root, parent));
        }
        ControlFlow::Continue(())
    })?;

    if mount_points.is_empty() {
        return Err(Error::MissingMount {
            fs_type: fs_type.to_owned(),
            path: origin.to_path_buf(),
        });
    }
    Ok(mount_points)
}

fn cgroup_v2_mount_point_from_reader<R: BufRead>(
    reader: R,
    origin: &Path,
    host_root: &Path,
    fs_type: &str,
) -> Result<PathBuf> {
    let mut mount_point = None;

    for_each_mount(reader, origin, |entry| {
        if entry.fs_type == fs_type {
            log::debug!("Found `{fs_type}` mount point: {}", entry.mount_point);
            mount_point = Some(fsutil::host_path(host_root, entry.mount_point));
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    })?;

    mount_point.ok_or_else(|| Error::MissingMount {
        fs_type: fs_type.to_owned(),
        path: origin.to_path_buf(),
    })
}

/// Feeds every non-empty line of the mount table to `visit` until it breaks.
fn for_each_mount<R: BufRead>(
    mut reader: R,
    origin: &Path,
    mut visit: impl FnMut(&MountEntry<'_>) -> ControlFlow<()>,
) -> Result<()> {
    let mut line = String::with_capacity(256);

    while reader
        .read_line(&mut line)
        .map_err(|source| Error::ReadLine {
            path: origin.to_path_buf(),
            source,
        })?
        != 0
    {
        if !line.trim().is_empty() {
            let entry = parse_mount_line(line.as_str()).map_err(|source| Error::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
            if visit(&entry).is_break() {
                break;
            }
        }
        line.clear();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;

    const HYBRID_MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /sys/fs/cgroup tmpfs ro,nosuid,nodev,noexec,mode=755 0 0
cgroup2 /sys/fs/cgroup/unified cgroup2 rw,nosuid,nodev,noexec,relatime,nsdelegate 0 0
cgroup /sys/fs/cgroup/systemd cgroup rw,nosuid,nodev,noexec,relatime,xattr,name=systemd 0 0
cgroup /sys/fs/cgroup/cpu,cpuacct cgroup rw,nosuid,nodev,noexec,relatime,cpu,cpuacct 0 0
cgroup /sys/fs/cgroup/memory cgroup rw,nosuid,nodev,noexec,relatime,memory 0 0
cgroup /sys/fs/cgroup/pids cgroup rw,nosuid,nodev,noexec,relatime,pids 0 0
";

    fn new_cursor_from_contents(contents: &str) -> Cursor<Vec<u8>> {
        Cursor::new(contents.as_bytes().to_vec())
    }

    #[test]
    fn test_v1_joint_mount_registers_both_controllers() {
        let reader = new_cursor_from_contents(HYBRID_MOUNTS);
        let mount_points = cgroup_v1_mount_points_from_reader(
            reader,
            Path::new("/dummy"),
            Path::new("/"),
            CGROUP_V1_FS_TYPE,
        )
        .unwrap();

        assert_eq!(mount_points.len(), 4);
        assert_eq!(mount_points["cpu"], PathBuf::from("/sys/fs/cgroup"));
        assert_eq!(mount_points["cpuacct"], PathBuf::from("/sys/fs/cgroup"));
        assert_eq!(mount_points["memory"], PathBuf::from("/sys/fs/cgroup"));
        assert_eq!(mount_points["pids"], PathBuf::from("/sys/fs/cgroup"));
        assert!(!mount_points.contains_key("name=systemd"));
        assert!(!mount_points.contains_key("rw"));
    }

    #[test]
    fn test_v1_mount_points_are_prefixed_with_host_root() {
        let reader = new_cursor_from_contents(HYBRID_MOUNTS);
        let mount_points = cgroup_v1_mount_points_from_reader(
            reader,
            Path::new("/dummy"),
            Path::new("/rootfs"),
            CGROUP_V1_FS_TYPE,
        )
        .unwrap();
        assert_eq!(mount_points["memory"], PathBuf::from("/rootfs/sys/fs/cgroup"));
    }

    #[test]
    fn test_v1_missing_mount() {
        let reader = new_cursor_from_contents("proc /proc proc rw,relatime 0 0\n");
        let err = cgroup_v1_mount_points_from_reader(
            reader,
            Path::new("/dummy"),
            Path::new("/"),
            CGROUP_V1_FS_TYPE,
        )
        .unwrap_err();
        match err {
            Error::MissingMount { fs_type, path } => {
                assert_eq!(fs_type, "cgroup");
                assert_eq!(path, Path::new("/dummy"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_v2_first_unified_mount() {
        let reader = new_cursor_from_contents(HYBRID_MOUNTS);
        let mount = cgroup_v2_mount_point_from_reader(
            reader,
            Path::new("/dummy"),
            Path::new("/host"),
            CGROUP_V2_FS_TYPE,
        )
        .unwrap();
        assert_eq!(mount, PathBuf::from("/host/sys/fs/cgroup/unified"));
    }

    #[test]
    fn test_invalid_line_is_parse_error() {
        let reader = new_cursor_from_contents("cgroup2 /sys/fs/cgroup\n");
        let err = cgroup_v2_mount_point_from_reader(
            reader,
            Path::new("/dummy"),
            Path::new("/"),
            CGROUP_V2_FS_TYPE,
        )
        .unwrap_err();
        match err {
            Error::Parse { path, .. } => assert_eq!(path, Path::new("/dummy")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let tempdir = tempfile::tempdir().unwrap();
        let err = cgroup_v2_mount_point(tempdir.path(), CGROUP_V2_FS_TYPE).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_mounted_cgroups_from_host_root() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tempdir.path().join("proc")).unwrap();
        let mut file = std::fs::File::create(tempdir.path().join("proc/mounts")).unwrap();
        write!(file, "{HYBRID_MOUNTS}").unwrap();

        let mounted = mounted_cgroups(tempdir.path()).unwrap();
        assert_eq!(mounted, MountedCgroups { v1: true, v2: true });
    }

    #[test]
    fn test_named_v1_hierarchy_is_not_v1() {
        let reader = new_cursor_from_contents(
            "\
cgroup2 /sys/fs/cgroup cgroup2 rw,nosuid,nodev,noexec,relatime,nsdelegate 0 0
cgroup /sys/fs/cgroup/systemd cgroup rw,nosuid,nodev,noexec,relatime,xattr,name=systemd 0 0
",
        );
        let mounted = mounted_cgroups_from_reader(reader, Path::new("/dummy")).unwrap();
        assert_eq!(mounted, MountedCgroups { v1: false, v2: true });
    }
}
