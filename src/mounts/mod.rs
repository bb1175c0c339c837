//! Mount table parsing.
//!
//! Maps cgroup controllers to the place their hierarchy is mounted, as read
//! from a `/proc/mounts` style file below a host root prefix.
mod detect;
mod error;
mod parser;

pub use detect::{
    CGROUP_V1_FS_TYPE, CGROUP_V2_FS_TYPE, MountPoints, MountedCgroups, cgroup_v1_mount_points,
    cgroup_v2_mount_point, mounted_cgroups, mounts_path,
};
pub use error::{Error, Result};
pub use parser::{MountEntry, MountField, ParseError, parse_mount_line};
