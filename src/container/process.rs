use std::path::PathBuf;
use std::time::SystemTime;

use crate::fsutil;
use crate::mounts;

use super::{
    ContainerID, ContainerInspection, ContainerState, ContainerStatus, Error, HostConfig,
    Inspector, Result, SystemInfo,
};

/// Inspects host processes as if they were containers.
///
/// The container ID is the decimal host PID. A PID present in procfs is
/// running; a vanished one is reported as exited just now, since procfs
/// keeps no exit time.
#[derive(Debug, Clone)]
pub struct HostProcessInspector {
    host_root: PathBuf,
}

impl HostProcessInspector {
    pub fn new(host_root: impl Into<PathBuf>) -> Self {
        Self {
            host_root: host_root.into(),
        }
    }
}

impl Inspector for HostProcessInspector {
    fn container_inspect(&self, container_id: &str) -> Result<ContainerInspection> {
        let pid = container_id
            .parse::<u32>()
            .map_err(|_| Error::InvalidContainerID(container_id.to_owned()))?;
        let id = ContainerID::new(container_id)?;

        let state = if fsutil::host_path(&self.host_root, format!("/proc/{pid}")).is_dir() {
            ContainerState {
                status: ContainerStatus::Running,
                pid,
                finished_at: None,
            }
        } else {
            ContainerState {
                status: ContainerStatus::Exited,
                pid: 0,
                finished_at: Some(SystemTime::now()),
            }
        };

        Ok(ContainerInspection {
            id,
            state,
            restart_count: 0,
            host_config: HostConfig::default(),
        })
    }

    fn info(&self) -> Result<SystemInfo> {
        let mounted =
            mounts::mounted_cgroups(&self.host_root).map_err(|err| Error::Info(Box::new(err)))?;
        let cgroup_version = match (mounted.v1, mounted.v2) {
            (true, _) => "1",
            (false, true) => "2",
            (false, false) => {
                return Err(Error::Info("no cgroup filesystem mounted".into()));
            }
        };
        Ok(SystemInfo {
            cgroup_version: cgroup_version.to_owned(),
            cgroup_driver: String::new(),
        })
    }
}
