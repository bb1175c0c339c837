//! Startup configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::fetcher::{self, CgroupVersion};

pub const ROOTFS_MOUNT_PATH: &str = "ROOTFS_MOUNT_PATH";
pub const SAMPLE_STORE_PATH: &str = "SAMPLE_STORE_PATH";
pub const EXITED_CONTAINERS_TTL_SECS: &str = "EXITED_CONTAINERS_TTL_SECS";
pub const SAMPLE_STORE_TTL_SECS: &str = "SAMPLE_STORE_TTL_SECS";
pub const CGROUP_VERSION: &str = "CGROUP_VERSION";

const DEFAULT_SAMPLE_STORE_PATH: &str = "/tmp/cgroup-sampler/samples.json";
const DEFAULT_EXITED_CONTAINERS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_SAMPLE_STORE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("environment variable `{name}` must be a number of seconds, got `{value}`: {source}")]
    InvalidSeconds {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("environment variable `{name}`: {source}")]
    InvalidVersion {
        name: &'static str,
        #[source]
        source: fetcher::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Where the host's root filesystem is visible, `/` when not containerized.
    pub rootfs: PathBuf,
    pub sample_store_path: PathBuf,
    /// Zero disables expiry of exited containers.
    pub exited_containers_ttl: Duration,
    /// `None` keeps stored samples forever.
    pub sample_store_ttl: Option<Duration>,
    /// `None` means detect from the mount table.
    pub cgroup_version: Option<CgroupVersion>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rootfs: PathBuf::from("/"),
            sample_store_path: PathBuf::from(DEFAULT_SAMPLE_STORE_PATH),
            exited_containers_ttl: DEFAULT_EXITED_CONTAINERS_TTL,
            sample_store_ttl: Some(DEFAULT_SAMPLE_STORE_TTL),
            cgroup_version: None,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, falling back to defaults for
    /// unset or empty variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Config::default();

        if let Some(rootfs) = var(ROOTFS_MOUNT_PATH) {
            config.rootfs = PathBuf::from(rootfs);
        }
        if let Some(path) = var(SAMPLE_STORE_PATH) {
            config.sample_store_path = PathBuf::from(path);
        }
        if let Some(value) = var(EXITED_CONTAINERS_TTL_SECS) {
            config.exited_containers_ttl = parse_seconds(EXITED_CONTAINERS_TTL_SECS, value)?;
        }
        if let Some(value) = var(SAMPLE_STORE_TTL_SECS) {
            let ttl = parse_seconds(SAMPLE_STORE_TTL_SECS, value)?;
            config.sample_store_ttl = (!ttl.is_zero()).then_some(ttl);
        }
        if let Some(value) = var(CGROUP_VERSION) {
            let version =
                CgroupVersion::from_info_str(&value).map_err(|source| Error::InvalidVersion {
                    name: CGROUP_VERSION,
                    source,
                })?;
            config.cgroup_version = Some(version);
        }

        Ok(config)
    }
}

fn parse_seconds(name: &'static str, value: String) -> Result<Duration> {
    match value.trim().parse::<u64>() {
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(source) => Err(Error::InvalidSeconds {
            name,
            value,
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.exited_containers_ttl, Duration::from_secs(86400));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            (ROOTFS_MOUNT_PATH, "/rootfs"),
            (SAMPLE_STORE_PATH, "/var/lib/sampler.json"),
            (EXITED_CONTAINERS_TTL_SECS, "0"),
            (SAMPLE_STORE_TTL_SECS, "0"),
            (CGROUP_VERSION, "2"),
        ])
        .unwrap();
        assert_eq!(config.rootfs, PathBuf::from("/rootfs"));
        assert_eq!(config.sample_store_path, PathBuf::from("/var/lib/sampler.json"));
        assert!(config.exited_containers_ttl.is_zero());
        assert_eq!(config.sample_store_ttl, None);
        assert_eq!(config.cgroup_version, Some(CgroupVersion::V2));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[(EXITED_CONTAINERS_TTL_SECS, "a day")]),
            Err(Error::InvalidSeconds { name: EXITED_CONTAINERS_TTL_SECS, .. })
        ));
        assert!(matches!(
            config(&[(CGROUP_VERSION, "3")]),
            Err(Error::InvalidVersion { .. })
        ));
    }
}
