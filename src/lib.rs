//! Per-container resource metrics from cgroup v1/v2 accounting files.
//!
//! The crate reads kernel-authored cgroup and procfs files below a host root,
//! normalizes them into raw samples independent of the cgroup version, and
//! derives CPU, memory, swap, block I/O and PID metrics by diffing each
//! sample against the previous one of the same container.
//!
//! Layers, leaves first:
//!
//! - [`mounts`] and [`cgroup::membership`] parse the mount table and a
//!   process's membership file.
//! - [`cgroup::paths`] turns both into stat-file locations.
//! - [`cgroup::stats`] and [`system`] parse individual files.
//! - [`fetcher`] assembles one [`fetcher::RawSample`] per container.
//! - [`metrics`] derives rates using a [`store::SampleStore`].
use std::io::Write;
use std::sync::Arc;

pub mod cgroup;
pub mod config;
pub mod container;
pub mod error;
pub mod fetcher;
pub mod fsutil;
pub mod metrics;
pub mod mounts;
pub mod store;
pub mod system;

use config::Config;
use container::HostProcessInspector;
use metrics::MetricsProcessor;
use store::{FileStore, SampleStore};

/// Runs one sampling pass over the given host PIDs.
///
/// Every derived sample is written to `out` as one JSON line. A container
/// that can't be sampled is logged and skipped; the store is saved once at
/// the end.
///
/// # Errors
///
/// Possible errors include:
/// - No cgroup filesystem in the host mount table.
/// - The sample store can't be read or written.
/// - Writing to `out` fails.
pub fn run(
    config: &Config,
    pids: &[String],
    mut out: impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    log::debug!("Host root: {}", config.rootfs.display());
    let version = match config.cgroup_version {
        Some(version) => version,
        None => fetcher::detect_cgroup_version(&config.rootfs)?,
    };
    log::debug!("Cgroup version: {version:?}");

    let store = Arc::new(FileStore::open(
        &config.sample_store_path,
        config.sample_store_ttl,
    )?);
    let processor = MetricsProcessor::new(
        Arc::new(HostProcessInspector::new(config.rootfs.clone())),
        fetcher::new_fetcher(version, &config.rootfs),
        store.clone(),
        config.exited_containers_ttl,
    );

    for pid in pids {
        match processor.process(pid) {
            Ok(sample) => {
                serde_json::to_writer(&mut out, &sample)?;
                writeln!(out)?;
            }
            Err(err) if err.is_lifecycle() => log::info!("{err}"),
            Err(err) => log::error!("Failed to sample `{pid}`: {err}"),
        }
    }
    out.flush()?;

    store.save()?;
    Ok(())
}
