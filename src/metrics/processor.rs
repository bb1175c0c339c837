use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::{
    BlkioMetrics, CpuMetrics, Error, MemoryMetrics, PidsMetrics, Result, Sample,
};
use crate::cgroup::stats::{BlkioEntry, BlkioStats, OP_READ, OP_WRITE};
use crate::container::{ContainerInspection, ContainerStatus, Inspector};
use crate::fetcher::{RawCpu, RawMemory, RawMetricsFetcher, RawSample};
use crate::store::{SampleStore, StoredSample};

/// Raw limits at or above this are the kernel's "unlimited" and count as unset.
const UNSET_LIMIT_THRESHOLD: u64 = (i64::MAX / 2) as u64;

const NANOS_PER_MILLI: f64 = 1e6;

/// Turns raw samples into [`Sample`]s, keeping the previous CPU counters of
/// every container in a [`SampleStore`].
pub struct MetricsProcessor {
    inspector: Arc<dyn Inspector>,
    fetcher: Box<dyn RawMetricsFetcher>,
    store: Arc<dyn SampleStore>,
    exited_ttl: Duration,
}

impl MetricsProcessor {
    /// `exited_ttl` is how long an exited container keeps being reported as
    /// [`Error::Unexpired`]; zero means forever.
    pub fn new(
        inspector: Arc<dyn Inspector>,
        fetcher: Box<dyn RawMetricsFetcher>,
        store: Arc<dyn SampleStore>,
        exited_ttl: Duration,
    ) -> Self {
        Self {
            inspector,
            fetcher,
            store,
            exited_ttl,
        }
    }

    /// Samples `container_id`.
    ///
    /// The first sample of a container has all CPU rates at zero. Each call
    /// replaces the stored counters with the ones just fetched.
    ///
    /// # Errors
    ///
    /// Exited containers yield [`Error::Expired`] or [`Error::Unexpired`]
    /// without touching the cgroup filesystem. Any other error means this
    /// cycle produced no sample for the container.
    pub fn process(&self, container_id: &str) -> Result<Sample> {
        let inspection = self.inspector.container_inspect(container_id)?;
        if inspection.state.status == ContainerStatus::Exited {
            return Err(self.exited(&inspection));
        }

        let raw = self.fetcher.fetch(&inspection)?;
        let key = inspection.id.as_ref();
        let previous = self.store.get(key)?;
        if previous.is_none() {
            log::debug!("No previous sample for container `{key}`");
        }
        self.store.set(
            key,
            StoredSample {
                timestamp: raw.time,
                cpu: raw.cpu.clone(),
            },
        )?;

        Ok(derive_sample(&inspection, &raw, previous.as_ref()))
    }

    fn exited(&self, inspection: &ContainerInspection) -> Error {
        let id = inspection.id.clone();
        if self.exited_ttl.is_zero() {
            return Error::Unexpired { id };
        }
        let Some(finished_at) = inspection.state.finished_at else {
            return Error::Unexpired { id };
        };
        match SystemTime::now().duration_since(finished_at) {
            Ok(age) if age > self.exited_ttl => {
                log::debug!("Container `{id}` exited {age:?} ago, dropping its sample");
                if let Err(err) = self.store.delete(id.as_ref()) {
                    log::warn!("Failed to delete sample of container `{id}`: {err}");
                }
                Error::Expired { id, age }
            }
            _ => Error::Unexpired { id },
        }
    }
}

fn derive_sample(
    inspection: &ContainerInspection,
    raw: &RawSample,
    previous: Option<&StoredSample>,
) -> Sample {
    Sample {
        container_id: raw.container_id.clone(),
        timestamp: raw.time,
        cpu: cpu_metrics(&raw.cpu, raw.time, previous),
        memory: memory_metrics(&raw.memory),
        blkio: blkio_metrics(&raw.blkio),
        pids: PidsMetrics {
            current: raw.pids.current,
            limit: raw.pids.limit,
        },
        network: raw.network,
        restart_count: inspection.restart_count,
    }
}

fn cpu_metrics(current: &RawCpu, time: SystemTime, previous: Option<&StoredSample>) -> CpuMetrics {
    let mut metrics = CpuMetrics {
        limit_cores: current.limit_cores,
        shares: current.shares,
        ..Default::default()
    };
    let Some(previous) = previous else {
        return metrics;
    };
    let prev = &previous.cpu;

    let online = f64::from(current.online_cpus.max(1));
    let elapsed_ns = time
        .duration_since(previous.timestamp)
        .map(|elapsed| elapsed.as_nanos() as f64)
        .unwrap_or(0.0);
    // The host counter covers every CPU, so it already is elapsed × online.
    let window = match current.system_usage.saturating_sub(prev.system_usage) {
        0 => elapsed_ns * online,
        delta => delta as f64,
    };
    let percent = |current: u64, previous: u64| {
        if window <= 0.0 {
            return 0.0;
        }
        let delta = current.saturating_sub(previous) as f64;
        (delta / window * online * 100.0).clamp(0.0, online * 100.0)
    };

    metrics.cpu_percent = percent(current.total_usage, prev.total_usage);
    metrics.kernel_percent = percent(current.usage_in_kernelmode, prev.usage_in_kernelmode);
    metrics.user_percent = percent(current.usage_in_usermode, prev.usage_in_usermode);
    metrics.used_cores = metrics.cpu_percent / 100.0;
    if metrics.limit_cores > 0.0 {
        metrics.used_cores_percent = 100.0 * metrics.used_cores / metrics.limit_cores;
    }
    metrics.throttled_periods = current
        .throttled_periods
        .saturating_sub(prev.throttled_periods);
    metrics.throttled_time_ms =
        current.throttled_time_ns.saturating_sub(prev.throttled_time_ns) as f64 / NANOS_PER_MILLI;
    metrics
}

fn normalize_limit(limit: u64) -> u64 {
    if limit >= UNSET_LIMIT_THRESHOLD {
        0
    } else {
        limit
    }
}

fn percent_of(value: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    100.0 * value as f64 / limit as f64
}

fn memory_metrics(raw: &RawMemory) -> MemoryMetrics {
    let limit_bytes = normalize_limit(raw.usage_limit);
    let swap_limit_bytes = normalize_limit(raw.swap_limit);

    let mut metrics = MemoryMetrics {
        usage_bytes: raw.rss,
        cache_bytes: raw.cache,
        kernel_usage_bytes: raw.kernel_usage,
        limit_bytes,
        usage_percent: percent_of(raw.rss, limit_bytes),
        swap_limit_bytes,
        soft_limit_bytes: normalize_limit(raw.soft_limit),
        ..Default::default()
    };

    // Without swap accounting the combined counter lags behind the memory
    // counter; subtracting would underflow.
    if raw.fuzz_usage <= raw.swap_usage {
        let swap_only = raw.swap_usage - raw.fuzz_usage;
        let swap_usage = raw.rss.saturating_add(swap_only);
        metrics.swap_only_usage_bytes = Some(swap_only);
        metrics.swap_usage_bytes = Some(swap_usage);
        metrics.swap_limit_usage_percent = Some(percent_of(swap_usage, swap_limit_bytes));
    }
    metrics
}

fn sum_op(entries: &[BlkioEntry], op: &str) -> u64 {
    entries
        .iter()
        .filter(|entry| entry.op.eq_ignore_ascii_case(op))
        .fold(0u64, |sum, entry| sum.saturating_add(entry.value))
}

fn blkio_metrics(raw: &BlkioStats) -> BlkioMetrics {
    BlkioMetrics {
        read_bytes: sum_op(&raw.service_bytes, OP_READ),
        write_bytes: sum_op(&raw.service_bytes, OP_WRITE),
        read_ops: sum_op(&raw.serviced, OP_READ),
        write_ops: sum_op(&raw.serviced, OP_WRITE),
    }
}
