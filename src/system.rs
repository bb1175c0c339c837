//! Host-wide CPU time from the aggregate `cpu` line of `/proc/stat`.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::cgroup::stats::ticks_to_nanos;
use crate::fsutil;

/// `user nice system idle iowait irq softirq`.
const SUMMED_FIELDS: usize = 7;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    FileOpen(#[from] fsutil::FileOpenError),
    #[error("failed to read line for file `{path}`: {source}")]
    ReadLine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no aggregate `cpu` line in `{path}`")]
    MissingCpuLine { path: PathBuf },
    #[error("aggregate `cpu` line in `{path}` has too few fields: `{line}`")]
    MalformedCpuLine { path: PathBuf, line: String },
    #[error("invalid value `{value}` in aggregate `cpu` line of `{path}`: {source}")]
    InvalidValue {
        path: PathBuf,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Host CPU time and the number of CPUs listed next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemCpuUsage {
    /// Sum of the first seven aggregate fields, in nanoseconds.
    pub usage_ns: u64,
    /// Number of per-CPU `cpuN` lines.
    pub online_cpus: u32,
}

/// Reads the host aggregate CPU stat file below a host root.
#[derive(Debug, Clone)]
pub struct SystemCpuReader {
    path: PathBuf,
}

impl SystemCpuReader {
    pub fn new(host_root: &Path) -> Self {
        Self {
            path: fsutil::host_path(host_root, "/proc/stat"),
        }
    }

    /// Reads the aggregate CPU time of the host.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingCpuLine`] if no line starts with `cpu `.
    /// - [`Error::MalformedCpuLine`] if that line has fewer than 8 tokens.
    /// - [`Error::InvalidValue`] if one of the summed fields is not numeric.
    pub fn read_usage(&self) -> Result<SystemCpuUsage> {
        let buf = fsutil::open_file_reader(&self.path)?;
        read_usage_from_reader(buf, &self.path)
    }
}

fn read_usage_from_reader<R: BufRead>(mut reader: R, origin: &Path) -> Result<SystemCpuUsage> {
    let mut line = String::with_capacity(256);
    let mut usage_ns = None;
    let mut online_cpus = 0;

    while reader.read_line(&mut line).map_err(|source| Error::ReadLine {
        path: origin.to_path_buf(),
        source,
    })? != 0
    {
        if let Some(rest) = line.strip_prefix("cpu") {
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                online_cpus += 1;
            } else if usage_ns.is_none() {
                usage_ns = Some(parse_aggregate_line(&line, origin)?);
            }
        }
        line.clear();
    }

    let usage_ns = usage_ns.ok_or_else(|| Error::MissingCpuLine {
        path: origin.to_path_buf(),
    })?;
    Ok(SystemCpuUsage {
        usage_ns,
        online_cpus,
    })
}

fn parse_aggregate_line(line: &str, origin: &Path) -> Result<u64> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < SUMMED_FIELDS + 1 {
        return Err(Error::MalformedCpuLine {
            path: origin.to_path_buf(),
            line: line.trim_end().to_owned(),
        });
    }

    let mut ticks = 0u64;
    for value in &fields[1..=SUMMED_FIELDS] {
        let parsed = value.parse::<u64>().map_err(|source| Error::InvalidValue {
            path: origin.to_path_buf(),
            value: value.to_string(),
            source,
        })?;
        ticks = ticks.saturating_add(parsed);
    }
    Ok(ticks_to_nanos(ticks))
}
