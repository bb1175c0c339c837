//! Parsers for block I/O accounting.
//!
//! - v1 `blkio.throttle.io_service_bytes` / `blkio.throttle.io_serviced`:
//!   one `major:minor Op value` line per device and operation, followed by
//!   a `Total value` line that is skipped.
//! - v2 `io.stat`: one `major:minor rbytes=.. wbytes=.. rios=.. wios=..`
//!   line per device.
//!
//! Both produce per-device [`BlkioEntry`] values; totals are summed by the
//! consumer.
//!
//! # Example
//!
//! ```rust
//! use cgroup_sampler::cgroup::stats::BlkioStats;
//!
//! let data = "\
//! 8:0 rbytes=1024 wbytes=2048 rios=12 wios=24
//! 254:0 rbytes=1024 wbytes=2048 rios=12 wios=24
//! ";
//! let stats = BlkioStats::from_io_stat(&mut data.as_bytes()).unwrap();
//! assert_eq!(stats.service_bytes.len(), 4);
//! ```

use std::io::BufRead;

use super::StatParseError;

/// Operation name of read entries.
pub const OP_READ: &str = "Read";
/// Operation name of write entries.
pub const OP_WRITE: &str = "Write";

/// One device/operation counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlkioEntry {
    pub major: u64,
    pub minor: u64,
    pub op: String,
    pub value: u64,
}

/// Per-device block I/O counters of a cgroup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlkioStats {
    /// Bytes transferred, per device and operation.
    pub service_bytes: Vec<BlkioEntry>,
    /// Number of I/O operations, per device and operation.
    pub serviced: Vec<BlkioEntry>,
}

fn parse_device(device: &str) -> Option<(u64, u64)> {
    let (major, minor) = device.split_once(':')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Parses a v1 `blkio.throttle.*` file.
///
/// # Errors
///
/// Returns a wrapped [`StatParseError::MalformedLine`] if a device line does
/// not have three fields or a valid `major:minor`, and
/// [`StatParseError::InvalidValue`] if its value is not numeric.
pub fn parse_v1_blkio<R: BufRead>(buf: &mut R) -> std::io::Result<Vec<BlkioEntry>> {
    let mut entries = Vec::new();
    let mut line = String::new();
    let mut lineno = 0;

    while buf.read_line(&mut line)? != 0 {
        lineno += 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => {}
            ["Total", ..] => {}
            [device, op, value] => {
                let (major, minor) =
                    parse_device(device).ok_or_else(|| StatParseError::MalformedLine {
                        line: lineno,
                        content: line.trim_end().to_owned(),
                    })?;
                let value = value
                    .parse::<u64>()
                    .map_err(|source| StatParseError::InvalidValue {
                        value: value.to_string(),
                        line: lineno,
                        source,
                    })?;
                entries.push(BlkioEntry {
                    major,
                    minor,
                    op: op.to_string(),
                    value,
                });
            }
            _ => {
                return Err(StatParseError::MalformedLine {
                    line: lineno,
                    content: line.trim_end().to_owned(),
                }
                .into());
            }
        }
        line.clear();
    }

    Ok(entries)
}

impl BlkioStats {
    /// Parses a v2 `io.stat` file into read/write entries per device.
    ///
    /// Unknown keys (`dbytes`, `dios`, ...) and malformed pairs are ignored.
    pub fn from_io_stat<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut stats = BlkioStats::default();
        let mut line = String::new();
        let mut lineno = 0;

        while buf.read_line(&mut line)? != 0 {
            lineno += 1;
            let mut parts = line.split_whitespace();
            let Some((major, minor)) = parts.next().and_then(parse_device) else {
                line.clear();
                continue;
            };

            for (key, val) in parts.filter_map(|part| part.split_once('=')) {
                let (target, op) = match key {
                    "rbytes" => (&mut stats.service_bytes, OP_READ),
                    "wbytes" => (&mut stats.service_bytes, OP_WRITE),
                    "rios" => (&mut stats.serviced, OP_READ),
                    "wios" => (&mut stats.serviced, OP_WRITE),
                    _ => continue,
                };
                let value = val
                    .parse::<u64>()
                    .map_err(|source| StatParseError::InvalidKeyValue {
                        key: key.to_string(),
                        value: val.to_string(),
                        line: lineno,
                        source,
                    })?;
                target.push(BlkioEntry {
                    major,
                    minor,
                    op: op.to_owned(),
                    value,
                });
            }
            line.clear();
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroup::stats::error::extract_stat_parse_error;

    fn sum(entries: &[BlkioEntry], op: &str) -> u64 {
        entries
            .iter()
            .filter(|e| e.op == op)
            .map(|e| e.value)
            .sum()
    }

    #[test]
    fn test_v1_skips_total_line() {
        let data = "\
8:0 Read 1000
8:0 Write 2000
8:0 Sync 2500
8:0 Async 500
8:0 Total 3000
8:16 Read 10
8:16 Write 20
Total 1234
";
        let entries = parse_v1_blkio(&mut data.as_bytes()).unwrap();
        assert_eq!(entries.len(), 7);
        assert_eq!(sum(&entries, OP_READ), 1010);
        assert_eq!(sum(&entries, OP_WRITE), 2020);
        assert!(entries.iter().all(|e| !(e.major == 0 && e.value == 1234)));
        assert_eq!(
            entries[0],
            BlkioEntry {
                major: 8,
                minor: 0,
                op: "Read".to_owned(),
                value: 1000,
            }
        );
    }

    #[test]
    fn test_v1_only_total_line() {
        let entries = parse_v1_blkio(&mut "Total 0\n".as_bytes()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_v1_malformed_line() {
        let err = parse_v1_blkio(&mut "8:0 Read\n".as_bytes()).unwrap_err();
        match extract_stat_parse_error(&err) {
            StatParseError::MalformedLine { line, content } => {
                assert_eq!(*line, 1);
                assert_eq!(content, "8:0 Read");
            }
            _ => panic!("Expected MalformedLine error"),
        }
    }

    #[test]
    fn test_v1_invalid_value() {
        let err = parse_v1_blkio(&mut "8:0 Read 1\n8:0 Write x\n".as_bytes()).unwrap_err();
        match extract_stat_parse_error(&err) {
            StatParseError::InvalidValue { value, line, .. } => {
                assert_eq!(value, "x");
                assert_eq!(*line, 2);
            }
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_parse_complete_io_stat() {
        let data = "\
8:0 rbytes=1024 wbytes=2048 rios=12 wios=24 dbytes=0 dios=0
254:0 rbytes=1024 wbytes=2048 rios=12 wios=24 dbytes=0 dios=0
";
        let stats = BlkioStats::from_io_stat(&mut data.as_bytes()).unwrap();
        assert_eq!(sum(&stats.service_bytes, OP_READ), 2048);
        assert_eq!(sum(&stats.service_bytes, OP_WRITE), 4096);
        assert_eq!(sum(&stats.serviced, OP_READ), 24);
        assert_eq!(sum(&stats.serviced, OP_WRITE), 48);
        assert_eq!(stats.serviced[0].major, 8);
        assert_eq!(stats.serviced[2].major, 254);
    }

    #[test]
    fn test_parse_invalid_io_stat() {
        let data = "8:0 rbytes=abc wbytes=def\n";
        let err = BlkioStats::from_io_stat(&mut data.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        match extract_stat_parse_error(&err) {
            StatParseError::InvalidKeyValue {
                key, value, line, ..
            } => {
                assert_eq!(key, "rbytes");
                assert_eq!(value, "abc");
                assert_eq!(*line, 1);
            }
            _ => panic!("Expected InvalidKeyValue error"),
        }
    }

    #[test]
    fn test_io_stat_ignores_malformed_pairs() {
        let data = "8:0 rbytes=1024 malformedpair wios=24\n";
        let stats = BlkioStats::from_io_stat(&mut data.as_bytes()).unwrap();
        assert_eq!(sum(&stats.service_bytes, OP_READ), 1024);
        assert_eq!(sum(&stats.serviced, OP_WRITE), 24);
        assert_eq!(stats.service_bytes.len() + stats.serviced.len(), 2);
    }
}
