use std::io::BufRead;

/// Network counters summed over the interfaces of a `/proc/<pid>/net/dev` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct NetworkStat {
    /// Bytes received.
    pub rx_bytes: u64,
    /// Packets received.
    pub rx_packets: u64,
    /// Receive errors.
    pub rx_errors: u64,
    /// Dropped packets while receiving.
    pub rx_dropped: u64,
    /// Bytes transmitted.
    pub tx_bytes: u64,
    /// Packets transmitted.
    pub tx_packets: u64,
    /// Transmit errors.
    pub tx_errors: u64,
    /// Dropped packets while transmitting.
    pub tx_dropped: u64,
}

impl std::ops::AddAssign for NetworkStat {
    fn add_assign(&mut self, rhs: Self) {
        self.rx_bytes = self.rx_bytes.saturating_add(rhs.rx_bytes);
        self.rx_packets = self.rx_packets.saturating_add(rhs.rx_packets);
        self.rx_errors = self.rx_errors.saturating_add(rhs.rx_errors);
        self.rx_dropped = self.rx_dropped.saturating_add(rhs.rx_dropped);
        self.tx_bytes = self.tx_bytes.saturating_add(rhs.tx_bytes);
        self.tx_packets = self.tx_packets.saturating_add(rhs.tx_packets);
        self.tx_errors = self.tx_errors.saturating_add(rhs.tx_errors);
        self.tx_dropped = self.tx_dropped.saturating_add(rhs.tx_dropped);
    }
}

const IGNORED_INTERFACE_PREFIX: &str = "lo";

/// Fields an interface line needs, name included, to reach the transmit counters.
const MIN_FIELDS: usize = 13;

/// Header lines preceding the interface lines.
const HEADER_LINES: usize = 2;

/// Splits an interface line into its name and data fields.
///
/// The name is separated by `:`, which may be directly followed by the
/// first counter when it is wide (`eth0:123456`).
fn parse_interface_line(line: &str) -> Option<(&str, Vec<&str>)> {
    let (iface, data) = line.trim().split_once(':')?;
    Some((iface.trim(), data.split_whitespace().collect()))
}

/// Builds the counters from the fixed receive/transmit field positions.
fn stats_from_fields(fields: &[&str]) -> NetworkStat {
    let field = |idx: usize| fields[idx].parse::<u64>().unwrap_or(0);
    NetworkStat {
        rx_bytes: field(0),
        rx_packets: field(1),
        rx_errors: field(2),
        rx_dropped: field(3),
        tx_bytes: field(8),
        tx_packets: field(9),
        tx_errors: field(10),
        tx_dropped: field(11),
    }
}

impl NetworkStat {
    /// Parses and aggregates every non-loopback interface of a `net/dev` file.
    ///
    /// Lines with too few fields are skipped.
    pub fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut stat = NetworkStat::default();
        let mut line = String::new();

        for _ in 0..HEADER_LINES {
            buf.read_line(&mut line)?;
            line.clear();
        }

        while buf.read_line(&mut line)? != 0 {
            match parse_interface_line(&line) {
                Some((iface, _)) if iface.starts_with(IGNORED_INTERFACE_PREFIX) => {}
                Some((_, fields)) if fields.len() + 1 >= MIN_FIELDS => {
                    stat += stats_from_fields(&fields);
                }
                _ if line.trim().is_empty() => {}
                _ => log::debug!("Skipping malformed network stats line: `{}`", line.trim()),
            }
            line.clear();
        }

        Ok(stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
";

    fn parse(lines: &str) -> NetworkStat {
        let data = format!("{HEADER}{lines}");
        NetworkStat::from_reader(&mut data.as_bytes()).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let stat = NetworkStat::from_reader(&mut "".as_bytes()).unwrap();
        assert_eq!(stat, NetworkStat::default());
    }

    #[test]
    fn test_only_headers() {
        assert_eq!(parse(""), NetworkStat::default());
    }

    #[test]
    fn test_loopback_is_excluded() {
        let stat = parse(
            "    lo: 422198341   75815    0    0    0     0          0         0 422198341   75815    0    0    0     0       0          0
  eth0: 10240    100     1    2    0     0          0         0  20480   200     3    4    0     0       0          0
",
        );
        assert_eq!(
            stat,
            NetworkStat {
                rx_bytes: 10240,
                rx_packets: 100,
                rx_errors: 1,
                rx_dropped: 2,
                tx_bytes: 20480,
                tx_packets: 200,
                tx_errors: 3,
                tx_dropped: 4,
            }
        );
    }

    #[test]
    fn test_malformed_line_too_few_fields() {
        let stat = parse(" badif: 123 456\n  eth0: 1 1 0 0 0 0 0 0 1 1 0 0 0 0 0 0\n");
        assert_eq!(stat.rx_bytes, 1);
        assert_eq!(stat.tx_packets, 1);
    }

    #[test]
    fn test_name_glued_to_first_counter() {
        let stat = parse("eth0:4294967296 7 0 0 0 0 0 0 99 8 0 0 0 0 0 0\n");
        assert_eq!(stat.rx_bytes, 4_294_967_296);
        assert_eq!(stat.tx_bytes, 99);
    }

    #[test]
    fn test_unparsable_values() {
        let stat = parse("  eth0: xyz abc 0 0 0 0 0 0  20480 200 0 0 0 0 0 0\n");
        assert_eq!(stat.rx_bytes, 0);
        assert_eq!(stat.rx_packets, 0);
        assert_eq!(stat.tx_bytes, 20480);
        assert_eq!(stat.tx_packets, 200);
    }

    #[test]
    fn test_aggregate_saturates() {
        let max = u64::MAX.to_string();
        let stat = parse(&format!(
            "  eth0: {max} 1 0 0 0 0 0 0 {max} 1 0 0 0 0 0 0\n  eth1: 5 1 0 0 0 0 0 0 5 1 0 0 0 0 0 0\n"
        ));
        assert_eq!(stat.rx_bytes, u64::MAX);
        assert_eq!(stat.tx_bytes, u64::MAX);
        assert_eq!(stat.rx_packets, 2);
    }

    #[test]
    fn test_multiple_valid_interfaces() {
        let stat = parse(
            "  eth0: 100 200 0 0 0 0 0 0  300 400 0 0 0 0 0 0
  eth1: 10 20 0 0 0 0 0 0  30 40 0 0 0 0 0 0
",
        );
        assert_eq!(stat.rx_bytes, 110);
        assert_eq!(stat.rx_packets, 220);
        assert_eq!(stat.tx_bytes, 330);
        assert_eq!(stat.tx_packets, 440);
    }
}
