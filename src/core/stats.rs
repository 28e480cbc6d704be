use regex::Regex;

use super::format::UNITS;

/// Counters extracted from one sub-transfer's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub files: u64,
    pub bytes: u64,
}

impl TransferStats {
    pub fn add(&mut self, other: TransferStats) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// Best-effort parse of rclone's transfer summary.
///
/// Scans for the first line containing the `Transferred:` marker, e.g.
/// `Transferred:   42 / 42, 100%, 3.5 MB, 4.57 MB/s, ETA 0s`, and pulls out
/// the file count and the size token (base-1024 units). A component that
/// fails to parse degrades to 0; this never errors, a job's outcome must not
/// depend on the tool's log format.
pub fn parse_transfer_stats(output: &str) -> TransferStats {
    let file_re = Regex::new(r"Transferred:\s*(\d+)").unwrap();
    let size_re = Regex::new(r"(?i)(\d+\.?\d*)\s*(B|KB|MB|GB|TB)\b").unwrap();

    for line in output.lines() {
        if !line.contains("Transferred:") {
            continue;
        }

        let files = file_re
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);

        let bytes = size_re
            .captures(line)
            .and_then(|caps| {
                let value: f64 = caps.get(1)?.as_str().parse().ok()?;
                let multiplier = unit_multiplier(caps.get(2)?.as_str())?;
                Some((value * multiplier as f64) as u64)
            })
            .unwrap_or(0);

        return TransferStats { files, bytes };
    }

    TransferStats::default()
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let unit = unit.to_ascii_uppercase();
    UNITS
        .iter()
        .position(|u| *u == unit)
        .map(|exponent| 1024u64.pow(exponent as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_standard_summary_line() {
        let output = "2024/01/05 10:00:00 INFO  : some file copied\n\
                      Transferred:   42 / 42, 100%, 3.5 MB, 4.57 MB/s, ETA 0s\n";
        let stats = parse_transfer_stats(output);
        assert_eq!(stats.files, 42);
        assert_eq!(stats.bytes, 3_670_016);
    }

    #[test]
    fn no_marker_means_zero() {
        assert_eq!(parse_transfer_stats(""), TransferStats::default());
        assert_eq!(
            parse_transfer_stats("rclone: nothing to do\n"),
            TransferStats::default()
        );
    }

    #[test]
    fn malformed_components_degrade_independently() {
        // Marker present but no numbers at all
        let stats = parse_transfer_stats("Transferred: everything, eventually\n");
        assert_eq!(stats, TransferStats::default());

        // File count without a size token
        let stats = parse_transfer_stats("Transferred:   7 / 7\n");
        assert_eq!(stats.files, 7);
        assert_eq!(stats.bytes, 0);
    }

    #[test]
    fn units_are_case_insensitive() {
        let stats = parse_transfer_stats("Transferred: 1 / 1, 100%, 2 gb, 10 MB/s\n");
        assert_eq!(stats.bytes, 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn plain_bytes_and_fractions() {
        let stats = parse_transfer_stats("Transferred: 3 / 3, 100%, 512 B, 1 B/s\n");
        assert_eq!(stats.bytes, 512);

        let stats = parse_transfer_stats("Transferred: 1 / 1, 100%, 0.5 KB, 1 KB/s\n");
        assert_eq!(stats.bytes, 512);
    }

    #[test]
    fn first_marker_line_wins() {
        let output = "Transferred:   5 / 5, 100%, 1.0 KB, 1 KB/s, ETA 0s\n\
                      Transferred:   9 / 9, 100%, 9.0 KB, 1 KB/s, ETA 0s\n";
        let stats = parse_transfer_stats(output);
        assert_eq!(stats.files, 5);
        assert_eq!(stats.bytes, 1024);
    }

    #[test]
    fn sums_across_sub_transfers() {
        let mut total = TransferStats::default();
        total.add(parse_transfer_stats("Transferred: 2 / 2, 100%, 1 KB, 1 KB/s\n"));
        total.add(parse_transfer_stats("Transferred: 3 / 3, 100%, 2 KB, 1 KB/s\n"));
        assert_eq!(total.files, 5);
        assert_eq!(total.bytes, 3072);
    }
}
