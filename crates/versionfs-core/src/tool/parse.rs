//! Parsers for the tool's listings and time format.

use crate::{SnapshotError, SnapshotResult};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Time format accepted by `--remove-older-than`, in local time.
pub const TOOL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One increment reported by `-l`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Increment {
    /// Epoch seconds.
    pub time: i64,
    /// `directory`, `regular`, `missing`, ...
    pub kind: String,
}

impl Increment {
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.time, 0).unwrap_or_default()
    }
}

/// Parse `--parsable-output -l` output, oldest first.
pub fn parse_increments(stdout: &str) -> SnapshotResult<Vec<Increment>> {
    let mut increments = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let time = fields
            .next()
            .and_then(|t| t.parse::<i64>().ok())
            .ok_or_else(|| SnapshotError::tool("list-increments", format!("bad line: {line}")))?;
        let kind = fields.next().unwrap_or("unknown").to_string();
        increments.push(Increment { time, kind });
    }
    increments.sort_by_key(|i| i.time);
    Ok(increments)
}

/// Parse `--list-increment-sizes` output into sizes in bytes, oldest first.
///
/// The first two lines are headers. Rows are newest first and carry the
/// size value and unit in the sixth and seventh fields.
pub fn parse_increment_sizes(stdout: &str) -> SnapshotResult<Vec<u64>> {
    let mut sizes = Vec::new();
    for line in stdout.lines().skip(2) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let (Some(value), Some(unit)) = (fields.get(5), fields.get(6)) else {
            return Err(SnapshotError::tool(
                "list-increment-sizes",
                format!("bad line: {line}"),
            ));
        };
        sizes.push(parse_size(value, unit)?);
    }
    sizes.reverse();
    Ok(sizes)
}

/// Convert a size like `1.50 KB` to bytes.
pub fn parse_size(value: &str, unit: &str) -> SnapshotResult<u64> {
    let value: f64 = value
        .parse()
        .map_err(|_| SnapshotError::tool("list-increment-sizes", format!("bad size: {value}")))?;
    let multiplier: u64 = match unit {
        "byte" | "bytes" | "B" => 1,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        "TB" => 1 << 40,
        other => {
            return Err(SnapshotError::tool(
                "list-increment-sizes",
                format!("unknown unit: {other}"),
            ))
        }
    };
    Ok((value * multiplier as f64).round() as u64)
}

/// Format epoch seconds as a local-time boundary for `--remove-older-than`.
pub fn format_tool_time(epoch: i64) -> SnapshotResult<String> {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|t| t.format(TOOL_TIME_FORMAT).to_string())
        .ok_or_else(|| SnapshotError::invalid_version(format!("timestamp {epoch} out of range")))
}

/// True if `value` is in [`TOOL_TIME_FORMAT`].
pub fn is_tool_time(value: &str) -> bool {
    NaiveDateTime::parse_from_str(value, TOOL_TIME_FORMAT).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_are_sorted() {
        let out = "1700000002 directory\n1700000000 directory\n\n1700000001 directory\n";
        let increments = parse_increments(out).unwrap();
        let times: Vec<i64> = increments.iter().map(|i| i.time).collect();
        assert_eq!(times, vec![1700000000, 1700000001, 1700000002]);
        assert_eq!(increments[0].kind, "directory");
    }

    #[test]
    fn garbage_listing_is_a_tool_error() {
        let err = parse_increments("not-a-time directory").unwrap_err();
        assert!(matches!(err, SnapshotError::Tool { .. }));
    }

    #[test]
    fn sizes_skip_headers_and_reverse() {
        let out = "\
        Time                       Size        Cumulative size
-----------------------------------------------------------------------------
Tue Nov 14 22:13:22 2023         1.50 KB           1.51 KB   (current mirror)
Tue Nov 14 22:13:21 2023          12 bytes          12 bytes
";
        assert_eq!(parse_increment_sizes(out).unwrap(), vec![12, 1536]);
    }

    #[test]
    fn single_digit_day_still_splits() {
        let out = "header\n----\nWed Jan  3 10:00:00 2024          7 bytes          7 bytes\n";
        assert_eq!(parse_increment_sizes(out).unwrap(), vec![7]);
    }

    #[test]
    fn units_are_binary() {
        assert_eq!(parse_size("1", "B").unwrap(), 1);
        assert_eq!(parse_size("2", "MB").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("1", "TB").unwrap(), 1 << 40);
        assert!(parse_size("1", "PB").is_err());
        assert!(parse_size("x", "B").is_err());
    }

    #[test]
    fn tool_time_round_trip() {
        let formatted = format_tool_time(1_700_000_000).unwrap();
        assert!(is_tool_time(&formatted));
        assert!(!is_tool_time("yesterday"));
        assert!(!is_tool_time("2024-01-01 10:00:00"));
    }
}
