//! Automatic histogram interval sizing

use crate::time::ResolvedTimeRange;

/// Supplies a bucket width when the UI did not ask for one
pub trait AutoInterval: Send + Sync {
    /// Span literal such as `30s` or `1h` for the given range
    fn calculate_auto_time_expression(&self, range: &ResolvedTimeRange) -> String;
}

/// Nice bucket widths in seconds, with their span literal
const LADDER: &[(i64, &str)] = &[
    (1, "1s"),
    (5, "5s"),
    (10, "10s"),
    (30, "30s"),
    (60, "1m"),
    (300, "5m"),
    (600, "10m"),
    (1_800, "30m"),
    (3_600, "1h"),
    (10_800, "3h"),
    (43_200, "12h"),
    (86_400, "1d"),
    (604_800, "1w"),
    (2_592_000, "1M"),
    (31_536_000, "1y"),
];

const YEAR_SECS: f64 = 31_536_000.0;

pub const DEFAULT_BAR_TARGET: u32 = 50;

/// Sizes buckets so a range yields about `bar_target` bars
#[derive(Debug, Clone, Copy)]
pub struct BucketIntervalCalculator {
    bar_target: u32,
}

impl BucketIntervalCalculator {
    pub fn new(bar_target: u32) -> Self {
        Self {
            bar_target: bar_target.max(1),
        }
    }
}

impl Default for BucketIntervalCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_BAR_TARGET)
    }
}

impl AutoInterval for BucketIntervalCalculator {
    fn calculate_auto_time_expression(&self, range: &ResolvedTimeRange) -> String {
        let millis = range.duration().num_milliseconds().max(0) as f64;
        let per_bucket = millis / 1000.0 / self.bar_target as f64;

        LADDER
            .iter()
            .find(|(secs, _)| *secs as f64 >= per_bucket)
            .map(|(_, span)| span.to_string())
            .unwrap_or_else(|| format!("{}y", (per_bucket / YEAR_SECS).ceil() as i64))
    }
}
