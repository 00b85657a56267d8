//! Time ranges and the PPL time filter clause

pub mod datemath;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::Field;

/// Literal date format accepted by the PPL parser
pub const PPL_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A time-picker range as the user entered it (absolute or date math)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

impl TimeRange {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Resolve both bounds to instants. The upper bound rounds up.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<ResolvedTimeRange> {
        Ok(ResolvedTimeRange {
            from: datemath::parse(&self.from, now, false)?,
            to: datemath::parse(&self.to, now, true)?,
        })
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::new("now-15m", "now")
    }
}

/// A time range with both bounds resolved to UTC instants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ResolvedTimeRange {
    pub fn duration(&self) -> Duration {
        self.to - self.from
    }
}

/// Renders instants in the literal format the backend query language accepts
pub trait DateFormatter: Send + Sync {
    fn format(&self, instant: &DateTime<Utc>) -> String;
}

/// `YYYY-MM-DD HH:mm:ss` in UTC by default
#[derive(Debug, Clone)]
pub struct PplDateFormatter {
    format: String,
}

impl PplDateFormatter {
    /// Fails on any strftime specifier chrono cannot render
    pub fn new(format: impl Into<String>) -> Result<Self> {
        let format = format.into();
        check_date_format(&format)?;
        Ok(Self { format })
    }
}

impl Default for PplDateFormatter {
    fn default() -> Self {
        Self {
            format: PPL_DATE_FORMAT.to_string(),
        }
    }
}

/// Reject strftime strings containing unknown or malformed specifiers
pub fn check_date_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::Config(format!("invalid date format '{}'", format)));
    }
    Ok(())
}

impl DateFormatter for PplDateFormatter {
    fn format(&self, instant: &DateTime<Utc>) -> String {
        instant.format(&self.format).to_string()
    }
}

/// Read access to the application-wide time picker
pub trait TimeFilterSource: Send + Sync {
    fn time_range(&self) -> TimeRange;
}

/// In-process time filter whose range can be replaced at runtime
#[derive(Debug, Default)]
pub struct FixedTimeFilter {
    range: RwLock<TimeRange>,
}

impl FixedTimeFilter {
    pub fn new(range: TimeRange) -> Self {
        Self {
            range: RwLock::new(range),
        }
    }

    pub fn set_time(&self, range: TimeRange) {
        *self.range.write() = range;
    }
}

impl TimeFilterSource for FixedTimeFilter {
    fn time_range(&self) -> TimeRange {
        self.range.read().clone()
    }
}

/// Build the PPL time-range predicate for `time_field`.
///
/// Returns `" | where <field> >= '<from>' and <field> <= '<to>'"`. Without a
/// time field the result is the empty string, which is still a well-formed
/// (no-op) suffix; whether that is acceptable is the caller's call.
pub fn build_time_filter(
    time_field: Option<&Field>,
    range: &ResolvedTimeRange,
    formatter: &dyn DateFormatter,
) -> String {
    let Some(field) = time_field else {
        return String::new();
    };
    format!(
        " | where {name} >= '{from}' and {name} <= '{to}'",
        name = field.name,
        from = formatter.format(&range.from),
        to = formatter.format(&range.to),
    )
}
