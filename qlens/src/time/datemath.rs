//! Date math for time-picker ranges
//!
//! Accepts absolute instants (RFC 3339, `YYYY-MM-DD HH:mm:ss[.SSS]`,
//! `YYYY-MM-DD`, epoch milliseconds) and relative expressions anchored at
//! `now` or at an absolute date followed by `||`:
//!
//! - `now-15m`, `now+1d`, `now-1w/w`
//! - `now/d` rounds to the start of the day (or its end when rounding up)
//! - `2024-01-01||+1M/M`
//!
//! Units: `s m h d w M y`.

use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use nom::{
    branch::alt,
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map, map_opt, map_res, opt},
    multi::many0,
    sequence::{preceded, tuple},
    IResult,
};

use crate::error::{Error, Result};

/// Largest offset accepted in a single step, keeps chrono arithmetic in range
const MAX_OFFSET: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn from_char(c: char) -> Option<Self> {
        match c {
            's' => Some(Unit::Second),
            'm' => Some(Unit::Minute),
            'h' => Some(Unit::Hour),
            'd' => Some(Unit::Day),
            'w' => Some(Unit::Week),
            'M' => Some(Unit::Month),
            'y' => Some(Unit::Year),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Offset(i64, Unit),
    Round(Unit),
}

fn unit(input: &str) -> IResult<&str, Unit> {
    map_opt(one_of("smhdwMy"), Unit::from_char)(input)
}

/// `+1d`, `-15m`, `-h` (count defaults to 1)
fn offset(input: &str) -> IResult<&str, Step> {
    map(
        tuple((
            one_of("+-"),
            opt(map_res(digit1, |d: &str| d.parse::<i64>())),
            unit,
        )),
        |(sign, count, unit)| {
            let count = count.unwrap_or(1);
            let count = if sign == '-' { -count } else { count };
            Step::Offset(count, unit)
        },
    )(input)
}

/// `/d`
fn rounding(input: &str) -> IResult<&str, Step> {
    map(preceded(char('/'), unit), Step::Round)(input)
}

fn steps(input: &str) -> IResult<&str, Vec<Step>> {
    all_consuming(many0(alt((offset, rounding))))(input)
}

/// Resolve a date math expression against `now`.
///
/// With `round_up` set, rounding moves to the last millisecond of the unit,
/// which is what the upper bound of a range wants (`now/d` as `to` means the
/// end of today).
pub fn parse(expr: &str, now: DateTime<Utc>, round_up: bool) -> Result<DateTime<Utc>> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(Error::DateMath("empty expression".to_string()));
    }

    let (anchor, math) = if let Some((anchor, math)) = expr.split_once("||") {
        (parse_absolute(anchor)?, math)
    } else if let Some(math) = expr.strip_prefix("now") {
        (now, math)
    } else {
        return parse_absolute(expr);
    };

    let (_, steps) = steps(math).map_err(|_| Error::DateMath(expr.to_string()))?;

    steps.into_iter().try_fold(anchor, |dt, step| {
        let next = match step {
            Step::Offset(count, unit) => {
                if count.abs() > MAX_OFFSET {
                    return Err(Error::DateMath(format!("offset out of range in '{}'", expr)));
                }
                add(dt, count, unit)
            }
            Step::Round(unit) if round_up => {
                add(dt, 1, unit)
                    .and_then(|next| floor(next, unit))
                    .map(|end| end - Duration::milliseconds(1))
            }
            Step::Round(unit) => floor(dt, unit),
        };
        next.ok_or_else(|| Error::DateMath(format!("'{}' is out of range", expr)))
    })
}

/// Parse an absolute instant
pub fn parse_absolute(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        if let Some(dt) = s
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        {
            return Ok(dt);
        }
    }

    Err(Error::DateMath(s.to_string()))
}

fn add(dt: DateTime<Utc>, count: i64, unit: Unit) -> Option<DateTime<Utc>> {
    match unit {
        Unit::Second => dt.checked_add_signed(Duration::seconds(count)),
        Unit::Minute => dt.checked_add_signed(Duration::minutes(count)),
        Unit::Hour => dt.checked_add_signed(Duration::hours(count)),
        Unit::Day => dt.checked_add_signed(Duration::days(count)),
        Unit::Week => dt.checked_add_signed(Duration::weeks(count)),
        Unit::Month => add_months(dt, count),
        Unit::Year => add_months(dt, count.checked_mul(12)?),
    }
}

fn add_months(dt: DateTime<Utc>, count: i64) -> Option<DateTime<Utc>> {
    let months = Months::new(u32::try_from(count.unsigned_abs()).ok()?);
    if count >= 0 {
        dt.checked_add_months(months)
    } else {
        dt.checked_sub_months(months)
    }
}

/// Round down to the start of `unit`
fn floor(dt: DateTime<Utc>, unit: Unit) -> Option<DateTime<Utc>> {
    let date = dt.date_naive();
    let naive = match unit {
        Unit::Second => dt.naive_utc().with_nanosecond(0)?,
        Unit::Minute => date.and_hms_opt(dt.hour(), dt.minute(), 0)?,
        Unit::Hour => date.and_hms_opt(dt.hour(), 0, 0)?,
        Unit::Day => date.and_hms_opt(0, 0, 0)?,
        Unit::Week => {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            monday.and_hms_opt(0, 0, 0)?
        }
        Unit::Month => date.with_day(1)?.and_hms_opt(0, 0, 0)?,
        Unit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
    };
    Some(Utc.from_utc_datetime(&naive))
}
