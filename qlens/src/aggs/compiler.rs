//! Render aggregation descriptors as PPL clauses

use super::{AggDescriptor, AutoInterval};
use crate::frame::Field;
use crate::time::ResolvedTimeRange;

const KEYWORD_SUFFIX: &str = ".keyword";

/// Compile an aggregation into a PPL clause starting with `" | "`.
///
/// Without an aggregation the result is a count per automatically sized time
/// bucket. Unique-value counting is expressed as `dedup` + `count()`, the
/// backend has no distinct-count primitive. Returns the empty string when
/// there is nothing to bucket on or nothing to exclude.
pub fn compile(
    time_field: Option<&Field>,
    agg: Option<&AggDescriptor>,
    range: &ResolvedTimeRange,
    auto_interval: &dyn AutoInterval,
) -> String {
    let Some(agg) = agg else {
        return match time_field {
            Some(tf) => format!(
                " | stats count() by span({}, {})",
                tf.name,
                auto_interval.calculate_auto_time_expression(range)
            ),
            None => String::new(),
        };
    };

    match agg {
        AggDescriptor::DateHistogram { field, interval } => {
            let span_field = time_field.map(|tf| tf.name.as_str()).unwrap_or(field);
            let span = interval
                .as_ref()
                .map(|i| i.as_span())
                .unwrap_or_else(|| auto_interval.calculate_auto_time_expression(range));
            format!(" | stats count() by span({}, {})", span_field, span)
        }
        AggDescriptor::Avg { field } => format!(" | stats avg({})", field),
        AggDescriptor::Cardinality { field } => format!(" | dedup {} | stats count()", field),
        AggDescriptor::Terms { field } => format!(" | stats count() by {}", field),
        AggDescriptor::OtherBucket {
            field,
            excluded_values,
        } => {
            if field.is_empty() || excluded_values.is_empty() {
                return String::new();
            }
            let mut clause = format!(" | stats count() by {}", field);
            for (i, value) in excluded_values.iter().enumerate() {
                let joiner = if i == 0 { "| where" } else { "and" };
                clause.push_str(&format!(" {} {}<>'{}'", joiner, field, escape_literal(value)));
            }
            clause
        }
    }
}

/// Query that computes one aggregation: base query, time filter, then the
/// aggregation clause, with the first `.keyword` suffix removed.
pub fn aggregation_query(qs: &str, time_filter: &str, agg_clause: &str) -> String {
    remove_keyword(&format!("{}{}{}", qs, time_filter, agg_clause))
}

/// Drop the first `.keyword` suffix; the backend addresses the base field.
pub fn remove_keyword(qs: &str) -> String {
    qs.replacen(KEYWORD_SUFFIX, "", 1)
}

fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggs::Interval;
    use crate::frame::FieldType;
    use chrono::{TimeZone, Utc};

    struct FixedInterval;

    impl AutoInterval for FixedInterval {
        fn calculate_auto_time_expression(&self, _range: &ResolvedTimeRange) -> String {
            "5m".to_string()
        }
    }

    fn range() -> ResolvedTimeRange {
        ResolvedTimeRange {
            from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap(),
        }
    }

    fn ts() -> Field {
        Field::new("timestamp", FieldType::Date)
    }

    #[test]
    fn test_no_aggregation_uses_auto_interval() {
        let clause = compile(Some(&ts()), None, &range(), &FixedInterval);
        assert_eq!(clause, " | stats count() by span(timestamp, 5m)");
    }

    #[test]
    fn test_no_aggregation_no_time_field() {
        assert_eq!(compile(None, None, &range(), &FixedInterval), "");
    }

    #[test]
    fn test_date_histogram_interval() {
        let fixed = AggDescriptor::DateHistogram {
            field: "timestamp".to_string(),
            interval: Some(Interval::Fixed("30s".to_string())),
        };
        assert_eq!(
            compile(Some(&ts()), Some(&fixed), &range(), &FixedInterval),
            " | stats count() by span(timestamp, 30s)"
        );

        let calendar = AggDescriptor::DateHistogram {
            field: "timestamp".to_string(),
            interval: Some(Interval::Calendar("1d".to_string())),
        };
        assert_eq!(
            compile(Some(&ts()), Some(&calendar), &range(), &FixedInterval),
            " | stats count() by span(timestamp, 1d)"
        );
    }

    #[test]
    fn test_date_histogram_falls_back_to_auto() {
        let agg = AggDescriptor::DateHistogram {
            field: "utc_time".to_string(),
            interval: None,
        };
        assert_eq!(
            compile(None, Some(&agg), &range(), &FixedInterval),
            " | stats count() by span(utc_time, 5m)"
        );
    }

    #[test]
    fn test_avg_and_terms() {
        let avg = AggDescriptor::Avg {
            field: "bytes".to_string(),
        };
        assert_eq!(
            compile(Some(&ts()), Some(&avg), &range(), &FixedInterval),
            " | stats avg(bytes)"
        );

        let terms = AggDescriptor::Terms {
            field: "machine.os".to_string(),
        };
        assert_eq!(
            compile(Some(&ts()), Some(&terms), &range(), &FixedInterval),
            " | stats count() by machine.os"
        );
    }

    #[test]
    fn test_cardinality_is_dedup_then_count() {
        let agg = AggDescriptor::Cardinality {
            field: "clientip".to_string(),
        };
        let clause = compile(None, Some(&agg), &range(), &FixedInterval);
        assert_eq!(clause, " | dedup clientip | stats count()");
        assert!(!clause.contains("cardinality"));
        assert!(clause.find("dedup clientip").unwrap() < clause.find("count()").unwrap());
    }

    #[test]
    fn test_other_bucket_exclusions() {
        let agg = AggDescriptor::OtherBucket {
            field: "x".to_string(),
            excluded_values: vec!["a".to_string(), "b".to_string()],
        };
        let clause = compile(Some(&ts()), Some(&agg), &range(), &FixedInterval);
        assert_eq!(clause, " | stats count() by x | where x<>'a' and x<>'b'");
        assert_eq!(clause.matches("x<>").count(), 2);
    }

    #[test]
    fn test_other_bucket_quotes_escaped() {
        let agg = AggDescriptor::OtherBucket {
            field: "name".to_string(),
            excluded_values: vec!["o'neil".to_string()],
        };
        assert_eq!(
            compile(None, Some(&agg), &range(), &FixedInterval),
            " | stats count() by name | where name<>'o''neil'"
        );
    }

    #[test]
    fn test_other_bucket_empty_is_noop() {
        let agg = AggDescriptor::OtherBucket {
            field: "x".to_string(),
            excluded_values: vec![],
        };
        assert_eq!(compile(Some(&ts()), Some(&agg), &range(), &FixedInterval), "");
    }

    #[test]
    fn test_compile_is_deterministic() {
        let agg = AggDescriptor::Terms {
            field: "host".to_string(),
        };
        let a = compile(Some(&ts()), Some(&agg), &range(), &FixedInterval);
        let b = compile(Some(&ts()), Some(&agg), &range(), &FixedInterval);
        assert_eq!(a, b);
    }

    #[test]
    fn test_remove_keyword_first_only() {
        assert_eq!(
            remove_keyword("source=logs | where host.keyword = 'a' and os.keyword = 'b'"),
            "source=logs | where host = 'a' and os.keyword = 'b'"
        );
        assert_eq!(remove_keyword("source=logs"), "source=logs");
    }

    #[test]
    fn test_aggregation_query_order() {
        let qs = aggregation_query(
            "source=logs",
            " | where ts >= 'a' and ts <= 'b'",
            " | stats count() by machine.os.keyword",
        );
        assert_eq!(
            qs,
            "source=logs | where ts >= 'a' and ts <= 'b' | stats count() by machine.os"
        );
    }
}
