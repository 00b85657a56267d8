use anyhow::{Context, Result};
use chrono::Utc;

use qlens::aggs::{aggregation_query, compile, remove_keyword, BucketIntervalCalculator};
use qlens::frame::resolve_time_field;
use qlens::time::{build_time_filter, PplDateFormatter, TimeRange};
use qlens::{Config, DataFrame};

use super::parse_aggs;

#[derive(Debug)]
pub struct TranslateArgs {
    pub query: String,
    pub schema: String,
    pub aggs: Option<String>,
    pub from: String,
    pub to: String,
    pub time_field: Option<String>,
}

/// Show what the PPL interceptor would send for `args`
pub fn run_translate(config: &Config, args: TranslateArgs) -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(&args.schema).context("--schema is not valid JSON")?;
    let frame = DataFrame::from_value(&schema)?;
    let agg = parse_aggs(args.aggs.as_deref())?;
    let range = TimeRange::new(args.from, args.to).resolve(Utc::now())?;

    let formatter = PplDateFormatter::new(config.search.date_format.clone())?;
    let auto_interval = BucketIntervalCalculator::new(config.search.histogram_bar_target);

    let time_field = resolve_time_field(&frame, args.time_field.as_deref(), agg.as_ref());
    let time_filter = build_time_filter(time_field.as_ref(), &range, &formatter);
    let clause = compile(
        time_field.as_ref(),
        agg.as_ref().and_then(|a| a.descriptor.as_ref()),
        &range,
        &auto_interval,
    );
    let qs = remove_keyword(&args.query);

    match &time_field {
        Some(field) => println!("Time field:        {} ({})", field.name, field.field_type),
        None => println!("Time field:        <none>"),
    }
    println!("Time filter:       {}", time_filter.trim_start());
    println!("Aggregation:       {}", clause.trim_start());
    println!("Annotated query:   {}{}", qs, time_filter);
    println!(
        "Aggregation query: {}",
        aggregation_query(&qs, &time_filter, &clause)
    );
    Ok(())
}
