pub mod assist;
pub mod search;
pub mod translate;

pub use assist::run_assist;
pub use search::{run_search, SearchArgs};
pub use translate::{run_translate, TranslateArgs};

use anyhow::{Context, Result};
use qlens::aggs::AggConfig;

/// Parse `--aggs` JSON into an aggregation config
fn parse_aggs(aggs: Option<&str>) -> Result<Option<AggConfig>> {
    let Some(raw) = aggs else {
        return Ok(None);
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).context("--aggs is not valid JSON")?;
    Ok(AggConfig::from_raw(&value)?)
}
