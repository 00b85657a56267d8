use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use qlens::search::SearchParams;
use qlens::time::{FixedTimeFilter, TimeRange};
use qlens::{
    CancellationToken, Config, QueryLanguage, SearchInterceptorRegistry, SearchOptions,
    SearchRequest, SearchServices,
};

use super::parse_aggs;

#[derive(Debug)]
pub struct SearchArgs {
    pub language: QueryLanguage,
    pub query: String,
    pub from: String,
    pub to: String,
    pub aggs: Option<String>,
    pub index: Option<String>,
    pub data_source: Option<String>,
    pub time_field: Option<String>,
}

/// Run one search; Ctrl-C cancels it through the request token
pub async fn run_search(config: &Config, args: SearchArgs) -> Result<()> {
    let time_filter = Arc::new(FixedTimeFilter::new(TimeRange::new(&args.from, &args.to)));
    let services = SearchServices::from_config(config, time_filter)?;
    let registry = SearchInterceptorRegistry::with_defaults(services, config.search.missing_time_field);

    let request = SearchRequest {
        id: Some(uuid::Uuid::new_v4().to_string()),
        params: SearchParams {
            index: args.index,
            query: args.query,
            language: args.language,
            aggs: parse_aggs(args.aggs.as_deref())?,
            data_frame: None,
            data_source_id: args
                .data_source
                .or_else(|| config.backend.data_source_id.clone()),
            time_field_name: args.time_field,
        },
    };

    let token = CancellationToken::new();
    let watcher = tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling search");
                token.cancel();
            }
        }
    });

    let result = registry.search(&request, &SearchOptions::new(token)).await;
    watcher.abort();
    let response = result?;

    let output = match response.backend_error() {
        Some(error) => json!({
            "took": response.took,
            "error": {"response": error.response, "msg": error.msg},
        }),
        None => json!({
            "took": response.took,
            "hits": response.to_hits()?,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
