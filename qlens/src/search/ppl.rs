//! PPL interceptor: a two-phase fetch driven by an explicit state machine
//!
//! ```text
//! NoSchema --fetch 1--> SchemaFetched --annotate--> Annotated --fetch 2--> Delivered
//! ```
//!
//! A caller-supplied frame starts the machine at `Annotated`, so a warm
//! search costs one fetch. Any `Err` is the terminal failed state.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{
    FetchBody, QueryLanguage, SearchInterceptor, SearchOptions, SearchRequest, SearchResponse,
    SearchServices,
};
use crate::aggs::{aggregation_query, compile, remove_keyword, AggConfig, AggDescriptor};
use crate::error::{Error, Result};
use crate::frame::{attach_meta, resolve_time_field, DataFrame, DataFrameMeta, Field};
use crate::telemetry::SearchTimer;
use crate::time::{build_time_filter, ResolvedTimeRange};

pub const PPL_QUERY_ERROR_TITLE: &str = "Could not complete the PPL query";

/// Key of the aggregation query stored when the search has no aggregation
pub const DEFAULT_AGG_ID: &str = "_default";

/// What to do when the schema has no time field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTimeFieldPolicy {
    /// Send the query without a time filter
    #[default]
    Omit,
    /// Fail the search with [`Error::MissingTimeField`]
    Reject,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PplState {
    NoSchema,
    SchemaFetched(DataFrame),
    Annotated { query: String, frame: DataFrame },
    Delivered(SearchResponse),
}

impl PplState {
    pub fn name(&self) -> &'static str {
        match self {
            PplState::NoSchema => "no_schema",
            PplState::SchemaFetched(_) => "schema_fetched",
            PplState::Annotated { .. } => "annotated",
            PplState::Delivered(_) => "delivered",
        }
    }
}

/// Inputs fixed for the whole search
struct Translation<'a> {
    /// Raw query with the first `.keyword` removed
    qs: String,
    agg: Option<&'a AggConfig>,
    range: ResolvedTimeRange,
    time_field_name: Option<&'a str>,
    index: Option<&'a str>,
    data_source_id: Option<&'a str>,
}

pub struct PplSearchInterceptor {
    services: SearchServices,
    missing_time_field: MissingTimeFieldPolicy,
}

impl PplSearchInterceptor {
    pub fn new(services: SearchServices, missing_time_field: MissingTimeFieldPolicy) -> Self {
        Self {
            services,
            missing_time_field,
        }
    }

    /// Starting state: cold without a frame, annotated with one
    fn initial_state(&self, tr: &Translation<'_>, frame: Option<&DataFrame>) -> Result<PplState> {
        let Some(frame) = frame else {
            return Ok(PplState::NoSchema);
        };
        match frame.meta() {
            Some(meta) => {
                tracing::debug!("Reusing cached time filter");
                let query = format!("{}{}", tr.qs, meta.time_filter);
                Ok(PplState::Annotated {
                    query,
                    frame: frame.clone(),
                })
            }
            None => self.annotate(tr, frame.clone()),
        }
    }

    async fn step(
        &self,
        state: PplState,
        tr: &Translation<'_>,
        options: &SearchOptions,
    ) -> Result<PplState> {
        match state {
            PplState::NoSchema => {
                let response = self.fetch(&tr.qs, None, tr, options).await?;
                if response.backend_error().is_some() {
                    self.services
                        .surface_backend_error(QueryLanguage::Ppl, &response, PPL_QUERY_ERROR_TITLE);
                    return Ok(PplState::Delivered(response));
                }
                Ok(PplState::SchemaFetched(response.data_frame()?))
            }
            PplState::SchemaFetched(frame) => self.annotate(tr, frame),
            PplState::Annotated { query, frame } => {
                let response = self.fetch(&query, Some(&frame), tr, options).await?;
                self.services
                    .surface_backend_error(QueryLanguage::Ppl, &response, PPL_QUERY_ERROR_TITLE);
                Ok(PplState::Delivered(response))
            }
            delivered @ PplState::Delivered(_) => Ok(delivered),
        }
    }

    /// Compute time filter and aggregation queries for `frame`, store them as
    /// its meta and extend the query with the time filter.
    fn annotate(&self, tr: &Translation<'_>, mut frame: DataFrame) -> Result<PplState> {
        let time_field = resolve_time_field(&frame, tr.time_field_name, tr.agg);
        if time_field.is_none() {
            let source = tr
                .index
                .or(frame.name.as_deref())
                .unwrap_or("query")
                .to_string();
            match self.missing_time_field {
                MissingTimeFieldPolicy::Reject => return Err(Error::MissingTimeField(source)),
                MissingTimeFieldPolicy::Omit => {
                    tracing::debug!(source = %source, "No time field, sending query unfiltered")
                }
            }
        }

        let time_filter = build_time_filter(
            time_field.as_ref(),
            &tr.range,
            self.services.date_formatter.as_ref(),
        );
        let aggs_qs = self.aggs_qs(tr, time_field.as_ref(), &time_filter);

        let query = format!("{}{}", tr.qs, time_filter);
        let meta = DataFrameMeta::new(tr.qs.clone(), tr.agg.cloned(), time_field, time_filter)
            .with_aggs_qs(aggs_qs);
        attach_meta(&mut frame, meta);

        Ok(PplState::Annotated { query, frame })
    }

    /// One query per aggregation id: the aggregation and each sub-aggregation
    fn aggs_qs(
        &self,
        tr: &Translation<'_>,
        time_field: Option<&Field>,
        time_filter: &str,
    ) -> BTreeMap<String, String> {
        let query_for = |descriptor: Option<&AggDescriptor>| {
            let clause = compile(
                time_field,
                descriptor,
                &tr.range,
                self.services.auto_interval.as_ref(),
            );
            aggregation_query(&tr.qs, time_filter, &clause)
        };

        let mut aggs_qs = BTreeMap::new();
        match tr.agg {
            None => {
                aggs_qs.insert(DEFAULT_AGG_ID.to_string(), query_for(None));
            }
            Some(agg) => {
                aggs_qs.insert(agg.id.clone(), query_for(agg.descriptor.as_ref()));
                for (id, sub) in &agg.sub_aggs {
                    aggs_qs.insert(id.clone(), query_for(sub.descriptor.as_ref()));
                }
            }
        }
        aggs_qs
    }

    async fn fetch(
        &self,
        qs: &str,
        frame: Option<&DataFrame>,
        tr: &Translation<'_>,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let body = FetchBody::new(qs, frame).data_source_id(tr.data_source_id);
        self.services
            .fetch(&self.services.endpoints.ppl, body, options)
            .await
    }

    async fn run(&self, request: &SearchRequest, options: &SearchOptions) -> Result<SearchResponse> {
        let params = &request.params;
        let range = self
            .services
            .time_filter
            .time_range()
            .resolve(Utc::now())?;
        let tr = Translation {
            qs: remove_keyword(&params.query),
            agg: params.aggs.as_ref(),
            range,
            time_field_name: params.time_field_name.as_deref(),
            index: params.index.as_deref(),
            data_source_id: params.data_source_id.as_deref(),
        };

        let mut state = self.initial_state(&tr, params.data_frame.as_ref())?;
        loop {
            tracing::trace!(state = state.name(), "PPL search step");
            state = match self.step(state, &tr, options).await? {
                PplState::Delivered(response) => return Ok(response),
                next => next,
            };
        }
    }
}

#[async_trait]
impl SearchInterceptor for PplSearchInterceptor {
    fn language(&self) -> QueryLanguage {
        QueryLanguage::Ppl
    }

    async fn search(
        &self,
        request: &SearchRequest,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let timer = SearchTimer::new(QueryLanguage::Ppl.as_str());
        let result = self.run(request, options).await;
        if let Ok(response) = &result {
            tracing::info!(id = request.id.as_deref().unwrap_or(""), took = response.took, "PPL search delivered");
        }
        timer.finish(result)
    }
}
