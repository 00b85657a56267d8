use anyhow::Result;
use std::sync::Arc;

use qlens::assist::{QueryAssistClient, QueryAssistParams};
use qlens::transport::ReqwestTransport;
use qlens::{Config, Error, QueryLanguage};

/// Ask the backend to turn `question` into a query and print it
pub async fn run_assist(
    config: &Config,
    question: String,
    index: String,
    language: QueryLanguage,
) -> Result<()> {
    let transport = Arc::new(ReqwestTransport::new(&config.backend)?);
    let client = Arc::new(QueryAssistClient::new(
        transport,
        config.endpoints.query_assist.clone(),
    ));

    let watcher = tokio::spawn({
        let client = client.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling generation");
                client.teardown();
            }
        }
    });

    let params = QueryAssistParams {
        question,
        index,
        language,
        data_source_id: config.backend.data_source_id.clone(),
    };
    let result = client.generate(&params).await;
    watcher.abort();

    match result {
        Ok(response) => {
            println!("{}", response.query);
            if let Some(range) = response.time_range {
                println!("Time range: {} .. {}", range.from, range.to);
            }
            Ok(())
        }
        Err(Error::ProhibitedQuery(message)) => {
            anyhow::bail!("The question was refused by the guardrails: {}", message)
        }
        Err(e) => Err(e.into()),
    }
}
