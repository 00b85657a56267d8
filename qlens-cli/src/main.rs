use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use qlens::QueryLanguage;

#[derive(Parser, Debug)]
#[command(name = "qlens")]
#[command(about = "qlens - PPL and SQL search translation tools")]
#[command(version)]
struct Cli {
    /// Config file (created with defaults if missing)
    #[arg(short, long, env = "QLENS_CONFIG", default_value = "~/.qlens/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one search against the configured backend and print the hits
    Search {
        /// Query language: ppl, sql or sqlasync
        #[arg(short, long, default_value = "ppl")]
        language: QueryLanguage,

        /// Query string
        #[arg(short, long)]
        query: String,

        /// Start of the time range (ISO-8601 or date math)
        #[arg(long, default_value = "now-15m")]
        from: String,

        /// End of the time range (ISO-8601 or date math)
        #[arg(long, default_value = "now")]
        to: String,

        /// Aggregations as raw DSL JSON
        #[arg(long)]
        aggs: Option<String>,

        /// Index or dataset; the data source selector for sqlasync
        #[arg(short, long)]
        index: Option<String>,

        /// Data source id, overrides backend.data_source_id
        #[arg(long)]
        data_source: Option<String>,

        /// Dataset time field
        #[arg(long)]
        time_field: Option<String>,
    },

    /// Print the PPL clauses computed for a query, without network I/O
    Translate {
        /// PPL query string
        #[arg(short, long)]
        query: String,

        /// Data frame schema JSON, e.g. {"schema":[{"name":"ts","type":"date"}]}
        #[arg(short, long)]
        schema: String,

        /// Aggregations as raw DSL JSON
        #[arg(long)]
        aggs: Option<String>,

        #[arg(long, default_value = "now-15m")]
        from: String,

        #[arg(long, default_value = "now")]
        to: String,

        /// Dataset time field
        #[arg(long)]
        time_field: Option<String>,
    },

    /// Generate a query from a natural-language question
    Assist {
        #[arg(long)]
        question: String,

        #[arg(short, long)]
        index: String,

        #[arg(short, long, default_value = "ppl")]
        language: QueryLanguage,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = qlens::config::expand_tilde(&cli.config)?;
    let config = qlens::Config::load_or_create(&config_path)?;
    qlens::telemetry::init_tracing(&config.observability)?;

    match cli.command {
        Commands::Search {
            language,
            query,
            from,
            to,
            aggs,
            index,
            data_source,
            time_field,
        } => {
            commands::run_search(
                &config,
                commands::SearchArgs {
                    language,
                    query,
                    from,
                    to,
                    aggs,
                    index,
                    data_source,
                    time_field,
                },
            )
            .await?;
        }
        Commands::Translate {
            query,
            schema,
            aggs,
            from,
            to,
            time_field,
        } => {
            commands::run_translate(
                &config,
                commands::TranslateArgs {
                    query,
                    schema,
                    aggs,
                    from,
                    to,
                    time_field,
                },
            )?;
        }
        Commands::Assist {
            question,
            index,
            language,
        } => {
            commands::run_assist(&config, question, index, language).await?;
        }
    }

    Ok(())
}
