pub mod aggs;
pub mod assist;
pub mod cancel;
pub mod config;
pub mod error;
pub mod frame;
pub mod notify;
pub mod search;
pub mod telemetry;
pub mod time;
pub mod transport;

pub use cancel::{CancellationCoordinator, CancellationToken};
pub use config::Config;
pub use error::{Error, Result};
pub use frame::{DataFrame, DataFrameMeta, Field, FieldType};
pub use search::{
    QueryLanguage, SearchInterceptor, SearchInterceptorRegistry, SearchOptions, SearchRequest,
    SearchResponse, SearchServices,
};
