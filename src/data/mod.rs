//! Data layer: storage traits, SQLite backend and the statistics cache

pub mod cache;
pub mod error;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use cache::{StatsCache, StatsService};
pub use error::DataError;
pub use traits::{RecordSource, SyncOutcome};
