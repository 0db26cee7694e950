pub mod cache;
pub mod error;
pub mod fetch;
pub mod process;
pub mod region;
pub mod schema;
pub mod stats;

pub use error::ScrapeError;
pub use process::table::RecordTable;
