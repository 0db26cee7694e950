use thiserror::Error;

/// Fatal conditions of the accident-data pipeline. Per-cell parse failures
/// are not represented here; those are recovered inline by the loader.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The index page yielded zero primary download links, so no archive
    /// reference can be resolved for any year.
    #[error("index page contains no primary download links")]
    NoDownloadLinks,

    /// A region code outside the fixed 14-entry table.
    #[error("unknown region code `{0}`")]
    UnknownRegion(String),

    /// Tables with differing labels or column types reached `merge`.
    #[error("schema mismatch between tables: {0}")]
    SchemaMismatch(String),
}
