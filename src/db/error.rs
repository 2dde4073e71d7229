use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("database query error: {0}")]
    Query(String),

    #[error("database migration error: {0}")]
    Migration(String),

    /// The same Telegram channel post was mirrored twice. This is an
    /// invariant violation, not an expected runtime condition.
    #[error("link for telegram message {0} already exists")]
    DuplicateLink(i32),

    #[error("link with id {0} not found")]
    NotFound(i64),
}
