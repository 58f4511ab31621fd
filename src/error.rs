/// Failure fetching a metric set from the warehouse.
///
/// An empty result is not an error: it comes back as an empty table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The warehouse session could not be established, expired, or dropped.
    #[error("warehouse connection error: {0}")]
    Connection(String),
    /// The warehouse rejected the statement (schema drift, permissions, syntax).
    #[error("warehouse query error: {0}")]
    Query(String),
}

impl FetchError {
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
