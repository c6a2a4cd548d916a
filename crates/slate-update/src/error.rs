/// Errors surfaced while parsing, applying or replaying an update.
///
/// Every variant aborts the whole update: the target document is left exactly
/// as it was before the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpdateError {
    /// Unknown operator, malformed parameter object or conflicting paths.
    #[error("invalid modifier: {0}")]
    InvalidModifier(String),

    /// An operator was applied to a stored value of an incompatible type.
    #[error("type mismatch at '{path}': {message}")]
    TypeMismatch { path: String, message: String },

    /// The upsert query could not be turned into a base document.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The document to update or log carries no `_id`.
    #[error("document has no _id")]
    MissingId,

    /// A replayed update entry targets a document the replica does not have.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// An oplog document that `LogEntry::from_document` cannot interpret.
    #[error("malformed log entry: {0}")]
    MalformedLogEntry(String),

    /// Raw input that is not well-formed BSON.
    #[error("malformed BSON: {0}")]
    Bson(String),
}

impl UpdateError {
    pub(crate) fn type_mismatch(path: &str, message: impl Into<String>) -> Self {
        UpdateError::TypeMismatch {
            path: path.to_string(),
            message: message.into(),
        }
    }
}
