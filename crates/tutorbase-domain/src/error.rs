use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Corrupt envelope: {0}")]
    CorruptEnvelope(String),

    #[error("Record is missing required field: {0}")]
    MissingRecordField(String),

    #[error("Record field has unexpected shape: {field}: {message}")]
    MalformedRecordField { field: String, message: String },

    #[error("Broker error: {0}")]
    BrokerError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Contract failure raised by an enricher when a field it requires is absent
/// or unreadable. Validation guarantees these fields, so hitting this means
/// the producer and the pipeline disagree on the record shape. It is reported
/// separately from validation failures and dead-lettered without retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("enrichment requires field '{field}': {message}")]
pub struct EnrichmentError {
    pub field: String,
    pub message: String,
}

impl EnrichmentError {
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            message: "field is absent from validated payload".to_string(),
        }
    }

    pub fn malformed(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}
