//! Module defining the errors which are exposed to the users of the crate

use std::path::PathBuf;

use crate::domain::FieldType;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The tabular source could not be opened for reading
    #[error("source unavailable: {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV stream broke while being read (I/O failure)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is not part of the header
    #[error("required column '{0}' is missing")]
    MissingField(&'static str),

    /// A required column is present but blank after trimming
    #[error("required column '{0}' is empty")]
    EmptyRequiredField(&'static str),

    /// A required numeric column holds text which does not parse
    #[error("column '{column}' is not a valid {expected}: {value}")]
    InvalidNumericFormat {
        column: &'static str,
        expected: FieldType,
        value: String,
    },

    /// A CSV line which could not even be split into fields, e.g. invalid UTF-8
    #[error("malformed line: {0}")]
    MalformedLine(String),

    /// The properties file could not be read
    #[error("config unavailable: {path}: {source}")]
    ConfigUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The topic of a dispatcher resolves to nothing
    #[error("required config '{0}' is not set")]
    MissingTopicConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// The broker dropped a message without reporting an outcome
    #[error("delivery canceled before the broker acknowledged the message")]
    DeliveryCanceled,

    /// Delivery failure reported by a non-Kafka broker
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// No delivery report arrived within the flush timeout after the connection was closed
    #[error("no delivery report received before the dispatcher was closed")]
    DeliveryAbandoned,

    /// The blocking task flushing the broker panicked or was cancelled
    #[error("flushing the broker was interrupted: {0}")]
    FlushInterrupted(#[source] tokio::task::JoinError),

    #[error("dispatcher for topic '{0}' is already closed")]
    DispatcherClosed(String),

    #[error("dispatchers must be created within a Tokio runtime")]
    NoRuntime,
}

pub(crate) fn invalid_numeric(
    column: &'static str,
    expected: FieldType,
    value: impl Into<String>,
) -> Error {
    Error::InvalidNumericFormat {
        column,
        expected,
        value: value.into(),
    }
}

pub(crate) fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Error {
    Error::SourceUnavailable {
        path: path.into(),
        source,
    }
}
