//! Error types for mail-tender.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the mailbox/calendar collaborator.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Label not found: {0}")]
    LabelNotFound(String),

    #[error("Thread {0} has no messages")]
    EmptyThread(String),

    #[error("Body decoding failed: {0}")]
    Decode(String),
}

/// Transport-level failures of the task-capture sink.
///
/// A sink that answers with a non-200 code is not an error; that is reported
/// through `SinkResponse`.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Capture request failed: {0}")]
    RequestFailed(String),
}

/// Failures while turning a message body into task fields.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Template {template} could not extract required field {field}")]
    RequiredFieldMissing { template: String, field: String },

    #[error("Template {template} needs a {need} body but none was provided")]
    BodyUnavailable { template: String, need: String },

    #[error("Template {template} produced an empty heading")]
    EmptyHeading { template: String },

    #[error("Template {template} panicked during extraction: {reason}")]
    Panicked { template: String, reason: String },
}

/// Handler registration errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("A handler named {0} is already registered")]
    Duplicate(String),

    #[error("Invalid pattern for handler {handler}: {source}")]
    InvalidPattern {
        handler: String,
        #[source]
        source: regex::Error,
    },

    #[error("Handler {handler} references unknown field {field}")]
    UnknownField { handler: String, field: String },

    #[error("Handler {handler} is incomplete: {reason}")]
    Incomplete { handler: String, reason: String },
}

/// Result type alias for mail-tender.
pub type Result<T> = std::result::Result<T, Error>;
