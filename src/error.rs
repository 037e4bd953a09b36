//! Error types for the OS2Phonebook service.
//!
//! This module defines custom error types using `thiserror` for precise error handling.

use thiserror::Error;

/// Errors that can occur when talking to the OS2MO organisation API.
///
/// Any error of this kind is fatal to an import run; there is no per-entity
/// retry policy.
#[derive(Error, Debug)]
pub enum MoApiError {
    /// HTTP transport failed before a response was received
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// OS2MO returned a non-success status code
    #[error("OS2MO error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse a JSON response
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The organisation listing was empty
    #[error("OS2MO returned no organisation")]
    MissingOrganisation,

    /// An org unit's parent chain revisited a unit
    #[error("org unit parent chain contains a cycle at {0}")]
    ParentCycle(String),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    /// Environment variable has invalid value
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Errors raised by the datastore layer (query dispatch and index backends).
#[derive(Error, Debug)]
pub enum DatastoreError {
    /// The search intent key is not in the intent table
    #[error("Search type: {0} is not available")]
    InvalidSearchType(String),

    /// No document stored under the given id
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The index backend failed to execute a request
    #[error("Index backend error: {0}")]
    Backend(String),

    /// Failed to parse a backend response
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors raised while normalizing imported records into index documents.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// Walking the parent chain revisited a unit
    #[error("org unit parent chain contains a cycle at {0}")]
    ParentCycle(String),

    /// A unit references a parent that was never imported
    #[error("org unit {unit} references unknown parent {parent}")]
    UnknownParent { unit: String, parent: String },

    /// Failed to serialize the document snapshot
    #[error("JSON serialize error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors surfaced at the HTTP boundary.
///
/// Each variant maps to one entry of the error taxonomy: the variant name is
/// the `type` field of the JSON error envelope and [`ServiceError::status_code`]
/// is the HTTP status. Internal detail never reaches the client; it is logged
/// at the handler before the generic message is returned.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Request body is malformed or missing required fields
    #[error("{0}")]
    InvalidRequestBody(String),

    /// Unknown search intent key
    #[error("Search type: {0} is not available")]
    InvalidSearchType(String),

    /// Authentication failed on a protected endpoint
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Authenticated but not permitted
    #[error("Insufficient credentials")]
    InsufficientCredentials,

    /// Unknown route or unknown document id
    #[error("{0}")]
    NotFound(String),

    /// Anything unexpected; the message shown to the caller is generic
    #[error("Unknown error occured, please contact administrator")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status code for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::InvalidRequestBody(_) | ServiceError::InvalidSearchType(_) => 400,
            ServiceError::InvalidCredentials => 401,
            ServiceError::InsufficientCredentials => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Internal(_) => 500,
        }
    }

    /// The `type` field of the JSON error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidRequestBody(_) => "InvalidRequestBody",
            ServiceError::InvalidSearchType(_) => "InvalidSearchType",
            ServiceError::InvalidCredentials => "InvalidCredentials",
            ServiceError::InsufficientCredentials => "InsufficientCredentials",
            ServiceError::NotFound(_) => "NotFound",
            ServiceError::Internal(_) => "Internal",
        }
    }
}

impl From<DatastoreError> for ServiceError {
    fn from(err: DatastoreError) -> Self {
        match err {
            DatastoreError::InvalidSearchType(t) => ServiceError::InvalidSearchType(t),
            DatastoreError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

/// Convenience type alias for Results with MoApiError
pub type MoApiResult<T> = Result<T, MoApiError>;

/// Convenience type alias for Results with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Convenience type alias for Results with DatastoreError
pub type DatastoreResult<T> = Result<T, DatastoreError>;
