use thiserror::Error;

/// Local precondition failures raised before any network call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("username and password must both be supplied")]
    EmptyCredentials,
    #[error("placeholder credentials supplied; replace them with a real service identity")]
    PlaceholderCredentials,
    #[error("no session token held; call authenticate() before issuing requests")]
    NotAuthenticated,

    #[error("filter identifier '{value}' must be 5-45 alphanumeric or underscore characters")]
    InvalidFilterId { value: String },
    #[error("filter constituents must contain between 1 and {max} entries, got {count}")]
    ConstituentsOutOfRange { count: usize, max: usize },

    #[error("change queries may look back at most {max} days, requested {days}")]
    LookbackExceeded { days: i64, max: i64 },
    #[error("page queries require a non-zero sequence identifier")]
    ZeroSequence,

    #[error("value '{value}' is already in wire date form")]
    DateAlreadyEncoded { value: String },
    #[error("invalid wire date: '{value}'")]
    InvalidWireDate { value: String },
    #[error("calendar date '{value}' must be in YYYY-MM-DD form")]
    InvalidCalendarDate { value: String },
}

/// Network-layer failures. Candidates for caller-directed retry, unlike a
/// [`DswsError::ServiceFault`] which means the request was understood and rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },
    #[error("failed to decode response body as JSON: {0}")]
    JsonDecode(String),
}

/// Top-level error type for all client operations.
///
/// Domain failures (permission denied for an object, item not found, format
/// errors) are not represented here: they arrive inside a successfully decoded
/// response as a status enum for the caller to branch on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DswsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// HTTP 400/403 whose body matched the `{Code, SubCode, Message}` fault
    /// schema. Raised only for session-establishment-level failures such as
    /// invalid credentials or blocked access.
    #[error("service fault {code}/{subcode}: {message}")]
    ServiceFault {
        code: String,
        subcode: String,
        message: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DswsError {
    /// Transport failures may be retried by the caller; everything else is
    /// fatal to the current operation.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        let transport: DswsError = TransportError::Status { status: 502 }.into();
        assert!(transport.is_retryable());

        let fault = DswsError::ServiceFault {
            code: String::from("0100"),
            subcode: String::from("01"),
            message: String::from("bad creds"),
        };
        assert!(!fault.is_retryable());

        let validation: DswsError = ValidationError::EmptyCredentials.into();
        assert!(!validation.is_retryable());
    }
}
