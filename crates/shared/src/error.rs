//! Shared error types.
//!
//! Errors that end up inside operation results are `Clone`, because one
//! in-flight result is handed to every caller attached to it.

use thiserror::Error;

use crate::protocol::GraphQLError;

/// Failure of the network layer itself. Never retried for one-shot operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out after {0}ms")]
    Timeout(u64),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Stream reset: {0}")]
    StreamReset(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

/// Missing or invalid transport configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
    #[error("{name} must use one of {expected:?}, got {found:?}")]
    UnsupportedScheme {
        name: &'static str,
        expected: &'static [&'static str],
        found: String,
    },
    #[error("{name} must be a whole number of milliseconds, got {found:?}")]
    InvalidNumber { name: &'static str, found: String },
    #[error("no {0} channel is configured")]
    NoChannel(&'static str),
}

/// Error carried in the `error` field of an operation result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("GraphQL error: {}", first_message(.0))]
    Protocol(Vec<GraphQLError>),
    #[error("client has been shut down")]
    Shutdown,
}

impl ClientError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    /// Protocol errors reported by the server, if any.
    pub fn graphql_errors(&self) -> &[GraphQLError] {
        match self {
            ClientError::Protocol(errors) => errors,
            _ => &[],
        }
    }
}

fn first_message(errors: &[GraphQLError]) -> String {
    match errors {
        [] => "unknown".to_string(),
        [only] => only.message.clone(),
        [first, rest @ ..] => format!("{} (and {} more)", first.message, rest.len()),
    }
}

/// Rejected selection coming back from a selection widget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("selection is not an object with `value` and `label`")]
    Malformed,
    #[error("selection value {0} is not a valid identifier")]
    InvalidValue(String),
    #[error("options are not available yet")]
    OptionsUnavailable,
    #[error("{0} is not one of the available options")]
    UnknownOption(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_summarises_first_message() {
        let err = ClientError::Protocol(vec![
            GraphQLError::new("permission denied"),
            GraphQLError::new("field missing"),
        ]);
        assert_eq!(err.to_string(), "GraphQL error: permission denied (and 1 more)");
        assert_eq!(err.graphql_errors().len(), 2);
        assert!(!err.is_transport());
    }

    #[test]
    fn transport_error_converts_into_client_error() {
        let err: ClientError = TransportError::Timeout(500).into();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "Request timed out after 500ms");
    }
}
