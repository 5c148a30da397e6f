//! Error taxonomy for the outbound request layer

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Network-level failure reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError
{   /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String)
  , /// Request exceeded the per-request timeout
    #[error("request timed out")]
    Timeout
  , /// Any other I/O or protocol failure
    #[error("transport failure: {0}")]
    Other(String)
}

/// Transient condition absorbed by the retry executor.
/// Only reaches the caller wrapped in [`Error::RetryExhausted`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure
{   /// Connection refused, reset or timed out
    #[error("network error: {0}")]
    Network(#[from] TransportError)
  , /// Provider answered with a status in the retryable set
    #[error("retryable status {status}: {body}")]
    RetryableStatus
    {   status: u16
      , body: String
    }
}

/// Custom error type for artefact generation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error
{   /// Image rejected before any network call
    #[error("invalid image: {0}")]
    Validation(String)
  , /// Missing credential, unknown provider or unsupported capability
    #[error("configuration error: {0}")]
    Config(String)
  , /// Non-retryable status (4xx other than 429); fails on first occurrence
    #[error("provider rejected request with status {status}: {body}")]
    Client
    {   status: u16
      , body: String
    }
  , /// Retry budget spent on transient failures
    #[error("gave up after {attempts} attempts, last failure: {last}")]
    RetryExhausted
    {   attempts: usize
      , last: Failure
    }
  , /// Response body did not have the shape the provider promises
    #[error("unexpected response shape: {reason}")]
    Parse
    {   reason: String
      , body: String
    }
}

impl Error
{   pub fn validation(msg: impl Into<String>) -> Self
    {   Error::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self
    {   Error::Config(msg.into())
    }

    pub fn parse(reason: impl Into<String>, body: impl Into<String>) -> Self
    {   Error::Parse
        {   reason: reason.into()
          , body: body.into()
        }
    }

    /// Stable short name for surfacing the error kind to end users
    pub fn kind(&self) -> &'static str
    {   match self
        {   Error::Validation(_) => "validation"
          , Error::Config(_) => "config"
          , Error::Client { .. } => "client"
          , Error::RetryExhausted { .. } => "retry_exhausted"
          , Error::Parse { .. } => "parse"
        }
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn exhausted_error_reports_attempts_and_last_status()
    {   let err = Error::RetryExhausted
        {   attempts: 4
          , last: Failure::RetryableStatus
            {   status: 500
              , body: "boom".to_string()
            }
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("500"));
        assert_eq!(err.kind(), "retry_exhausted");
    }

    #[test]
    fn transport_error_converts_into_network_failure()
    {   let failure: Failure = TransportError::Timeout.into();
        assert_eq!(failure, Failure::Network(TransportError::Timeout));
        assert_eq!(failure.to_string(), "network error: request timed out");
    }
}
