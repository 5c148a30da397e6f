//! Retry policy and executor for outbound requests

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::config::RetryConfig;
use crate::error::{Error, Failure, Result, TransportError};
use crate::request::{RawResponse, RequestPayload};

/// Sends one request and reports the raw outcome; no retries of its own
pub trait Transport
{   fn send(&self, payload: &RequestPayload)
      -> impl Future<Output = std::result::Result<RawResponse, TransportError>> + Send;
}

/// Retry policy for failed requests. Constant per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy
{   pub max_retries: usize
  , pub base_delay: Duration
  , pub max_delay: Duration
  , pub retryable: BTreeSet<u16>
}

impl RetryPolicy
{   /// Create a new retry policy retrying 429 and 5xx gateway statuses
    pub fn new(
      max_retries: usize
    , base_delay: Duration
    , max_delay: Duration
    ) -> Self
    {   RetryPolicy
        {   max_retries
          , base_delay
          , max_delay
          , retryable: BTreeSet::from([429, 500, 502, 503, 504])
        }
    }

    /// Delay before the retry that follows attempt `attempt` (0-based):
    /// `min(base_delay * 2^attempt, max_delay)`
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration
    {   let delay = u32::try_from(attempt).ok()
          .and_then(|n| 2u32.checked_pow(n))
          .and_then(|factor| self.base_delay.checked_mul(factor))
          .unwrap_or(self.max_delay)
          .min(self.max_delay);
        debug!("Backoff for attempt {} is {:?}", attempt, delay);
        delay
    }

    pub fn is_retryable(&self, status: u16) -> bool
    {   self.retryable.contains(&status)
    }

    /// Most attempts a call can make
    pub fn max_attempts(&self) -> usize
    {   self.max_retries + 1
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy
{   fn from(config: &RetryConfig) -> Self
    {   RetryPolicy
        {   max_retries: config.max_retries
          , base_delay: Duration::from_millis(config.base_delay_ms)
          , max_delay: Duration::from_millis(config.max_delay_ms)
          , retryable: config.retryable_statuses.iter().copied().collect()
        }
    }
}

/// Sends a payload, retrying transient failures with exponential backoff
pub struct RetryExecutor<'a, T>
{   transport: &'a T
  , policy: &'a RetryPolicy
}

impl<'a, T: Transport> RetryExecutor<'a, T>
{   pub fn new(transport: &'a T, policy: &'a RetryPolicy) -> Self
    {   RetryExecutor
        {   transport
          , policy
        }
    }

    /// Send until a 2xx arrives, a non-retryable status is seen, or the
    /// retry budget is spent. The payload is re-sent unchanged.
    pub async fn execute(&self, payload: &RequestPayload) -> Result<RawResponse>
    {   let total = self.policy.max_attempts();
        let mut attempt = 0usize;
        loop
        {   debug!("Attempt {}/{} to {}", attempt + 1, total, payload.url);
            let failure = match self.transport.send(payload).await
            {   Ok(response) if response.is_success() => {
                  info!(
                    "Attempt {}/{} succeeded with status {}",
                    attempt + 1, total, response.status
                  );
                  return Ok(response);
                }
              , Ok(response) if self.policy.is_retryable(response.status) => {
                  Failure::RetryableStatus
                  {   status: response.status
                    , body: response.body
                  }
                }
              , Ok(response) => {
                  error!(
                    "Attempt {}/{} failed with non-retryable status {}",
                    attempt + 1, total, response.status
                  );
                  return Err(Error::Client
                  {   status: response.status
                    , body: response.body
                  });
                }
              , Err(e) => Failure::from(e)
            };

            if attempt >= self.policy.max_retries
            {   error!("All {} attempts failed, last failure: {}", total, failure);
                return Err(Error::RetryExhausted
                {   attempts: attempt + 1
                  , last: failure
                });
            }

            let delay = self.policy.delay_for_attempt(attempt);
            warn!(
              "Attempt {}/{} failed: {}. Retrying in {:?}",
              attempt + 1, total, failure, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
