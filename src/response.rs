//! Normalises provider replies into one result type

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::reasoning::split_reasoning;
use crate::request::RawResponse;

/// Set on results whose reasoning segment never closed
pub const UNTERMINATED_REASONING: &str = "reasoning segment not terminated";

/// Normalised outcome of one generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult
{   pub provider: String
  , pub model: String
  , /// Generated artefact with reasoning removed
    pub text: String
  , pub reasoning: Option<String>
  , pub success: bool
  , pub error: Option<String>
}

/// True when `text` has used more than 90% of the `max_tokens` budget,
/// counting characters
pub fn near_token_limit(text: &str, max_tokens: u32) -> bool
{   text.chars().count() as f64 > f64::from(max_tokens) * 0.9
}

/// Extract generated text and reasoning from a successful reply.
/// `max_tokens` is the limit the request was actually sent with.
pub fn extract(raw: &RawResponse, provider: &ProviderConfig, max_tokens: u32)
  -> Result<GenerationResult>
{   let body: Value = serde_json::from_str(&raw.body)
      .map_err(|e| {
        error!("Response from {} is not JSON: {}", provider.name, e);
        Error::parse(format!("response is not valid JSON: {}", e), raw.body.clone())
      })?;

    if let Some(keys) = body.as_object().map(|o| o.keys().cloned().collect::<Vec<_>>())
    {   debug!("Response keys: {:?}", keys);
    }

    if let Some(err) = body.get("error").filter(|e| !e.is_null())
    {   error!("Provider {} returned an error object: {}", provider.name, err);
        return Err(Error::parse(
          format!("provider returned an error object: {}", err),
          raw.body.clone()
        ));
    }

    let reply = provider.kind.wire().parse_reply(&body)
      .map_err(|reason| {
        error!("Cannot extract {} response: {}", provider.name, reason);
        Error::parse(reason, raw.body.clone())
      })?;

    let split = split_reasoning(&reply.text);
    let reasoning = match (reply.thinking, split.reasoning)
    {   (Some(native), Some(tagged)) => Some(format!("{}\n\n{}", native, tagged))
      , (native, tagged) => native.or(tagged)
    };

    let (success, error) = if split.terminated
    {   (true, None)
    } else
    {   warn!("Response from {} left a reasoning segment open", provider.name);
        (false, Some(UNTERMINATED_REASONING.to_string()))
    };

    if near_token_limit(&split.primary, max_tokens)
    {   warn!(
          "Response approaching token limit: {} chars for max_tokens {}",
          split.primary.chars().count(),
          max_tokens
        );
    }

    Ok(GenerationResult
    {   provider: provider.name.clone()
      , model: provider.model.clone()
      , text: split.primary
      , reasoning
      , success
      , error
    })
}
