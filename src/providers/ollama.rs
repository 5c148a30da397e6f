//! Local Ollama server: single-prompt generate endpoint, no credentials

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{refuse_images, to_body, Reply, WireFormat, WireRequest};
use crate::error::{Error, Result};
use crate::request::RequestPayload;
use crate::retry::{RetryExecutor, RetryPolicy, Transport};

const TAGS_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a>
{   model: &'a str
  , prompt: &'a str
  , system: &'a str
  , stream: bool
  , options: GenerateOptions
}

#[derive(Debug, Serialize)]
struct GenerateOptions
{   temperature: f32
  , top_p: f32
  , num_predict: u32
}

#[derive(Debug, Deserialize)]
struct GenerateResponse
{   response: String
  , #[serde(default)]
    thinking: Option<String>
}

#[derive(Debug, Deserialize)]
struct TagsResponse
{   models: Vec<LocalModel>
}

#[derive(Debug, Deserialize)]
struct LocalModel
{   name: String
}

/// Local provider wire format
#[derive(Debug, Clone, Copy)]
pub struct Generate;

impl WireFormat for Generate
{   fn build_body(&self, request: &WireRequest<'_>) -> Result<Vec<u8>>
    {   refuse_images(request, "local")?;
        to_body(&GenerateRequest
        {   model: request.model
          , prompt: &request.prompt.user
          , system: &request.prompt.system
          , stream: false
          , options: GenerateOptions
            {   temperature: request.sampling.temperature
              , top_p: request.sampling.top_p
              , num_predict: request.sampling.max_tokens
            }
        })
    }

    fn parse_reply(&self, body: &Value) -> std::result::Result<Reply, String>
    {   let response = GenerateResponse::deserialize(body)
          .map_err(|e| format!("expected a response field: {}", e))?;
        Ok(Reply
        {   text: response.response
          , thinking: response.thinking.filter(|t| !t.trim().is_empty())
        })
    }
}

/// Names of the models installed on a local Ollama server
pub async fn list_local_models<T: Transport>(
  transport: &T
, policy: &RetryPolicy
, base_url: &str
) -> Result<Vec<String>>
{   let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    debug!("Listing local models at {}", url);
    let payload = RequestPayload::get(&url, Duration::from_secs(TAGS_TIMEOUT_SECS));

    let response = RetryExecutor::new(transport, policy)
      .execute(&payload)
      .await?;

    let tags: TagsResponse = serde_json::from_str(&response.body)
      .map_err(|e| Error::parse(format!("expected a models list: {}", e), response.body.clone()))?;
    let names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
    debug!("Found {} local models", names.len());
    Ok(names)
}
