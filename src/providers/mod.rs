//! Provider wire formats.
//!
//! Each [`ProviderKind`] maps to exactly one [`WireFormat`], which knows
//! how to serialise a request body and where the generated text sits in
//! the reply. Adding a provider family means adding a variant and one
//! implementation here; the builder and extractor stay untouched.

pub mod anthropic;
pub mod chat;
pub mod ollama;

use serde_json::Value;

use crate::config::Sampling;
use crate::error::{Error, Result};
use crate::images::ImageAsset;
use crate::prompt::PromptText;
use crate::ProviderKind;

/// Everything a wire format needs to serialise one request body
#[derive(Debug, Clone, Copy)]
pub struct WireRequest<'a>
{   pub model: &'a str
  , pub sampling: &'a Sampling
  , pub prompt: &'a PromptText
  , pub images: &'a [ImageAsset]
}

/// Text located in a provider reply, before reasoning is split out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply
{   pub text: String
  , /// Reasoning the provider returned in a dedicated field
    pub thinking: Option<String>
}

/// Payload construction and response parsing for one provider family
pub trait WireFormat: Sync
{   fn build_body(&self, request: &WireRequest<'_>) -> Result<Vec<u8>>;

    /// Locate the generated text; `Err` carries the reason the shape
    /// did not match
    fn parse_reply(&self, body: &Value) -> std::result::Result<Reply, String>;
}

impl ProviderKind
{   pub fn wire(self) -> &'static dyn WireFormat
    {   match self
        {   ProviderKind::CloudVision => &anthropic::Messages
          , ProviderKind::CloudText => &chat::ChatCompletions
          , ProviderKind::Local => &ollama::Generate
        }
    }
}

fn to_body<T: serde::Serialize>(body: &T) -> Result<Vec<u8>>
{   serde_json::to_vec(body)
      .map_err(|e| Error::config(format!("cannot serialise request body: {}", e)))
}

fn refuse_images(request: &WireRequest<'_>, family: &str) -> Result<()>
{   if request.images.is_empty()
    {   Ok(())
    } else
    {   Err(Error::config(format!(
          "{} requests cannot carry images ({} supplied)",
          family,
          request.images.len()
        )))
    }
}
