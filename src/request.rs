//! Ready-to-send request payloads and the request builder

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use log::{debug, error};
use reqwest::Method;

use crate::config::{CredentialSource, ProviderConfig, Sampling};
use crate::error::{Error, Result};
use crate::images::{ImageAsset, ImageLimits};
use crate::prompt::PromptText;
use crate::providers::WireRequest;
use crate::Modality;

/// A fully built request. Immutable once built and re-sent unchanged on
/// every retry attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestPayload
{   pub method: Method
  , pub url: String
  , pub headers: BTreeMap<String, String>
  , pub body: Vec<u8>
  , pub timeout: Duration
  , /// Header whose value must never be printed
    secret_header: Option<String>
}

impl RequestPayload
{   /// Bodiless GET without credentials
    pub fn get(url: &str, timeout: Duration) -> Self
    {   RequestPayload
        {   method: Method::GET
          , url: url.to_string()
          , headers: BTreeMap::new()
          , body: Vec::new()
          , timeout
          , secret_header: None
        }
    }

    /// Body parsed back into JSON, for inspection and logging
    pub fn json(&self) -> serde_json::Result<serde_json::Value>
    {   serde_json::from_slice(&self.body)
    }
}

impl fmt::Debug for RequestPayload
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   let headers: BTreeMap<&str, &str> = self.headers.iter()
          .map(|(k, v)| {
            let redact = self.secret_header.as_deref()
              .is_some_and(|s| s.eq_ignore_ascii_case(k));
            (k.as_str(), if redact { "<redacted>" } else { v.as_str() })
          })
          .collect();
        f.debug_struct("RequestPayload")
          .field("method", &self.method)
          .field("url", &self.url)
          .field("headers", &headers)
          .field("body_bytes", &self.body.len())
          .field("timeout", &self.timeout)
          .finish()
    }
}

/// Status and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse
{   pub status: u16
  , pub body: String
}

impl RawResponse
{   pub fn new(status: u16, body: impl Into<String>) -> Self
    {   RawResponse
        {   status
          , body: body.into()
        }
    }

    pub fn is_success(&self) -> bool
    {   (200..300).contains(&self.status)
    }
}

/// Refuse modality/provider combinations the wire shape cannot carry
pub fn check_capability(
  provider: &ProviderConfig
, modality: Modality
, image_count: usize
) -> Result<()>
{   match modality
    {   Modality::Vision if !provider.accepts_images() => {
          error!("Provider {} cannot take image input", provider.name);
          Err(Error::config(format!(
            "provider '{}' ({:?}) does not support image input",
            provider.name,
            provider.kind
          )))
        }
      , Modality::Text if image_count > 0 => Err(Error::config(format!(
          "{} images supplied for a text-only request",
          image_count
        )))
      , _ => Ok(())
    }
}

/// Build the request for one generation call. Pure: the same inputs
/// always produce byte-identical payloads.
pub fn build(
  provider: &ProviderConfig
, modality: Modality
, sampling: &Sampling
, prompt: &PromptText
, images: &[ImageAsset]
, credentials: &dyn CredentialSource
) -> Result<RequestPayload>
{   check_capability(provider, modality, images.len())?;
    reqwest::Url::parse(&provider.endpoint)
      .map_err(|e| Error::config(format!(
        "provider '{}' has an invalid endpoint '{}': {}",
        provider.name,
        provider.endpoint,
        e
      )))?;

    let limits = ImageLimits::for_provider(provider);
    if let Some(img) = images.iter().find(|i| i.encoded_len() > limits.max_encoded_bytes)
    {   return Err(Error::validation(format!(
          "{}: {} bytes exceeds the {} byte limit of provider '{}'",
          img.name,
          img.encoded_len(),
          limits.max_encoded_bytes,
          provider.name
        )));
    }

    let mut headers = provider.headers.clone();
    set_header(&mut headers, "Content-Type", "application/json".to_string());

    let mut secret_header = None;
    if provider.kind.requires_credential()
    {   let spec = provider.credential.as_ref()
          .ok_or_else(|| Error::config(format!(
            "provider '{}' has no credential configured",
            provider.name
          )))?;
        let secret = credentials.lookup(&spec.env_var)
          .ok_or_else(|| {
            error!("No credential in {} for {}", spec.env_var, provider.name);
            Error::config(format!("{} not found in environment", spec.env_var))
          })?;
        set_header(&mut headers, &spec.header, spec.header_value(&secret));
        secret_header = Some(spec.header.clone());
    }

    let body = provider.kind.wire().build_body(&WireRequest
    {   model: &provider.model
      , sampling
      , prompt
      , images
    })?;

    let payload = RequestPayload
    {   method: Method::POST
      , url: provider.endpoint.clone()
      , headers
      , body
      , timeout: provider.request_timeout(modality)
      , secret_header
    };
    debug!(
      "Built {:?} request for {} with {} images ({} body bytes)",
      modality,
      provider.name,
      images.len(),
      payload.body.len()
    );
    Ok(payload)
}

/// Header names are case-insensitive; drop any template entry that would
/// duplicate `name` under another spelling
fn set_header(headers: &mut BTreeMap<String, String>, name: &str, value: String)
{   headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}
