//! Configuration for providers, sampling and retry behaviour

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{Modality, ProviderKind};

const DEFAULT_TEXT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_VISION_TIMEOUT_SECS: u64 = 120;

fn default_temperature() -> f32 { 0.7 }
fn default_top_p() -> f32 { 0.9 }
fn default_auth_header() -> String { "Authorization".to_string() }

/// How the credential is rendered into its header value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme
{   /// `Authorization: Bearer <key>`
    #[default]
    Bearer
  , /// Key sent as-is, e.g. `x-api-key: <key>`
    Raw
}

/// Where a provider's credential comes from and where it goes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSpec
{   /// Environment variable holding the key
    pub env_var: String
  , /// Header carrying the key
    #[serde(default = "default_auth_header")]
    pub header: String
  , #[serde(default)]
    pub scheme: AuthScheme
}

impl CredentialSpec
{   pub fn header_value(&self, secret: &str) -> String
    {   match self.scheme
        {   AuthScheme::Bearer => format!("Bearer {}", secret)
          , AuthScheme::Raw => secret.to_string()
        }
    }
}

/// Provider configuration. Read-only for the duration of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig
{   /// Provider name; filled from the map key when loaded from a file
    #[serde(default)]
    pub name: String
  , pub kind: ProviderKind
  , /// Model identifier sent in the body
    pub model: String
  , /// Full endpoint URL requests are POSTed to
    pub endpoint: String
  , /// Static header template (e.g. `anthropic-version`)
    #[serde(default)]
    pub headers: BTreeMap<String, String>
  , /// Absent for local providers
    #[serde(default)]
    pub credential: Option<CredentialSpec>
  , pub max_tokens: u32
  , #[serde(default = "default_temperature")]
    pub temperature: f32
  , #[serde(default = "default_top_p")]
    pub top_p: f32
  , #[serde(default)]
    pub presence_penalty: Option<f32>
  , #[serde(default)]
    pub frequency_penalty: Option<f32>
  , #[serde(default)]
    pub supports_vision: bool
  , /// Ceiling on one image's base64 payload; defaults to 5 MiB
    #[serde(default)]
    pub max_image_bytes: Option<usize>
  , /// Per-request timeout; defaults to 60 s for text and 120 s for vision
    #[serde(default)]
    pub timeout_secs: Option<u64>
}

impl ProviderConfig
{   /// Default sampling parameters carried by this provider
    pub fn sampling(&self) -> Sampling
    {   Sampling
        {   temperature: self.temperature
          , top_p: self.top_p
          , presence_penalty: self.presence_penalty
          , frequency_penalty: self.frequency_penalty
          , max_tokens: self.max_tokens
        }
    }

    /// Both the flag and the wire shape must allow image blocks
    pub fn accepts_images(&self) -> bool
    {   self.supports_vision && self.kind.carries_images()
    }

    pub fn request_timeout(&self, modality: Modality) -> Duration
    {   let secs = self.timeout_secs.unwrap_or(match modality
        {   Modality::Text => DEFAULT_TEXT_TIMEOUT_SECS
          , Modality::Vision => DEFAULT_VISION_TIMEOUT_SECS
        });
        Duration::from_secs(secs)
    }
}

/// Resolved sampling parameters for one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling
{   pub temperature: f32
  , pub top_p: f32
  , pub presence_penalty: Option<f32>
  , pub frequency_penalty: Option<f32>
  , pub max_tokens: u32
}

impl Sampling
{   pub fn with_overrides(mut self, overrides: &SamplingOverrides) -> Self
    {   if let Some(t) = overrides.temperature
        {   self.temperature = t;
        }
        if let Some(p) = overrides.top_p
        {   self.top_p = p;
        }
        if let Some(m) = overrides.max_tokens
        {   self.max_tokens = m;
        }
        self
    }
}

/// Per-call sampling overrides supplied by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingOverrides
{   pub temperature: Option<f32>
  , pub top_p: Option<f32>
  , pub max_tokens: Option<u32>
}

/// Retry settings as they appear in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig
{   pub max_retries: usize
  , pub base_delay_ms: u64
  , pub max_delay_ms: u64
  , pub retryable_statuses: Vec<u16>
}

impl Default for RetryConfig
{   fn default() -> Self
    {   RetryConfig
        {   max_retries: 3
          , base_delay_ms: 1_000
          , max_delay_ms: 10_000
          , retryable_statuses: vec![429, 500, 502, 503, 504]
        }
    }
}

/// Whole configuration file: provider map plus the selected provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig
{   pub current_provider: String
  , pub providers: BTreeMap<String, ProviderConfig>
  , #[serde(default)]
    pub retry: RetryConfig
}

impl GeneratorConfig
{   pub fn from_json_str(json: &str) -> Result<Self>
    {   let mut config: GeneratorConfig = serde_json::from_str(json)
          .map_err(|e| Error::config(format!("invalid provider configuration: {}", e)))?;
        for (name, provider) in config.providers.iter_mut()
        {   if provider.name.is_empty()
            {   provider.name = name.clone();
            }
        }
        debug!(
          "Loaded {} providers, current: {}",
          config.providers.len(),
          config.current_provider
        );
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self>
    {   let path = path.as_ref();
        let json = std::fs::read_to_string(path)
          .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&json)?;
        info!("Loaded provider configuration from {}", path.display());
        Ok(config)
    }

    pub fn provider(&self, name: &str) -> Result<&ProviderConfig>
    {   self.providers.get(name)
          .ok_or_else(|| Error::config(format!("unknown provider: {}", name)))
    }

    /// The provider named by `current_provider`
    pub fn current(&self) -> Result<&ProviderConfig>
    {   self.provider(&self.current_provider)
    }
}

/// Source of provider credentials, looked up by variable name
pub trait CredentialSource
{   fn lookup(&self, var: &str) -> Option<String>;
}

/// Reads credentials from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials
{   fn lookup(&self, var: &str) -> Option<String>
    {   std::env::var(var).ok().filter(|v| !v.trim().is_empty())
    }
}

/// In-memory credentials, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials
{   keys: HashMap<String, String>
}

impl StaticCredentials
{   pub fn new() -> Self
    {   Self::default()
    }

    pub fn with(mut self, var: impl Into<String>, key: impl Into<String>) -> Self
    {   self.keys.insert(var.into(), key.into());
        self
    }
}

impl CredentialSource for StaticCredentials
{   fn lookup(&self, var: &str) -> Option<String>
    {   self.keys.get(var).filter(|v| !v.trim().is_empty()).cloned()
    }
}
