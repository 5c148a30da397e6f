//! artefact-gen: the outbound request layer of the diegetic artefact
//! generator.
//!
//! One awaited call turns a project description and up to five images
//! into a provider-specific HTTP request, sends it with a bounded retry
//! policy, and normalises the reply.
//!
//! ```text
//! images ──► images::prepare_batch ──┐
//! context ─► prompt::compose ────────┼─► request::build ─► RetryExecutor ─► response::extract
//! ProviderConfig / Sampling ─────────┘        (network boundary)
//! ```
//!
//! The library holds no process-wide state: [`config::ProviderConfig`]
//! and [`retry::RetryPolicy`] are passed in on every call.

pub mod error;
pub mod config;
pub mod images;
pub mod prompt;
pub mod providers;
pub mod request;
pub mod retry;
pub mod transport;
pub mod reasoning;
pub mod response;
pub mod client;

use serde::{Deserialize, Serialize};

pub use client::{GenerationRequest, Generator};
pub use config::{GeneratorConfig, ProviderConfig, SamplingOverrides};
pub use error::{Error, Failure, Result, TransportError};
pub use images::{ImageAsset, ImageInput, ImageLimits};
pub use prompt::ProjectContext;
pub use request::{RawResponse, RequestPayload};
pub use response::GenerationResult;
pub use retry::{RetryExecutor, RetryPolicy, Transport};
pub use transport::HttpTransport;

/// Wire family of a configured provider.
/// Each variant owns its payload shape and response shape
/// (see [`providers::WireFormat`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind
{   /// Cloud service taking content-block messages with images
    /// (Anthropic Messages API)
    CloudVision
  , /// Cloud chat-completion service, text only
    /// (OpenAI, Perplexity and compatible)
    CloudText
  , /// Local model server without authentication (Ollama)
    Local
}

impl ProviderKind
{   /// Whether the wire shape can carry image blocks at all
    pub fn carries_images(self) -> bool
    {   matches!(self, ProviderKind::CloudVision)
    }

    /// Whether requests must carry a credential header
    pub fn requires_credential(self) -> bool
    {   !matches!(self, ProviderKind::Local)
    }
}

/// Whether a request includes image content blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality
{   Text
  , Vision
}

impl Modality
{   pub fn for_image_count(count: usize) -> Self
    {   if count == 0 { Modality::Text } else { Modality::Vision }
    }
}

/// Install `env_logger` with an `info` default, overridable through
/// `RUST_LOG`. Calling it more than once is harmless.
pub fn init_logging()
{   let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
      )
      .try_init();
}
