//! Caller-facing entry point: one awaited call per generation

use log::{debug, info};

use crate::config::{CredentialSource, EnvCredentials, ProviderConfig, SamplingOverrides};
use crate::error::Result;
use crate::images::{self, ImageInput, ImageLimits};
use crate::prompt::{self, ProjectContext};
use crate::request;
use crate::response::{self, GenerationResult};
use crate::retry::{RetryExecutor, RetryPolicy, Transport};
use crate::transport::HttpTransport;
use crate::{Modality, ProviderKind};

/// Everything the caller supplies for one artefact
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest
{   pub context: ProjectContext
  , /// Zero to five uploaded images; any image makes the request a
    /// vision request
    pub images: Vec<ImageInput>
  , pub overrides: SamplingOverrides
}

impl GenerationRequest
{   pub fn new(context: ProjectContext) -> Self
    {   GenerationRequest
        {   context
          , ..Default::default()
        }
    }

    pub fn with_image(mut self, image: ImageInput) -> Self
    {   self.images.push(image);
        self
    }

    pub fn with_overrides(mut self, overrides: SamplingOverrides) -> Self
    {   self.overrides = overrides;
        self
    }

    pub fn modality(&self) -> Modality
    {   Modality::for_image_count(self.images.len())
    }
}

/// Runs the preprocess → build → send → extract pipeline.
/// Holds no per-call state; one generation is in flight at a time.
pub struct Generator<T, C = EnvCredentials>
{   transport: T
  , credentials: C
  , policy: RetryPolicy
}

impl Generator<HttpTransport, EnvCredentials>
{   /// reqwest transport with credentials from the environment
    pub fn from_env(policy: RetryPolicy) -> Result<Self>
    {   Ok(Generator::new(HttpTransport::new()?, EnvCredentials, policy))
    }
}

impl<T: Transport, C: CredentialSource> Generator<T, C>
{   pub fn new(transport: T, credentials: C, policy: RetryPolicy) -> Self
    {   debug!("Creating Generator with {} max retries", policy.max_retries);
        Generator
        {   transport
          , credentials
          , policy
        }
    }

    pub fn policy(&self) -> &RetryPolicy
    {   &self.policy
    }

    pub fn transport(&self) -> &T
    {   &self.transport
    }

    /// Generate one artefact with `provider`.
    ///
    /// Validation and configuration errors surface before any network
    /// call. Transient failures are retried per the policy and only
    /// surface as [`crate::Error::RetryExhausted`].
    pub async fn generate(
      &self
    , provider: &ProviderConfig
    , request: &GenerationRequest
    ) -> Result<GenerationResult>
    {   let modality = request.modality();
        info!("Using provider: {} ({:?}, {:?})", provider.name, provider.kind, modality);

        // Refuse before spending time on image decoding
        request::check_capability(provider, modality, request.images.len())?;

        let assets = images::prepare_batch(&request.images, &ImageLimits::for_provider(provider))?;
        if !assets.is_empty()
        {   info!(
              "Sending {} image(s), ~{} image tokens",
              assets.len(),
              images::estimate_batch_tokens(&assets)
            );
        }

        let mut sampling = provider.sampling().with_overrides(&request.overrides);
        if provider.kind == ProviderKind::CloudText
        {   sampling.max_tokens = sampling.max_tokens
              .min(prompt::completion_budget(&request.context));
        }

        let prompt = prompt::compose(
          &request.context,
          provider.kind,
          modality,
          sampling.max_tokens,
          assets.len()
        );
        let payload = request::build(
          provider,
          modality,
          &sampling,
          &prompt,
          &assets,
          &self.credentials
        )?;
        drop(assets);

        let raw = RetryExecutor::new(&self.transport, &self.policy)
          .execute(&payload)
          .await?;
        let result = response::extract(&raw, provider, sampling.max_tokens)?;
        info!(
          "Generated {} chars from {}{}",
          result.text.len(),
          provider.name,
          if result.reasoning.is_some() { " with reasoning" } else { "" }
        );
        Ok(result)
    }
}
