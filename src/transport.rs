//! reqwest-backed transport

use std::future::Future;

use log::{error, trace};

use crate::error::{Error, Result, TransportError};
use crate::request::{RawResponse, RequestPayload};
use crate::retry::Transport;

/// HTTP transport over a shared `reqwest::Client`.
/// The per-request timeout comes from each payload.
#[derive(Debug, Clone)]
pub struct HttpTransport
{   http_client: reqwest::Client
}

impl HttpTransport
{   pub fn new() -> Result<Self>
    {   let http_client = reqwest::Client::builder()
          .build()
          .map_err(|e| {
            error!("Cannot build HTTP client: {}", e);
            Error::config(format!("cannot build HTTP client: {}", e))
          })?;
        Ok(HttpTransport { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self
    {   HttpTransport { http_client }
    }
}

fn classify(e: reqwest::Error) -> TransportError
{   if e.is_timeout()
    {   TransportError::Timeout
    } else if e.is_connect()
    {   TransportError::Connect(e.to_string())
    } else
    {   TransportError::Other(e.to_string())
    }
}

impl Transport for HttpTransport
{   fn send(&self, payload: &RequestPayload)
      -> impl Future<Output = std::result::Result<RawResponse, TransportError>> + Send
    {   let mut request = self.http_client
          .request(payload.method.clone(), payload.url.as_str())
          .timeout(payload.timeout);
        for (name, value) in &payload.headers
        {   request = request.header(name.as_str(), value.as_str());
        }
        if !payload.body.is_empty()
        {   request = request.body(payload.body.clone());
        }

        async move
        {   let response = request.send().await.map_err(classify)?;
            let status = response.status().as_u16();
            trace!("Response status: {}", status);
            let body = response.text().await.map_err(classify)?;
            Ok(RawResponse { status, body })
        }
    }
}
