//! Chat-completion wire format (OpenAI, Perplexity and compatibles)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{refuse_images, to_body, Reply, WireFormat, WireRequest};
use crate::error::Result;

// ===== Message Types =====

#[derive(Debug, Serialize)]
struct ChatMessage<'a>
{   role: &'a str
  , content: &'a str
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a>
{   model: &'a str
  , messages: [ChatMessage<'a>; 2]
  , max_tokens: u32
  , temperature: f32
  , top_p: f32
  , #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>
}

#[derive(Debug, Deserialize)]
struct ChatResponse
{   choices: Vec<Choice>
}

#[derive(Debug, Deserialize)]
struct Choice
{   message: ResponseMessage
}

#[derive(Debug, Deserialize)]
struct ResponseMessage
{   content: Option<String>
  , #[serde(default)]
    reasoning_content: Option<String>
}

/// Text-only cloud wire format
#[derive(Debug, Clone, Copy)]
pub struct ChatCompletions;

impl WireFormat for ChatCompletions
{   fn build_body(&self, request: &WireRequest<'_>) -> Result<Vec<u8>>
    {   refuse_images(request, "chat-completion")?;
        let sampling = request.sampling;
        to_body(&ChatRequest
        {   model: request.model
          , messages: [
              ChatMessage { role: "system", content: &request.prompt.system }
            , ChatMessage { role: "user", content: &request.prompt.user }
            ]
          , max_tokens: sampling.max_tokens
          , temperature: sampling.temperature
          , top_p: sampling.top_p
          , presence_penalty: sampling.presence_penalty
          , frequency_penalty: sampling.frequency_penalty
        })
    }

    fn parse_reply(&self, body: &Value) -> std::result::Result<Reply, String>
    {   let response = ChatResponse::deserialize(body)
          .map_err(|e| format!("expected a choices array: {}", e))?;
        let message = response.choices.into_iter().next()
          .ok_or_else(|| "choices array is empty".to_string())?
          .message;
        let text = message.content
          .ok_or_else(|| "first choice has no message content".to_string())?;
        Ok(Reply
        {   text
          , thinking: message.reasoning_content.filter(|r| !r.trim().is_empty())
        })
    }
}
