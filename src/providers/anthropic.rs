//! Anthropic Messages API: content-block messages with base64 images

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{to_body, Reply, WireFormat, WireRequest};
use crate::error::Result;

// ===== Request Types =====

#[derive(Debug, Serialize)]
struct MessagesRequest<'a>
{   model: &'a str
  , max_tokens: u32
  , temperature: f32
  , system: &'a str
  , messages: [UserMessage<'a>; 1]
}

#[derive(Debug, Serialize)]
struct UserMessage<'a>
{   role: &'static str
  , content: Vec<ContentBlock<'a>>
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a>
{   Image { source: ImageSource<'a> }
  , Text { text: &'a str }
}

#[derive(Debug, Serialize)]
struct ImageSource<'a>
{   #[serde(rename = "type")]
    encoding: &'static str
  , media_type: &'a str
  , data: &'a str
}

// ===== Response Types =====

#[derive(Debug, Deserialize)]
struct MessagesResponse
{   content: Vec<ResponseBlock>
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock
{   Text { text: String }
  , Thinking { thinking: String }
  , #[serde(other)]
    Other
}

/// Vision-capable cloud wire format
#[derive(Debug, Clone, Copy)]
pub struct Messages;

impl WireFormat for Messages
{   fn build_body(&self, request: &WireRequest<'_>) -> Result<Vec<u8>>
    {   // Images first, then the single text block
        let mut content: Vec<ContentBlock<'_>> = request.images.iter()
          .map(|img| ContentBlock::Image
          {   source: ImageSource
              {   encoding: "base64"
                , media_type: img.media_type()
                , data: &img.base64
              }
          })
          .collect();
        content.push(ContentBlock::Text { text: &request.prompt.user });

        to_body(&MessagesRequest
        {   model: request.model
          , max_tokens: request.sampling.max_tokens
          , temperature: request.sampling.temperature
          , system: &request.prompt.system
          , messages: [UserMessage { role: "user", content }]
        })
    }

    fn parse_reply(&self, body: &Value) -> std::result::Result<Reply, String>
    {   let response = MessagesResponse::deserialize(body)
          .map_err(|e| format!("expected a content block list: {}", e))?;

        let mut text = String::new();
        let mut thinking: Vec<String> = Vec::new();
        let mut has_text = false;
        for block in response.content
        {   match block
            {   ResponseBlock::Text { text: t } => {
                  has_text = true;
                  text.push_str(&t);
                }
              , ResponseBlock::Thinking { thinking: t } => thinking.push(t)
              , ResponseBlock::Other => {}
            }
        }
        if !has_text
        {   return Err("content block list has no text block".to_string());
        }
        Ok(Reply
        {   text
          , thinking: if thinking.is_empty() { None } else { Some(thinking.join("\n\n")) }
        })
    }
}
