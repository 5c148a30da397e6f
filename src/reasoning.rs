//! Splits `<think>...</think>` segments out of generated text

/// Marker that opens a reasoning segment
pub const OPEN_MARKER: &str = "<think>";
/// Marker that closes a reasoning segment
pub const CLOSE_MARKER: &str = "</think>";

/// Generated text with its reasoning segments removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningSplit
{   pub primary: String
  , pub reasoning: Option<String>
  , /// False when an open marker had no matching close marker
    pub terminated: bool
}

/// Separate reasoning segments from the primary output.
///
/// Every closed segment is removed from the primary text; several segments
/// are joined with a blank line. An open marker without a close marker
/// turns the whole remainder into reasoning. Text without an open marker
/// is returned untouched.
pub fn split_reasoning(text: &str) -> ReasoningSplit
{   if !text.contains(OPEN_MARKER)
    {   return ReasoningSplit
        {   primary: text.to_string()
          , reasoning: None
          , terminated: true
        };
    }

    let mut primary = String::new();
    let mut segments: Vec<&str> = Vec::new();
    let mut terminated = true;
    let mut rest = text;

    while let Some(open) = rest.find(OPEN_MARKER)
    {   primary.push_str(&rest[..open]);
        let inner = &rest[open + OPEN_MARKER.len()..];
        match inner.find(CLOSE_MARKER)
        {   Some(close) => {
              segments.push(inner[..close].trim());
              rest = &inner[close + CLOSE_MARKER.len()..];
            }
          , None => {
              segments.push(inner.trim());
              rest = "";
              terminated = false;
            }
        }
    }
    primary.push_str(rest);

    let segments: Vec<&str> = segments.into_iter().filter(|s| !s.is_empty()).collect();
    ReasoningSplit
    {   primary: primary.trim().to_string()
      , reasoning: if segments.is_empty() { None } else { Some(segments.join("\n\n")) }
      , terminated
    }
}
