//! Prompt assembly for artefact requests

use serde::{Deserialize, Serialize};

use crate::{Modality, ProviderKind};

/// Used when the caller configures no closing instruction
pub const DEFAULT_CLOSING_INSTRUCTION: &str = "The artefact should reflect the context \
  and show how the architecture serves as a catalyst for change.";

/// Inputs longer than this get the tighter completion budget
const COMPLEX_INPUT_CHARS: usize = 1000;
const COMPLEX_BUDGET: u32 = 1400;
const SIMPLE_BUDGET: u32 = 1600;

const ROLE: &str = "You are a dramaturgical expert that creates diegetic artefacts \
  for architectural projects.";

/// Text fields describing the project an artefact is generated for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext
{   pub description: String
  , pub location: String
  , pub date: String
  , pub user_bios: String
  , pub themes: String
  , /// Artefact category, e.g. "Newspaper article"
    pub category: String
  , #[serde(default)]
    pub closing_instruction: Option<String>
}

impl ProjectContext
{   fn closing(&self) -> &str
    {   self.closing_instruction.as_deref()
          .filter(|s| !s.trim().is_empty())
          .unwrap_or(DEFAULT_CLOSING_INSTRUCTION)
    }
}

/// System and user text for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptText
{   pub system: String
  , pub user: String
}

/// Completion budget for chat-completion providers: complex projects
/// get a shorter answer so the artefact is not cut off.
pub fn completion_budget(ctx: &ProjectContext) -> u32
{   let input = ctx.description.chars().count()
      + ctx.user_bios.chars().count()
      + ctx.themes.chars().count();
    if input > COMPLEX_INPUT_CHARS { COMPLEX_BUDGET } else { SIMPLE_BUDGET }
}

/// Length hint appended to text prompts, at 90% of the token limit
pub fn token_guidance(max_tokens: u32) -> String
{   let safe = u64::from(max_tokens) * 9 / 10;
    format!(
      "\n\nYour response should be complete and no longer than approximately {} tokens.",
      safe
    )
}

pub fn system_prompt(kind: ProviderKind, modality: Modality) -> String
{   match (kind, modality)
    {   (_, Modality::Vision) => format!(
          "{ROLE}\n\n\
           You have been provided with visual materials (sketches, diagrams, photographs, \
           or reference images) along with text descriptions.\n\n\
           IMPORTANT: First, carefully analyze the provided images:\n\
           1. Spatial organization, layout, and relationships\n\
           2. Annotations, labels, or handwritten notes\n\
           3. Material indications and aesthetic qualities\n\
           4. Scale, proportion, and atmospheric intentions\n\
           5. Site context and environmental factors\n\
           6. Any diagrams or visual information systems\n\n\
           Then share your visual analysis within <think> tags before creating the final artefact."
        )
      , (ProviderKind::CloudText, Modality::Text) => format!(
          "{ROLE}\n\n\
           IMPORTANT: Structure your response in exactly two parts:\n\
           1. First, a thinking section wrapped in <think> tags that explains your reasoning\n\
           2. Then, the final artefact output after a clear closing </think> tag"
        )
      , (_, Modality::Text) => format!(
          "{ROLE}\n\n\
           IMPORTANT: In your response, first share your reasoning process within <think> tags. \
           Then provide your final output after the thinking section. The <think> section \
           won't be visible to the end user unless they choose to see it."
        )
    }
}

/// Full instruction prompt for a text-only request
pub fn artefact_prompt(ctx: &ProjectContext, max_tokens: u32) -> String
{   let category = &ctx.category;
    format!(
      "Your task is to imagine and create a specific diegetic artefact within the category \
       of '{category}' that exists within the narrative world of this project.\n\
       First, decide on an appropriate specific artefact type within this category that would \
       be meaningful for this project.\n\n\
       {info}\n\n\
       Instructions:\n\
       1. Begin by briefly explaining (100-150 words) your choice of specific artefact within \
       the {category} category.\n\
       2. Add a brief summary (2-3 sentences) explaining how this artefact relates to the \
       project's themes and context.\n\
       3. Pose 2-3 thought-provoking questions for the user to consider about the relationship \
       between this artefact and the architecture project.\n\
       4. Finally, create the diegetic artefact itself (500-750 words) in the appropriate format \
       and style using markdown syntax. {closing}\n\n\
       Markdown Formatting Guidelines:\n\
       - Use proper heading hierarchy (# for main title, ## for sections, ### for subsections)\n\
       - Use proper list formatting (- for unordered lists, 1. for ordered lists)\n\
       - Use horizontal rules (---) to separate major sections\n\n\
       IMPORTANT: Your entire response must fit within {max_tokens} tokens. \
       Structure your response so the artefact is complete and concludes with a proper ending.",
      info = project_information(ctx),
      closing = ctx.closing(),
    )
}

/// Text block that follows the image blocks in a vision request
pub fn vision_prompt(ctx: &ProjectContext, image_count: usize) -> String
{   let category = &ctx.category;
    format!(
      "Please analyze the {image_count} image(s) I've shared above, then use that visual \
       context along with this project description to create a diegetic artefact:\n\n\
       {info}\n\
       Artefact Category: {category}\n\n\
       Instructions:\n\
       1. Analyze the visual materials: what spatial, material, and contextual information \
       do they convey?\n\
       2. Explain (100-150 words) your choice of specific artefact within the {category} \
       category, informed by both visuals and text.\n\
       3. Summarize (2-3 sentences) how this artefact relates to the project's themes and \
       visual context.\n\
       4. Pose 2-3 thought-provoking questions about the relationship between this artefact \
       and the architecture project.\n\
       5. Create the diegetic artefact itself (500-750 words) using markdown. Reference \
       specific elements from the visual materials. {closing}\n\n\
       Remember to first explain your interpretation of the visual materials in <think> tags.",
      info = project_information(ctx),
      closing = ctx.closing(),
    )
}

/// Assemble system and user text for the given provider and modality
pub fn compose(
  ctx: &ProjectContext
, kind: ProviderKind
, modality: Modality
, max_tokens: u32
, image_count: usize
) -> PromptText
{   let user = match modality
    {   Modality::Vision => vision_prompt(ctx, image_count)
      , Modality::Text => {
          let mut user = artefact_prompt(ctx, max_tokens);
          user.push_str(&token_guidance(max_tokens));
          user.push_str(match kind
          {   ProviderKind::CloudText =>
                "\n\nIMPORTANT: Begin with your reasoning in <think> tags, then close the tag \
                 with </think> before providing the final artefact."
            , _ =>
                "\n\nFirst explain your reasoning within <think> tags before creating the \
                 final artefact."
          });
          user
        }
    };
    PromptText
    {   system: system_prompt(kind, modality)
      , user
    }
}

fn project_information(ctx: &ProjectContext) -> String
{   format!(
      "Project Information:\n\
       Description: {}\n\
       Location: {}\n\
       Date/Timeframe: {}\n\
       User Personas: {}\n\
       Key Themes: {}",
      ctx.description, ctx.location, ctx.date, ctx.user_bios, ctx.themes
    )
}
