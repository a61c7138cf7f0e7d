//! Prompt System - versioned templates rendered with Handlebars

mod render;
mod templates;

pub use render::PromptRenderer;
pub use templates::{ActionListing, DEFAULT_PROMPT_VERSION, PromptSet, Prompts, WorkerContext};
