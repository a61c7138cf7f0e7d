//! Text-generation layer
//!
//! This module provides:
//! - The TextGenerator port and the deadline wrapper every caller goes through
//! - Output contracts and lenient parsers for structured replies
//! - AnthropicGenerator, the HTTP implementation
//! - Scripted and closure-driven fakes for tests

pub mod anthropic;
pub mod client;
pub mod contract;
pub mod mock;
pub mod tool_parser;
pub mod types;

pub use anthropic::{AnthropicConfig, AnthropicGenerator};
pub use client::{GenerationRequest, LlmError, TextGenerator, generate_within};
pub use contract::{OutputContract, extract_json, parse_goal, parse_goal_achieved, structured};
pub use mock::{FnGenerator, ScriptedGenerator};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, ToolCall, ToolDefinition, Usage};
