//! LLM integration - OpenRouter API
//!
//! This module provides:
//! - OpenRouter HTTP client for chat completions
//! - Request/response types matching the OpenAI-compatible API
//! - JSON-mode completions used by the extraction collaborators

mod client;
mod types;

pub use client::{JsonCompletion, LlmClient};
pub use types::{
    ChatRequest, ChatResponse, Choice, LlmResponse, Message, MessageRole, Usage,
    extract_json_object,
};
