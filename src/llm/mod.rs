//! LLM integration.
//!
//! The proofreading tool can ask an OpenAI-compatible endpoint for a second
//! opinion and for document outlines. The provider is optional: without
//! `LITELLM_API_BASE` the rule engine runs alone.
//!
//! ```ignore
//! use efficepart::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::from_env()?;
//! let request = GenerationRequest::new("", vec![Message::user("こんにちは")]);
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
};
