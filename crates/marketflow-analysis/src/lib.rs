//! # Marketflow Analysis
//!
//! Orchestrates one analysis run end to end: relevance gate, LLM workflow
//! synthesis (with the method catalog metadata embedded in the prompt),
//! interpretation with a wall-clock cap, and final answer rendering from
//! the recorded outputs.

pub mod engine;
pub mod llm;
pub mod prompts;

pub use engine::{AnalysisEngine, AnalysisEngineConfig, AnalysisError, AnalysisOutcome};
pub use llm::{
    extract_json, HttpLlmClient, HttpLlmClientConfig, LlmClient, LlmError, LlmRequest,
    MockLlmClient,
};
pub use prompts::OFF_TOPIC_REPLY;
