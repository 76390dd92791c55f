//! Reasoning layer abstraction
//!
//! The reasoning layer turns a composed conversation into an answer, calling
//! back into weather tools through a [`ToolExecutor`] as it sees fit.

pub mod gemini;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::Result;

pub use gemini::GeminiAgent;

/// Answer returned when the model runs out of turns
pub const FALLBACK_ANSWER: &str =
    "Sorry, I could not answer that question. Please try rephrasing it.";

/// A string argument a tool accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParameter {
    pub name: &'static str,
    pub description: &'static str,
}

/// Name, purpose and arguments of a tool offered to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ToolParameter>,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Problems with the invocation itself, reported back to the model
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

/// Executes the tools offered to the reasoning layer
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn catalog(&self) -> Vec<ToolDescriptor>;

    /// Run a tool and return its text output
    async fn execute(&self, call: &ToolCall) -> std::result::Result<String, ToolCallError>;
}

/// Produces a final answer for a composed input
#[async_trait]
pub trait ReasoningLayer: Send + Sync {
    async fn run(&self, input: &str, tools: &dyn ToolExecutor) -> Result<String>;
}
