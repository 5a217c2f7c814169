//! Text-generation backend interface.
//!
//! The drafter only needs "prompt in, text out". Concrete backends implement
//! [`ModelClient`]; the trait is object-safe so the drafter can hold an
//! `Arc<dyn ModelClient>` and tests can substitute a scripted stub.
//!
//! ```text
//! TaskDrafter --generate(prompt, params)--> &dyn ModelClient
//!                                               |
//!                                               v
//!                                  Ok(raw text) | Err(ModelError)
//! ```

pub mod gemini;

use std::time::Duration;

use async_trait::async_trait;

pub use gemini::{GeminiClient, GeminiConfig};

/// Sampling settings for one model call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    /// Greedy decoding with the given output budget.
    pub fn deterministic(max_output_tokens: u32) -> Self {
        Self {
            temperature: 0.0,
            max_output_tokens,
        }
    }
}

/// Failures talking to the model backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Transport(String),

    #[error("model backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no generated text")]
    EmptyOutput,

    #[error("model response could not be read: {0}")]
    MalformedResponse(String),

    #[error("model did not answer within {0:?}")]
    Timeout(Duration),
}

impl ModelError {
    /// Backend-facing detail suitable for a diagnostic `raw` field.
    ///
    /// For status failures this is the response body the backend sent.
    pub fn detail(&self) -> String {
        match self {
            Self::Status { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

/// A text-generation backend.
///
/// Implementations perform exactly one backend call per invocation: no
/// retries, no caching. Every failure comes back as a [`ModelError`].
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short name for logs (e.g. "gemini").
    fn name(&self) -> &str;

    /// Send `prompt` and return the generated text.
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, ModelError>;
}

// Compile-time assertion: ModelClient must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ModelClient) {}
};
