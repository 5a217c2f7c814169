//! The two drafting entry points and the per-request pipeline behind them.
//!
//! Every request walks the same stages:
//!
//! ```text
//! received -> compiling -> awaiting_model -> sanitizing -> validating
//!                                                              |
//!                                            succeeded <-------+-------> failed
//! ```
//!
//! Nothing is shared between requests except the immutable client, clock,
//! and timeout, so a [`TaskDrafter`] can be cloned freely across tasks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::decode::{self, OutputError};
use crate::draft::TaskDraft;
use crate::model::{GenerationParams, ModelClient, ModelError};
use crate::prompt::{MAX_DECOMPOSE_PROMPT_CHARS, Mode, compile_prompt};
use crate::sanitize::sanitize;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Caller input rejected before any model call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("prompt is required")]
    PromptMissing,

    #[error("prompt too long ({len} characters, max {max})")]
    PromptTooLong { len: usize, max: usize },
}

/// Every way a drafting operation can fail.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),

    #[error(transparent)]
    ModelUnavailable(#[from] ModelError),

    #[error(transparent)]
    InvalidModelOutput(#[from] OutputError),
}

impl DraftError {
    /// Stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::InvalidModelOutput(_) => "invalid_model_output",
        }
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Position of a request in the drafting pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Compiling,
    AwaitingModel,
    Sanitizing,
    Validating,
    Succeeded,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Compiling => "compiling",
            Self::AwaitingModel => "awaiting_model",
            Self::Sanitizing => "sanitizing",
            Self::Validating => "validating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tracks and logs the stage of one request.
struct RequestTrace {
    id: Uuid,
    mode: Mode,
    stage: Stage,
}

impl RequestTrace {
    fn start(mode: Mode, prompt_chars: usize) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(request_id = %id, %mode, prompt_chars, stage = %Stage::Received, "draft request received");
        Self {
            id,
            mode,
            stage: Stage::Received,
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        tracing::debug!(request_id = %self.id, mode = %self.mode, stage = %stage, "draft stage");
    }

    fn finish<T>(mut self, result: &Result<T, DraftError>, drafts: impl Fn(&T) -> usize) {
        match result {
            Ok(value) => {
                self.stage = Stage::Succeeded;
                tracing::info!(
                    request_id = %self.id,
                    mode = %self.mode,
                    stage = %self.stage,
                    drafts = drafts(value),
                    "draft request succeeded"
                );
            }
            Err(e) => {
                let failed_at = self.stage;
                self.stage = Stage::Failed;
                tracing::warn!(
                    request_id = %self.id,
                    mode = %self.mode,
                    stage = %self.stage,
                    failed_at = %failed_at,
                    kind = e.kind(),
                    error = %e,
                    "draft request failed"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Drafter
// ---------------------------------------------------------------------------

/// Entry point for turning free text into validated [`TaskDraft`]s.
///
/// Holds no per-request state. The model call is bounded by `timeout`; an
/// expired call is dropped and reported as [`ModelError::Timeout`]. The
/// drafter never retries.
#[derive(Clone)]
pub struct TaskDrafter {
    model: Arc<dyn ModelClient>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl TaskDrafter {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Drafter using the system clock and [`Self::DEFAULT_TIMEOUT`].
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            clock: Arc::new(SystemClock),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Replace the source of the reference instant.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the model-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Turn one request into exactly one task.
    pub async fn generate_single_task(&self, user_text: &str) -> Result<TaskDraft, DraftError> {
        let mut trace = RequestTrace::start(Mode::Single, user_text.chars().count());
        let result = self
            .run(&mut trace, user_text, decode::decode_single)
            .await;
        trace.finish(&result, |_| 1);
        result
    }

    /// Split one goal into 1 to 5 tasks.
    ///
    /// Prompts longer than [`MAX_DECOMPOSE_PROMPT_CHARS`] characters are
    /// rejected without calling the model.
    pub async fn decompose_goal(&self, user_text: &str) -> Result<Vec<TaskDraft>, DraftError> {
        let mut trace = RequestTrace::start(Mode::Decompose, user_text.chars().count());
        let result = self.run(&mut trace, user_text, decode::decode_many).await;
        trace.finish(&result, Vec::len);
        result
    }

    async fn run<T>(
        &self,
        trace: &mut RequestTrace,
        user_text: &str,
        decode: fn(&str) -> Result<T, OutputError>,
    ) -> Result<T, DraftError> {
        let mode = trace.mode;
        check_request(user_text, mode)?;

        trace.enter(Stage::Compiling);
        let prompt = compile_prompt(user_text, self.clock.now(), mode);

        trace.enter(Stage::AwaitingModel);
        let params = GenerationParams::deterministic(mode.max_output_tokens());
        let raw = match tokio::time::timeout(self.timeout, self.model.generate(&prompt, params))
            .await
        {
            Ok(result) => result?,
            Err(_elapsed) => return Err(ModelError::Timeout(self.timeout).into()),
        };

        trace.enter(Stage::Sanitizing);
        let cleaned = sanitize(&raw);

        trace.enter(Stage::Validating);
        Ok(decode(&cleaned)?)
    }
}

/// Reject input that should never reach the model.
fn check_request(user_text: &str, mode: Mode) -> Result<(), InvalidRequest> {
    if user_text.trim().is_empty() {
        return Err(InvalidRequest::PromptMissing);
    }
    if mode == Mode::Decompose {
        let len = user_text.chars().count();
        if len > MAX_DECOMPOSE_PROMPT_CHARS {
            return Err(InvalidRequest::PromptTooLong {
                len,
                max: MAX_DECOMPOSE_PROMPT_CHARS,
            });
        }
    }
    Ok(())
}
