//! Prompt-to-task normalization.
//!
//! Free text goes in, validated [`TaskDraft`]s come out:
//!
//! ```text
//! user text --compile_prompt--> prompt --ModelClient--> raw text
//!     --sanitize--> cleaned text --decode--> TaskDraft / Vec<TaskDraft>
//! ```
//!
//! [`TaskDrafter`] wires the stages together and exposes the two entry
//! points, [`TaskDrafter::generate_single_task`] and
//! [`TaskDrafter::decompose_goal`].

pub mod clock;
pub mod decode;
pub mod dispatch;
pub mod draft;
pub mod model;
pub mod prompt;
pub mod sanitize;
pub mod session;

pub use clock::{Clock, FixedClock, SystemClock};
pub use decode::{OutputError, decode_many, decode_single};
pub use dispatch::{DraftError, InvalidRequest, Stage, TaskDrafter};
pub use draft::{Priority, TaskDraft};
pub use model::{GeminiClient, GeminiConfig, GenerationParams, ModelClient, ModelError};
pub use prompt::{MAX_DECOMPOSE_ITEMS, MAX_DECOMPOSE_PROMPT_CHARS, Mode, compile_prompt};
pub use sanitize::sanitize;
