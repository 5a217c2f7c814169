//! The task draft record handed back to callers.
//!
//! A [`TaskDraft`] can only be built through [`TaskDraft::new`], which
//! enforces every field constraint. The decoder in [`crate::decode`] funnels
//! model output through that constructor, so a draft that exists is a draft
//! that is valid.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum title length, in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Maximum description length, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Priority of a drafted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = PriorityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(PriorityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Priority`] string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid priority {0:?} (expected low, medium, or high)")]
pub struct PriorityParseError(pub String);

// ---------------------------------------------------------------------------
// TaskDraft
// ---------------------------------------------------------------------------

/// Constraint violations raised by [`TaskDraft::new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftFieldError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("title is {len} characters (max {MAX_TITLE_CHARS})")]
    TitleTooLong { len: usize },

    #[error("description is {len} characters (max {MAX_DESCRIPTION_CHARS})")]
    DescriptionTooLong { len: usize },
}

impl DraftFieldError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyTitle | Self::TitleTooLong { .. } => "title",
            Self::DescriptionTooLong { .. } => "description",
        }
    }
}

/// One validated, actionable task produced from a prompt.
///
/// Serializes to `{"title", "description", "priority", "due_date"}` with
/// `due_date` as an RFC 3339 UTC timestamp or `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDraft {
    title: String,
    description: String,
    priority: Priority,
    due_date: Option<DateTime<Utc>>,
}

impl TaskDraft {
    /// Build a draft, rejecting values that break the field constraints.
    ///
    /// The title is trimmed before checking; it must be non-empty and at
    /// most [`MAX_TITLE_CHARS`] characters. The description may be empty
    /// but not longer than [`MAX_DESCRIPTION_CHARS`] characters.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Self, DraftFieldError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(DraftFieldError::EmptyTitle);
        }
        let title_len = title.chars().count();
        if title_len > MAX_TITLE_CHARS {
            return Err(DraftFieldError::TitleTooLong { len: title_len });
        }

        let description = description.into().trim().to_owned();
        let description_len = description.chars().count();
        if description_len > MAX_DESCRIPTION_CHARS {
            return Err(DraftFieldError::DescriptionTooLong {
                len: description_len,
            });
        }

        Ok(Self {
            title,
            description,
            priority,
            due_date,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }
}
