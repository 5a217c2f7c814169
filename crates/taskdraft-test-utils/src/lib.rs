//! Shared test utilities for taskdraft integration tests.
//!
//! Provides a scripted [`ModelClient`] that records every call, fixed
//! clocks, and canned model payloads. Nothing here touches the network.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use taskdraft_core::{FixedClock, GenerationParams, ModelClient, ModelError, TaskDrafter};

/// One recorded invocation of [`ScriptedModel::generate`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub params: GenerationParams,
}

/// A model stub that answers every call with the same scripted result.
pub struct ScriptedModel {
    reply: Result<String, ModelError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    /// Always return `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with `err`.
    pub fn failing(err: ModelError) -> Self {
        Self {
            reply: Err(err),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Prompt of the most recent call, if any.
    pub fn last_prompt(&self) -> Option<String> {
        self.calls.lock().unwrap().last().map(|c| c.prompt.clone())
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, ModelError> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            params,
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}

/// Build a UTC instant, panicking on an invalid date.
pub fn utc(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
        .single()
        .expect("valid test timestamp")
}

/// Monday 2024-03-04T00:00:00Z.
pub fn monday_reference() -> DateTime<Utc> {
    utc(2024, 3, 4, 0, 0, 0)
}

/// A drafter over `model` whose clock is frozen at `reference`.
pub fn drafter_at(model: Arc<ScriptedModel>, reference: DateTime<Utc>) -> TaskDrafter {
    TaskDrafter::new(model).with_clock(Arc::new(FixedClock(reference)))
}

/// The model payload for "finish tax return by friday, it's urgent".
pub fn tax_return_json() -> String {
    serde_json::json!({
        "title": "Finish tax return",
        "description": "Complete and file the tax return before the deadline.",
        "priority": "high",
        "due_date": "2024-03-08T23:59:59Z",
    })
    .to_string()
}

/// A three-step decomposition of "plan a weekend trip to the coast".
pub fn trip_plan_json() -> String {
    serde_json::json!([
        {
            "title": "Book accommodation near the coast",
            "description": "Compare a few places and reserve two nights for the weekend.",
            "priority": "high",
            "due_date": "2024-03-06T23:59:59Z",
        },
        {
            "title": "Plan the driving route",
            "description": "Check travel time and pick stops along the way.",
            "priority": "medium",
            "due_date": null,
        },
        {
            "title": "Pack beach gear",
            "description": "Gather towels, sunscreen and swimwear the night before.",
            "priority": "low",
            "due_date": "2024-03-08T23:59:59Z",
        },
    ])
    .to_string()
}
