use anyhow::Result;
use serde::Serialize;

use taskdraft_core::{DraftError, TaskDrafter};

/// Execute `taskdraft draft`: one prompt in, one task out.
pub async fn run_draft(drafter: &TaskDrafter, prompt: &str) -> Result<()> {
    let draft = drafter
        .generate_single_task(prompt)
        .await
        .map_err(describe_failure)?;
    print_json(&draft)
}

/// Execute `taskdraft breakdown`: one goal in, up to five tasks out.
pub async fn run_breakdown(drafter: &TaskDrafter, prompt: &str) -> Result<()> {
    let drafts = drafter
        .decompose_goal(prompt)
        .await
        .map_err(describe_failure)?;
    print_json(&drafts)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Attach the offending model payload to output failures so the operator
/// can see what came back.
fn describe_failure(err: DraftError) -> anyhow::Error {
    match &err {
        DraftError::InvalidModelOutput(output) => {
            let raw = output.raw();
            anyhow::Error::new(err).context(format!("model output rejected; raw: {raw}"))
        }
        _ => anyhow::Error::new(err),
    }
}
