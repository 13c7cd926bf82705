//! Prompt construction for the extraction call.

use crate::classify::UserContext;

/// System prompt: ask for one strict JSON object, nothing else.
pub const EXTRACTION_SYSTEM: &str = r#"You are an intent extractor for a personal assistant covering tasks, habits, and money tracking.
Given one user message, respond with a single JSON object and no other text:

{"intent": "<kind>", "parameters": {...}, "confidence": <0.0-1.0>}

Kinds and their parameters:
- create_task: {"description": string, "deadline": "YYYY-MM-DDTHH:MM:SS" (optional, local time)}
- complete_task: {"task": string}  -- user says they finished or handled a task
- cancel_task: {"task": string}  -- user wants to cancel or remove a task
- create_habit: {"name": string, "frequency": "daily" | "weekly" | "N per week"}
- habit_check_in: {"habit": string, "result": "done" | "skipped"}  -- "I ran today", "skipped meditation"
- log_expense: {"amount": number, "category": "food" | "transport" | "entertainment" | "shopping" | "bills" | "other"}
- query_status: {"domain": "tasks" | "habits" | "money" | "all"}
- set_timezone: {"timezone": "<IANA name or alias like IST>"}
- unknown: {}  -- use when the message fits nothing above

Resolve relative dates like "tomorrow 6pm" against the current local time given below.
Set confidence to how certain you are of the extraction."#;

pub fn extraction_context(ctx: &UserContext) -> String {
    let tz = ctx
        .timezone
        .map(|t| t.to_string())
        .unwrap_or_else(|| "UTC".to_string());
    let mut s = format!(
        "Current time: {} (timezone: {tz}).",
        ctx.now.with_timezone(&ctx.timezone.unwrap_or(chrono_tz::UTC)).format("%Y-%m-%dT%H:%M:%S")
    );
    if !ctx.habit_names.is_empty() {
        s.push_str(&format!(" The user's habits: {}.", ctx.habit_names.join(", ")));
    }
    s
}

/// Retry prompt after a low-confidence or malformed first attempt.
pub fn reworded(raw_text: &str) -> String {
    format!(
        "The previous extraction failed. Read the message again carefully and answer with ONLY the JSON object, \
no markdown fences, no commentary. Message: {raw_text:?}"
    )
}
