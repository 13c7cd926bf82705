//! Structured intents and the wire schema of the language-understanding call.
//!
//! The external model returns `{intent, parameters, confidence}`. Everything
//! here is schema validation: a malformed response becomes an error the
//! classifier degrades to `Unknown`, never a panic.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use minder_core::{CheckInResult, parse_local_deadline_to_utc};

use crate::classify::UserContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusDomain {
    Tasks,
    Habits,
    Money,
    All,
}

impl StatusDomain {
    fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "tasks" | "task" => StatusDomain::Tasks,
            "habits" | "habit" => StatusDomain::Habits,
            "money" | "expenses" | "spending" => StatusDomain::Money,
            _ => StatusDomain::All,
        }
    }
}

/// What a user's message requests, as a closed set of variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    CreateTask {
        description: String,
        deadline: Option<DateTime<Utc>>,
    },
    CompleteTask {
        task_ref: String,
    },
    CancelTask {
        task_ref: String,
    },
    CreateHabit {
        name: String,
        frequency: String,
    },
    HabitCheckIn {
        habit_ref: String,
        result: CheckInResult,
    },
    LogExpense {
        amount: f64,
        category: String,
    },
    QueryStatus {
        domain: StatusDomain,
    },
    SetTimezone {
        timezone: String,
    },
    /// Fallback carrying the original text so the router can ask the user to
    /// rephrase.
    Unknown {
        raw_text: String,
    },
}

/// Raw response shape from the language-understanding call.
#[derive(Debug, Clone, Deserialize)]
pub struct WireResponse {
    pub intent: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub confidence: f64,
}

fn str_param(params: &Value, key: &str) -> Result<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .with_context(|| format!("missing parameter '{key}'"))
}

fn opt_str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Intent {
    /// Validate a wire response into an `Intent`. Deadlines arrive as local
    /// ISO 8601 strings and are interpreted in the user's timezone (UTC when
    /// unset).
    pub fn from_wire(wire: &WireResponse, ctx: &UserContext) -> Result<Intent> {
        let params = &wire.parameters;
        match wire.intent.trim() {
            "create_task" => {
                let description = str_param(params, "description")?;
                let deadline = match opt_str_param(params, "deadline") {
                    Some(s) => Some(
                        parse_local_deadline_to_utc(&s, ctx.timezone.unwrap_or(chrono_tz::UTC))
                            .context("bad deadline")?,
                    ),
                    None => None,
                };
                Ok(Intent::CreateTask { description, deadline })
            }
            "complete_task" => Ok(Intent::CompleteTask {
                task_ref: str_param(params, "task")?,
            }),
            "cancel_task" => Ok(Intent::CancelTask {
                task_ref: str_param(params, "task")?,
            }),
            "create_habit" => Ok(Intent::CreateHabit {
                name: str_param(params, "name")?,
                frequency: opt_str_param(params, "frequency").unwrap_or_else(|| "daily".to_string()),
            }),
            "habit_check_in" => {
                let result = match opt_str_param(params, "result").as_deref() {
                    None | Some("done") => CheckInResult::Done,
                    Some("skipped") => CheckInResult::Skipped,
                    Some(other) => bail!("unknown check-in result '{other}'"),
                };
                Ok(Intent::HabitCheckIn {
                    habit_ref: str_param(params, "habit")?,
                    result,
                })
            }
            "log_expense" => {
                let amount = params
                    .get("amount")
                    .and_then(Value::as_f64)
                    .context("missing parameter 'amount'")?;
                Ok(Intent::LogExpense {
                    amount,
                    category: opt_str_param(params, "category").unwrap_or_else(|| "other".to_string()),
                })
            }
            "query_status" => Ok(Intent::QueryStatus {
                domain: opt_str_param(params, "domain")
                    .map(|s| StatusDomain::parse(&s))
                    .unwrap_or(StatusDomain::All),
            }),
            "set_timezone" => Ok(Intent::SetTimezone {
                timezone: str_param(params, "timezone")?,
            }),
            "unknown" => Ok(Intent::Unknown {
                raw_text: ctx.raw_text.clone(),
            }),
            other => bail!("unrecognized intent kind '{other}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ctx() -> UserContext {
        UserContext {
            user_id: 7,
            timezone: Some(chrono_tz::America::Chicago),
            habit_names: vec!["run".to_string()],
            now: Utc.with_ymd_and_hms(2026, 3, 11, 12, 0, 0).unwrap(),
            raw_text: "remind me to pay rent tomorrow at 6pm".to_string(),
        }
    }

    fn wire(intent: &str, parameters: Value) -> WireResponse {
        WireResponse {
            intent: intent.to_string(),
            parameters,
            confidence: 0.95,
        }
    }

    #[test]
    fn create_task_parses_local_deadline_into_utc() {
        let w = wire(
            "create_task",
            json!({"description": "pay rent", "deadline": "2026-03-12T18:00:00"}),
        );
        let intent = Intent::from_wire(&w, &ctx()).unwrap();
        match intent {
            Intent::CreateTask { description, deadline } => {
                assert_eq!(description, "pay rent");
                // 18:00 CDT == 23:00 UTC.
                assert_eq!(deadline.unwrap().to_rfc3339(), "2026-03-12T23:00:00+00:00");
            }
            other => panic!("unexpected intent {other:?}"),
        }
    }

    #[test]
    fn create_task_without_deadline_is_valid() {
        let w = wire("create_task", json!({"description": "call mom"}));
        assert!(matches!(
            Intent::from_wire(&w, &ctx()).unwrap(),
            Intent::CreateTask { deadline: None, .. }
        ));
    }

    #[test]
    fn missing_required_parameter_fails_validation() {
        let w = wire("create_task", json!({}));
        assert!(Intent::from_wire(&w, &ctx()).is_err());

        let w = wire("log_expense", json!({"category": "food"}));
        assert!(Intent::from_wire(&w, &ctx()).is_err());
    }

    #[test]
    fn unrecognized_kind_fails_validation() {
        let w = wire("order_pizza", json!({}));
        assert!(Intent::from_wire(&w, &ctx()).is_err());
    }

    #[test]
    fn cancel_task_carries_reference() {
        let w = wire("cancel_task", json!({"task": "pay rent"}));
        match Intent::from_wire(&w, &ctx()).unwrap() {
            Intent::CancelTask { task_ref } => assert_eq!(task_ref, "pay rent"),
            other => panic!("unexpected intent {other:?}"),
        }

        let w = wire("cancel_task", json!({}));
        assert!(Intent::from_wire(&w, &ctx()).is_err());
    }

    #[test]
    fn check_in_defaults_to_done() {
        let w = wire("habit_check_in", json!({"habit": "run"}));
        assert!(matches!(
            Intent::from_wire(&w, &ctx()).unwrap(),
            Intent::HabitCheckIn { result: CheckInResult::Done, .. }
        ));
    }

    #[test]
    fn status_domain_defaults_to_all() {
        let w = wire("query_status", json!({}));
        assert!(matches!(
            Intent::from_wire(&w, &ctx()).unwrap(),
            Intent::QueryStatus { domain: StatusDomain::All }
        ));
        let w = wire("query_status", json!({"domain": "spending"}));
        assert!(matches!(
            Intent::from_wire(&w, &ctx()).unwrap(),
            Intent::QueryStatus { domain: StatusDomain::Money }
        ));
    }

    #[test]
    fn unknown_carries_original_text() {
        let w = wire("unknown", json!({}));
        match Intent::from_wire(&w, &ctx()).unwrap() {
            Intent::Unknown { raw_text } => {
                assert_eq!(raw_text, "remind me to pay rent tomorrow at 6pm")
            }
            other => panic!("unexpected intent {other:?}"),
        }
    }
}
