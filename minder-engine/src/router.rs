//! Command router: dispatch a classified intent to a domain operation and
//! report the outcome as acknowledgment data for the transport to render.
//!
//! Every domain error is converted here; nothing propagates to the chat
//! transport as an unhandled failure. Mutations are atomic per invocation:
//! validation happens fully before any write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use minder_core::{
    DomainError, Frequency, ReminderPolicy, ReminderScheduler, StatusSummary, UserStore,
    resolve_timezone,
};

use crate::intent::{Intent, StatusDomain};

/// One user's slice of the world: store plus reminder queue. The engine keeps
/// one of these per user behind a per-user lock.
#[derive(Debug)]
pub struct UserPartition {
    pub store: UserStore,
    pub scheduler: ReminderScheduler,
}

impl UserPartition {
    pub fn new(user_id: i64, policy: ReminderPolicy) -> Self {
        Self {
            store: UserStore::new(user_id),
            scheduler: ReminderScheduler::new(policy),
        }
    }
}

/// Structured acknowledgment (kind + payload). The engine never renders chat
/// markup; the transport decides how to display these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Acknowledgment {
    TaskCreated {
        task_id: u64,
        description: String,
        deadline: Option<DateTime<Utc>>,
    },
    TaskCompleted {
        task_id: u64,
        description: String,
    },
    TaskCanceled {
        task_id: u64,
        description: String,
    },
    HabitCreated {
        habit_id: u64,
        name: String,
        frequency: String,
    },
    CheckInRecorded {
        habit_id: u64,
        name: String,
        current_streak: u32,
        longest_streak: u32,
    },
    ExpenseLogged {
        expense_id: u64,
        amount: f64,
        category: String,
    },
    Status {
        domain: StatusDomain,
        summary: StatusSummary,
    },
    TimezoneSet {
        timezone: String,
    },
    /// The user needs to clarify or rephrase; `candidates` is non-empty for
    /// ambiguous references.
    Clarification {
        prompt: String,
        candidates: Vec<String>,
    },
}

fn clarify(prompt: impl Into<String>) -> Acknowledgment {
    Acknowledgment::Clarification {
        prompt: prompt.into(),
        candidates: Vec::new(),
    }
}

fn clarify_error(err: DomainError) -> Acknowledgment {
    match err {
        DomainError::AmbiguousReference { query, candidates } => Acknowledgment::Clarification {
            prompt: format!("'{query}' matches more than one entry; which one did you mean?"),
            candidates,
        },
        DomainError::Conflict { existing } => {
            clarify(format!("That already exists: {existing}."))
        }
        DomainError::Validation(msg) => clarify(msg),
        DomainError::NotFound(what) => clarify(format!("I couldn't find {what}.")),
        DomainError::Storage(_) => {
            clarify("Something went wrong on my side; please try again in a moment.")
        }
    }
}

/// Apply one intent to one user partition. Callers hold the partition lock
/// for the duration of this call and nothing longer.
pub fn handle(part: &mut UserPartition, intent: Intent, now: DateTime<Utc>) -> Acknowledgment {
    match intent {
        Intent::CreateTask { description, deadline } => {
            match part.store.create_task(&description, deadline, now) {
                Ok(task) => {
                    let ack = Acknowledgment::TaskCreated {
                        task_id: task.id,
                        description: task.description.clone(),
                        deadline: task.deadline,
                    };
                    let task = task.clone();
                    part.scheduler.register_task(&task, now);
                    ack
                }
                Err(e) => clarify_error(e),
            }
        }

        Intent::CompleteTask { task_ref } => match part.store.complete_task_by_ref(&task_ref) {
            Ok(task) => Acknowledgment::TaskCompleted {
                task_id: task.id,
                description: task.description.clone(),
            },
            Err(e) => clarify_error(e),
        },

        Intent::CancelTask { task_ref } => match part.store.cancel_task_by_ref(&task_ref) {
            Ok(task) => Acknowledgment::TaskCanceled {
                task_id: task.id,
                description: task.description,
            },
            Err(e) => clarify_error(e),
        },

        Intent::CreateHabit { name, frequency } => {
            let Some(freq) = Frequency::parse(&frequency) else {
                return clarify(format!(
                    "I don't recognize the frequency '{frequency}'; try daily, weekly, or N per week."
                ));
            };
            match part.store.create_habit(&name, freq, now) {
                Ok(habit) => {
                    let ack = Acknowledgment::HabitCreated {
                        habit_id: habit.id,
                        name: habit.name.clone(),
                        frequency: habit.frequency.to_string(),
                    };
                    let habit = habit.clone();
                    part.scheduler.register_habit(&habit, now);
                    ack
                }
                Err(e) => clarify_error(e),
            }
        }

        Intent::HabitCheckIn { habit_ref, result } => {
            let habit_id = match part.store.resolve_habit(&habit_ref) {
                Ok(id) => id,
                Err(e) => return clarify_error(e),
            };
            match part.store.add_check_in(habit_id, result, now) {
                Ok(habit) => Acknowledgment::CheckInRecorded {
                    habit_id: habit.id,
                    name: habit.name.clone(),
                    current_streak: habit.current_streak,
                    longest_streak: habit.longest_streak,
                },
                Err(e) => clarify_error(e),
            }
        }

        Intent::LogExpense { amount, category } => {
            match part.store.log_expense(amount, &category, now) {
                Ok(expense) => Acknowledgment::ExpenseLogged {
                    expense_id: expense.id,
                    amount: expense.amount,
                    category: expense.category.clone(),
                },
                Err(e) => clarify_error(e),
            }
        }

        Intent::QueryStatus { domain } => Acknowledgment::Status {
            domain,
            summary: part.store.status_summary(now),
        },

        Intent::SetTimezone { timezone } => match resolve_timezone(&timezone) {
            Ok(tz) => {
                part.store.timezone = Some(tz);
                Acknowledgment::TimezoneSet {
                    timezone: tz.to_string(),
                }
            }
            Err(_) => clarify(format!(
                "'{timezone}' isn't a timezone I know; try an IANA name like Asia/Kolkata."
            )),
        },

        Intent::Unknown { .. } => clarify(
            "I didn't catch that. You can tell me about tasks (\"remind me to pay rent tomorrow 6pm\"), \
habits (\"I ran today\"), or money (\"spent 50 on food\").",
        ),
    }
}
