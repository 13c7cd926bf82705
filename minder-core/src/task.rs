//! Task model: deadline-bearing to-dos with a reminder lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Open,
    Done,
    Missed,
}

/// Reminder lifecycle per task, advanced only by the scheduler (to Due/Missed)
/// and by task completion (to Acknowledged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderState {
    Scheduled,
    Due,
    Acknowledged,
    Missed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub user_id: i64,
    pub description: String,
    /// Optional hard deadline (UTC). Tasks without one never go Missed.
    pub deadline: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub reminder: ReminderState,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: u64, user_id: i64, description: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            description: description.into(),
            deadline: None,
            status: TaskStatus::Open,
            reminder: ReminderState::Scheduled,
            created_at,
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == TaskStatus::Open
    }

    /// Open→Done and Open→Missed are the only legal transitions.
    pub fn transition(&mut self, to: TaskStatus) -> DomainResult<()> {
        match (self.status, to) {
            (TaskStatus::Open, TaskStatus::Done) => {
                self.status = TaskStatus::Done;
                self.reminder = ReminderState::Acknowledged;
                Ok(())
            }
            (TaskStatus::Open, TaskStatus::Missed) => {
                self.status = TaskStatus::Missed;
                self.reminder = ReminderState::Missed;
                Ok(())
            }
            (from, to) => Err(DomainError::Validation(format!(
                "task '{}' cannot go {:?} -> {:?}",
                self.description, from, to
            ))),
        }
    }
}
