//! Per-user entity store: the sole source of truth for tasks, habits,
//! check-ins, expenses, and recommendations.
//!
//! One `UserStore` is one user partition. No cross-user references exist, so
//! callers can shard these freely. Every mutation validates fully before
//! writing; a failed validation leaves prior state untouched.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{DomainError, DomainResult};
use crate::expense::{Expense, normalize_category};
use crate::habit::{CheckInResult, Frequency, Habit, HabitCheckIn, compute_streaks};
use crate::recommendation::{AnalysisWindow, Recommendation};
use crate::resolve::resolve_name;
use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStore {
    pub user_id: i64,
    /// Set via the timezone intent; used to interpret local deadlines.
    pub timezone: Option<Tz>,
    tasks: Vec<Task>,
    habits: Vec<Habit>,
    check_ins: Vec<HabitCheckIn>,
    expenses: Vec<Expense>,
    recommendations: Vec<Recommendation>,
    next_id: u64,
}

/// Read-only aggregation for the status query; no mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub open_tasks: Vec<TaskSummary>,
    pub habits: Vec<HabitSummary>,
    pub month_spend_by_category: BTreeMap<String, f64>,
    pub month_spend_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: u64,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitSummary {
    pub id: u64,
    pub name: String,
    pub frequency: Frequency,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl UserStore {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            timezone: None,
            tasks: Vec::new(),
            habits: Vec::new(),
            check_ins: Vec::new(),
            expenses: Vec::new(),
            recommendations: Vec::new(),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // --- Tasks ---

    pub fn create_task(
        &mut self,
        description: &str,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DomainResult<&Task> {
        let description = description.trim();
        if description.is_empty() {
            return Err(DomainError::Validation("task description is empty".to_string()));
        }
        if let Some(dl) = deadline {
            if dl <= now {
                return Err(DomainError::Validation(format!(
                    "deadline {} is in the past",
                    dl.to_rfc3339()
                )));
            }
        }
        let id = self.next_id();
        let mut task = Task::new(id, self.user_id, description, now);
        task.deadline = deadline;
        self.tasks.push(task);
        Ok(self.tasks.last().unwrap())
    }

    pub fn task(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn open_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_open())
    }

    /// Resolve an open task by fuzzy description match and mark it done.
    pub fn complete_task_by_ref(&mut self, task_ref: &str) -> DomainResult<&Task> {
        let open: Vec<&Task> = self.open_tasks().collect();
        let names: Vec<&str> = open.iter().map(|t| t.description.as_str()).collect();
        let idx = resolve_name(task_ref, &names)?;
        let id = open[idx].id;
        self.complete_task(id)?;
        Ok(self.task(id).unwrap())
    }

    /// Resolve an open task by fuzzy description match and remove it. A wake
    /// queued for a removed id finds nothing and stays silent.
    pub fn cancel_task_by_ref(&mut self, task_ref: &str) -> DomainResult<Task> {
        let open: Vec<&Task> = self.open_tasks().collect();
        let names: Vec<&str> = open.iter().map(|t| t.description.as_str()).collect();
        let idx = resolve_name(task_ref, &names)?;
        let id = open[idx].id;
        let pos = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| DomainError::NotFound(format!("task {id}")))?;
        Ok(self.tasks.remove(pos))
    }

    pub fn complete_task(&mut self, id: u64) -> DomainResult<()> {
        let task = self
            .task_mut(id)
            .ok_or_else(|| DomainError::NotFound(format!("task {id}")))?;
        task.transition(TaskStatus::Done)
    }

    /// Scheduler-driven transition after the grace window lapses.
    pub fn mark_task_missed(&mut self, id: u64) -> DomainResult<()> {
        let task = self
            .task_mut(id)
            .ok_or_else(|| DomainError::NotFound(format!("task {id}")))?;
        task.transition(TaskStatus::Missed)
    }

    // --- Habits ---

    pub fn create_habit(
        &mut self,
        name: &str,
        frequency: Frequency,
        now: DateTime<Utc>,
    ) -> DomainResult<&Habit> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("habit name is empty".to_string()));
        }
        if let Some(existing) = self
            .habits
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
        {
            return Err(DomainError::Conflict {
                existing: format!("habit '{}' ({})", existing.name, existing.frequency),
            });
        }
        let id = self.next_id();
        self.habits.push(Habit::new(id, self.user_id, name, frequency, now));
        Ok(self.habits.last().unwrap())
    }

    pub fn habit(&self, id: u64) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == id)
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn habit_names(&self) -> Vec<String> {
        self.habits.iter().map(|h| h.name.clone()).collect()
    }

    pub fn resolve_habit(&self, habit_ref: &str) -> DomainResult<u64> {
        let names: Vec<&str> = self.habits.iter().map(|h| h.name.as_str()).collect();
        let idx = resolve_name(habit_ref, &names)?;
        Ok(self.habits[idx].id)
    }

    /// Append a check-in and recompute streaks. Check-ins are immutable.
    pub fn add_check_in(
        &mut self,
        habit_id: u64,
        result: CheckInResult,
        now: DateTime<Utc>,
    ) -> DomainResult<&Habit> {
        let frequency = self
            .habit(habit_id)
            .ok_or_else(|| DomainError::NotFound(format!("habit {habit_id}")))?
            .frequency;

        let id = self.next_id();
        self.check_ins.push(HabitCheckIn {
            id,
            habit_id,
            timestamp: now,
            result,
        });

        let streaks = compute_streaks(frequency, &self.habit_check_ins(habit_id), now);
        let habit = self.habits.iter_mut().find(|h| h.id == habit_id).unwrap();
        habit.current_streak = streaks.current;
        habit.longest_streak = habit.longest_streak.max(streaks.longest);
        Ok(self.habit(habit_id).unwrap())
    }

    pub fn habit_check_ins(&self, habit_id: u64) -> Vec<HabitCheckIn> {
        self.check_ins
            .iter()
            .filter(|c| c.habit_id == habit_id)
            .cloned()
            .collect()
    }

    /// Done check-ins for a habit inside [start, end).
    pub fn done_check_ins_in(&self, habit_id: u64, start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
        self.check_ins
            .iter()
            .filter(|c| {
                c.habit_id == habit_id
                    && c.result == CheckInResult::Done
                    && c.timestamp >= start
                    && c.timestamp < end
            })
            .count()
    }

    /// Recompute a habit's current streak against `now` without a new
    /// check-in. Used by the scheduler when an interval closes unfulfilled.
    pub fn refresh_habit_streak(&mut self, habit_id: u64, now: DateTime<Utc>) -> DomainResult<()> {
        let frequency = self
            .habit(habit_id)
            .ok_or_else(|| DomainError::NotFound(format!("habit {habit_id}")))?
            .frequency;
        let streaks = compute_streaks(frequency, &self.habit_check_ins(habit_id), now);
        let habit = self.habits.iter_mut().find(|h| h.id == habit_id).unwrap();
        habit.current_streak = streaks.current;
        Ok(())
    }

    // --- Expenses ---

    pub fn log_expense(
        &mut self,
        amount: f64,
        category: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<&Expense> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(DomainError::Validation(format!(
                "expense amount must be positive, got {amount}"
            )));
        }
        let id = self.next_id();
        self.expenses.push(Expense {
            id,
            user_id: self.user_id,
            amount,
            category: normalize_category(category),
            timestamp: now,
        });
        Ok(self.expenses.last().unwrap())
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    /// Spend per category inside [start, end).
    pub fn spend_by_category(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> BTreeMap<String, f64> {
        let mut by_cat = BTreeMap::new();
        for e in &self.expenses {
            if e.timestamp >= start && e.timestamp < end {
                *by_cat.entry(e.category.clone()).or_insert(0.0) += e.amount;
            }
        }
        by_cat
    }

    // --- Recommendations ---

    /// Append a recommendation, marking any prior one for the same habit stale.
    pub fn push_recommendation(
        &mut self,
        habit_id: u64,
        window: AnalysisWindow,
        message: String,
        now: DateTime<Utc>,
    ) -> &Recommendation {
        for r in self.recommendations.iter_mut() {
            if r.habit_id == habit_id && !r.stale {
                r.stale = true;
            }
        }
        let id = self.next_id();
        self.recommendations.push(Recommendation {
            id,
            user_id: self.user_id,
            habit_id,
            window,
            message,
            created_at: now,
            acknowledged: false,
            stale: false,
        });
        self.recommendations.last().unwrap()
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    // --- Aggregation ---

    pub fn status_summary(&self, now: DateTime<Utc>) -> StatusSummary {
        let month_start = now - Duration::days(30);
        let by_cat = self.spend_by_category(month_start, now);
        let total = by_cat.values().sum();

        let mut open_tasks: Vec<TaskSummary> = self
            .open_tasks()
            .map(|t| TaskSummary {
                id: t.id,
                description: t.description.clone(),
                deadline: t.deadline,
            })
            .collect();
        open_tasks.sort_by_key(|t| (t.deadline.is_none(), t.deadline));

        StatusSummary {
            open_tasks,
            habits: self
                .habits
                .iter()
                .map(|h| HabitSummary {
                    id: h.id,
                    name: h.name.clone(),
                    frequency: h.frequency,
                    current_streak: h.current_streak,
                    longest_streak: h.longest_streak,
                })
                .collect(),
            month_spend_by_category: by_cat,
            month_spend_total: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, d, h, 0, 0).unwrap()
    }

    #[test]
    fn create_task_rejects_past_deadline() {
        let mut s = UserStore::new(1);
        let now = at(10, 12);
        let err = s.create_task("pay rent", Some(at(9, 12)), now).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(s.open_tasks().count(), 0);
    }

    #[test]
    fn create_task_rejects_empty_description() {
        let mut s = UserStore::new(1);
        assert!(s.create_task("   ", None, at(10, 12)).is_err());
    }

    #[test]
    fn duplicate_habit_name_conflicts() {
        let mut s = UserStore::new(1);
        let now = at(10, 12);
        s.create_habit("Meditation", Frequency::Daily, now).unwrap();
        let err = s.create_habit("meditation", Frequency::Weekly, now).unwrap_err();
        match err {
            DomainError::Conflict { existing } => assert!(existing.contains("Meditation")),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(s.habits().len(), 1);
    }

    #[test]
    fn check_in_updates_streaks() {
        let mut s = UserStore::new(1);
        let h = s.create_habit("run", Frequency::Daily, at(1, 8)).unwrap().id;
        s.add_check_in(h, CheckInResult::Done, at(1, 9)).unwrap();
        s.add_check_in(h, CheckInResult::Done, at(2, 9)).unwrap();
        let habit = s.add_check_in(h, CheckInResult::Done, at(3, 9)).unwrap();
        assert_eq!(habit.current_streak, 3);
        assert_eq!(habit.longest_streak, 3);

        let habit = s.add_check_in(h, CheckInResult::Skipped, at(4, 9)).unwrap();
        assert_eq!(habit.current_streak, 0);
        assert_eq!(habit.longest_streak, 3);
    }

    #[test]
    fn expense_ledger_is_append_only() {
        let mut s = UserStore::new(1);
        let now = at(10, 12);
        s.log_expense(50.0, "food", now).unwrap();
        s.log_expense(50.0, "food", now).unwrap();
        // Same command twice: two entries, nothing mutated in place.
        assert_eq!(s.expenses().len(), 2);
        assert!(s.log_expense(0.0, "food", now).is_err());
        assert!(s.log_expense(-3.0, "food", now).is_err());
        assert_eq!(s.expenses().len(), 2);
    }

    #[test]
    fn newer_recommendation_supersedes_same_habit() {
        let mut s = UserStore::new(1);
        let h = s.create_habit("run", Frequency::Daily, at(1, 8)).unwrap().id;
        let w = AnalysisWindow { start: at(1, 0), end: at(15, 0) };
        s.push_recommendation(h, w, "first".to_string(), at(15, 1));
        s.push_recommendation(h, w, "second".to_string(), at(16, 1));
        let recs = s.recommendations();
        assert_eq!(recs.len(), 2);
        assert!(recs[0].stale);
        assert!(!recs[1].stale);
    }

    #[test]
    fn status_summary_aggregates_without_mutation() {
        let mut s = UserStore::new(1);
        let now = at(20, 12);
        s.create_task("pay rent", Some(at(25, 18)), now).unwrap();
        let h = s.create_habit("run", Frequency::Daily, now).unwrap().id;
        s.add_check_in(h, CheckInResult::Done, now).unwrap();
        s.log_expense(120.0, "Food", now).unwrap();
        s.log_expense(30.0, "transport", now).unwrap();

        let sum = s.status_summary(at(21, 12));
        assert_eq!(sum.open_tasks.len(), 1);
        assert_eq!(sum.habits[0].current_streak, 1);
        assert_eq!(sum.month_spend_by_category["food"], 120.0);
        assert_eq!(sum.month_spend_total, 150.0);
    }

    #[test]
    fn cancel_removes_open_task() {
        let mut s = UserStore::new(1);
        let now = at(10, 12);
        s.create_task("pay rent", Some(at(25, 18)), now).unwrap();
        s.create_task("call the dentist", None, now).unwrap();

        let gone = s.cancel_task_by_ref("dentist").unwrap();
        assert_eq!(gone.description, "call the dentist");
        assert_eq!(s.open_tasks().count(), 1);
        assert!(s.task(gone.id).is_none());

        // Already removed: nothing left to match.
        assert!(matches!(
            s.cancel_task_by_ref("dentist"),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn complete_task_by_fuzzy_ref() {
        let mut s = UserStore::new(1);
        let now = at(10, 12);
        s.create_task("pay rent", Some(at(25, 18)), now).unwrap();
        s.create_task("call the dentist", None, now).unwrap();
        let done = s.complete_task_by_ref("rent").unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert_eq!(s.open_tasks().count(), 1);
    }
}
