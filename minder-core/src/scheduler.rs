//! Reminder scheduler: a time-ordered wake queue over (wake_time, entity_id).
//!
//! The scheduler owns no entity data. It holds weak (id + due-time) entries
//! and reads/writes task status and habit streaks through the `UserStore` it
//! is handed on each tick. Per-task lifecycle: scheduled -> due ->
//! {acknowledged, missed}.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::habit::Habit;
use crate::store::UserStore;
use crate::task::{ReminderState, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeKind {
    /// Early heads-up at deadline minus lead time.
    TaskLead,
    /// The deadline itself.
    TaskDeadline,
    /// Deadline plus grace window; an unacknowledged task goes Missed here.
    TaskGrace,
    /// A habit check-in window closes.
    HabitWindow,
}

#[derive(Debug, Clone)]
struct WakeEntry {
    wake_at: DateTime<Utc>,
    seq: u64,
    kind: WakeKind,
    entity_id: u64,
}

impl PartialEq for WakeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.wake_at == other.wake_at && self.seq == other.seq
    }
}
impl Eq for WakeEntry {}

impl PartialOrd for WakeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WakeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest wake pops first.
        other
            .wake_at
            .cmp(&self.wake_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReminderPolicy {
    pub lead_time: Duration,
    pub grace_window: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            lead_time: Duration::hours(24),
            grace_window: Duration::hours(6),
        }
    }
}

/// Due events emitted by a tick; payload data for the transport to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DueNotification {
    TaskDue {
        task_id: u64,
        description: String,
        deadline: DateTime<Utc>,
        /// False for the lead-time heads-up, true at the deadline itself.
        is_final: bool,
    },
    TaskMissed {
        task_id: u64,
        description: String,
    },
    HabitCheckInDue {
        habit_id: u64,
        name: String,
    },
}

#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    heap: BinaryHeap<WakeEntry>,
    policy: ReminderPolicy,
    seq: u64,
}

impl ReminderScheduler {
    pub fn new(policy: ReminderPolicy) -> Self {
        Self {
            heap: BinaryHeap::new(),
            policy,
            seq: 0,
        }
    }

    fn push(&mut self, wake_at: DateTime<Utc>, kind: WakeKind, entity_id: u64) {
        self.seq += 1;
        self.heap.push(WakeEntry {
            wake_at,
            seq: self.seq,
            kind,
            entity_id,
        });
    }

    /// Register a newly created task. A deadline task gets exactly two wakes:
    /// lead-time and deadline. The grace wake is queued when the deadline
    /// fires. Tasks without a deadline get no wakes.
    pub fn register_task(&mut self, task: &Task, now: DateTime<Utc>) {
        let Some(deadline) = task.deadline else {
            return;
        };
        // A lead slot already in the past fires on the next tick.
        let lead_at = (deadline - self.policy.lead_time).max(now);
        self.push(lead_at, WakeKind::TaskLead, task.id);
        self.push(deadline, WakeKind::TaskDeadline, task.id);
    }

    /// Register a habit's next check-in window close.
    pub fn register_habit(&mut self, habit: &Habit, now: DateTime<Utc>) {
        self.push(next_window_close(habit, now), WakeKind::HabitWindow, habit.id);
    }

    pub fn pending_wakes(&self) -> usize {
        self.heap.len()
    }

    /// Drain all elapsed wakes, emitting each due-notification exactly once.
    /// Entries are consumed on pop, so nothing re-fires.
    pub fn tick(&mut self, store: &mut UserStore, now: DateTime<Utc>) -> Vec<DueNotification> {
        let mut out = Vec::new();

        while let Some(head) = self.heap.peek() {
            if head.wake_at > now {
                break;
            }
            let entry = self.heap.pop().unwrap();
            match entry.kind {
                WakeKind::TaskLead | WakeKind::TaskDeadline => {
                    self.fire_task_wake(store, &entry, &mut out);
                }
                WakeKind::TaskGrace => {
                    self.fire_task_grace(store, &entry, &mut out);
                }
                WakeKind::HabitWindow => {
                    self.fire_habit_window(store, &entry, now, &mut out);
                }
            }
        }

        out
    }

    fn fire_task_wake(&mut self, store: &mut UserStore, entry: &WakeEntry, out: &mut Vec<DueNotification>) {
        let Some(task) = store.task(entry.entity_id) else {
            return;
        };
        if !task.is_open() {
            return;
        }
        let Some(deadline) = task.deadline else {
            return;
        };

        out.push(DueNotification::TaskDue {
            task_id: task.id,
            description: task.description.clone(),
            deadline,
            is_final: entry.kind == WakeKind::TaskDeadline,
        });

        if entry.kind == WakeKind::TaskDeadline {
            self.push(deadline + self.policy.grace_window, WakeKind::TaskGrace, task.id);
        }

        if let Some(task) = store.task_mut(entry.entity_id) {
            if task.reminder == ReminderState::Scheduled {
                task.reminder = ReminderState::Due;
            }
        }
    }

    fn fire_task_grace(&mut self, store: &mut UserStore, entry: &WakeEntry, out: &mut Vec<DueNotification>) {
        let Some(task) = store.task(entry.entity_id) else {
            return;
        };
        if !task.is_open() {
            // Acknowledged (completed) in time; nothing to do.
            return;
        }
        let description = task.description.clone();
        let task_id = task.id;
        if store.mark_task_missed(task_id).is_ok() {
            out.push(DueNotification::TaskMissed { task_id, description });
        }
    }

    fn fire_habit_window(
        &mut self,
        store: &mut UserStore,
        entry: &WakeEntry,
        now: DateTime<Utc>,
        out: &mut Vec<DueNotification>,
    ) {
        let Some(habit) = store.habit(entry.entity_id) else {
            return;
        };
        let habit_id = habit.id;
        let name = habit.name.clone();
        let window_len = Duration::days(habit.frequency.interval_days());
        let window_start = entry.wake_at - window_len;

        if store.done_check_ins_in(habit_id, window_start, entry.wake_at) == 0 {
            out.push(DueNotification::HabitCheckInDue { habit_id, name });
            // A closed empty window is a missed interval; the streak resets.
            let _ = store.refresh_habit_streak(habit_id, now);
        }

        // Re-arm for the next interval regardless of outcome.
        if let Some(habit) = store.habit(entry.entity_id) {
            let habit = habit.clone();
            self.push(next_window_close(&habit, entry.wake_at), WakeKind::HabitWindow, habit_id);
        }
    }
}

/// Check-in windows are anchored at the habit's creation time and advance in
/// whole intervals, so boundaries are stable across restarts. Streak buckets
/// (habit.rs) are UTC-day aligned instead; a check-in near a boundary can sit
/// in a different bucket than its reminder window. The streak recompute at
/// window close follows the bucket rule.
fn next_window_close(habit: &Habit, after: DateTime<Utc>) -> DateTime<Utc> {
    let interval = Duration::days(habit.frequency.interval_days());
    let mut close = habit.created_at + interval;
    if close <= after {
        let elapsed = after - habit.created_at;
        let periods = elapsed.num_seconds() / interval.num_seconds();
        close = habit.created_at + interval * (periods as i32 + 1);
    }
    close
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::{CheckInResult, Frequency};
    use crate::task::TaskStatus;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, d, h, 0, 0).unwrap()
    }

    fn setup() -> (UserStore, ReminderScheduler) {
        (UserStore::new(1), ReminderScheduler::new(ReminderPolicy::default()))
    }

    #[test]
    fn deadline_task_gets_exactly_two_wakes() {
        let (mut store, mut sched) = setup();
        let now = at(10, 12);
        let task = store.create_task("pay rent", Some(at(12, 18)), now).unwrap().clone();
        sched.register_task(&task, now);
        assert_eq!(sched.pending_wakes(), 2);
    }

    #[test]
    fn task_without_deadline_gets_no_wakes() {
        let (mut store, mut sched) = setup();
        let now = at(10, 12);
        let task = store.create_task("someday", None, now).unwrap().clone();
        sched.register_task(&task, now);
        assert_eq!(sched.pending_wakes(), 0);
    }

    #[test]
    fn lead_wake_fires_once_and_does_not_refire() {
        let (mut store, mut sched) = setup();
        let now = at(10, 12);
        let deadline = at(12, 18);
        let task = store.create_task("pay rent", Some(deadline), now).unwrap().clone();
        sched.register_task(&task, now);

        // Lead is deadline - 24h = day 11 18:00.
        let fired = sched.tick(&mut store, at(11, 18));
        assert_eq!(fired.len(), 1);
        assert!(matches!(
            &fired[0],
            DueNotification::TaskDue { is_final: false, .. }
        ));
        assert_eq!(store.task(task.id).unwrap().reminder, ReminderState::Due);

        // Same instant again: consumed, nothing re-fires.
        assert!(sched.tick(&mut store, at(11, 18)).is_empty());
    }

    #[test]
    fn unacknowledged_task_goes_missed_after_grace() {
        let (mut store, mut sched) = setup();
        let now = at(10, 12);
        let deadline = at(12, 18);
        let task = store.create_task("pay rent", Some(deadline), now).unwrap().clone();
        sched.register_task(&task, now);

        let fired = sched.tick(&mut store, deadline);
        // Lead and deadline both elapsed by now.
        assert_eq!(fired.len(), 2);

        // Before grace lapses: still open.
        assert!(sched.tick(&mut store, deadline + Duration::hours(5)).is_empty());
        assert_eq!(store.task(task.id).unwrap().status, TaskStatus::Open);

        let fired = sched.tick(&mut store, deadline + Duration::hours(6));
        assert_eq!(fired.len(), 1);
        assert!(matches!(&fired[0], DueNotification::TaskMissed { .. }));
        assert_eq!(store.task(task.id).unwrap().status, TaskStatus::Missed);
    }

    #[test]
    fn completed_task_never_goes_missed() {
        let (mut store, mut sched) = setup();
        let now = at(10, 12);
        let deadline = at(12, 18);
        let task = store.create_task("pay rent", Some(deadline), now).unwrap().clone();
        sched.register_task(&task, now);

        sched.tick(&mut store, deadline);
        store.complete_task(task.id).unwrap();

        assert!(sched.tick(&mut store, deadline + Duration::days(1)).is_empty());
        assert_eq!(store.task(task.id).unwrap().status, TaskStatus::Done);
    }

    #[test]
    fn canceled_task_wakes_are_inert() {
        let (mut store, mut sched) = setup();
        let now = at(10, 12);
        let task = store.create_task("pay rent", Some(at(12, 18)), now).unwrap().clone();
        sched.register_task(&task, now);
        store.cancel_task_by_ref("pay rent").unwrap();

        // Both queued wakes pop past the deadline and find no task.
        assert!(sched.tick(&mut store, at(13, 0)).is_empty());
        assert_eq!(sched.pending_wakes(), 0);
    }

    #[test]
    fn habit_window_reminds_when_unfulfilled_and_rearms() {
        let (mut store, mut sched) = setup();
        let created = at(10, 9);
        let habit = store.create_habit("run", Frequency::Daily, created).unwrap().clone();
        sched.register_habit(&habit, created);

        // Window closes a day after creation with no check-in.
        let fired = sched.tick(&mut store, at(11, 9));
        assert_eq!(fired.len(), 1);
        assert!(matches!(&fired[0], DueNotification::HabitCheckInDue { .. }));
        // Re-armed for the next interval.
        assert_eq!(sched.pending_wakes(), 1);
    }

    #[test]
    fn habit_window_quiet_when_checked_in() {
        let (mut store, mut sched) = setup();
        let created = at(10, 9);
        let habit = store.create_habit("run", Frequency::Daily, created).unwrap().clone();
        sched.register_habit(&habit, created);
        store.add_check_in(habit.id, CheckInResult::Done, at(10, 20)).unwrap();

        assert!(sched.tick(&mut store, at(11, 9)).is_empty());
        assert_eq!(sched.pending_wakes(), 1);
    }

    #[test]
    fn short_deadline_clamps_lead_to_now() {
        let (mut store, mut sched) = setup();
        let now = at(10, 12);
        // Deadline inside the lead window: lead fires immediately.
        let task = store.create_task("pay rent", Some(at(10, 18)), now).unwrap().clone();
        sched.register_task(&task, now);
        assert_eq!(sched.pending_wakes(), 2);

        let fired = sched.tick(&mut store, now);
        assert_eq!(fired.len(), 1);
        assert!(matches!(&fired[0], DueNotification::TaskDue { is_final: false, .. }));
    }
}
