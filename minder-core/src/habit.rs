//! Habit model and streak computation over ordered check-ins.
//!
//! Intervals are fixed UTC-day buckets: one day for daily habits, seven-day
//! buckets for weekly and n-per-week habits. A streak is the count of
//! consecutive satisfied intervals ending at the present; any skipped check-in
//! or missed interval resets it to zero.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    /// N completions expected per seven-day bucket.
    NPerWeek(u32),
}

impl Frequency {
    /// Parse the recognized frequency set: "daily", "weekly", "3 per week"
    /// (also "3/week", "3x per week", "3_per_week"). Anything else is None.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "daily" | "every day" => return Some(Frequency::Daily),
            "weekly" | "every week" => return Some(Frequency::Weekly),
            _ => {}
        }
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        let rest = s[digits.len()..].trim_start_matches(['x', '_', ' ', '/']);
        if rest == "per week" || rest == "per_week" || rest == "week" || rest == "weekly" {
            let n: u32 = digits.parse().ok()?;
            if n == 0 || n > 7 {
                return None;
            }
            return Some(Frequency::NPerWeek(n));
        }
        None
    }

    pub fn interval_days(&self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly | Frequency::NPerWeek(_) => 7,
        }
    }

    /// Done check-ins required to satisfy one interval.
    pub fn required_per_interval(&self) -> u32 {
        match self {
            Frequency::Daily | Frequency::Weekly => 1,
            Frequency::NPerWeek(n) => *n,
        }
    }

    /// Expected number of done check-ins over a span of whole days (prorated).
    pub fn expected_in(&self, days: i64) -> f64 {
        let days = days.max(0) as f64;
        match self {
            Frequency::Daily => days,
            Frequency::Weekly => days / 7.0,
            Frequency::NPerWeek(n) => days * (*n as f64) / 7.0,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::NPerWeek(n) => write!(f, "{n} per week"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: u64,
    pub user_id: i64,
    pub name: String,
    pub frequency: Frequency,
    pub created_at: DateTime<Utc>,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl Habit {
    pub fn new(
        id: u64,
        user_id: i64,
        name: impl Into<String>,
        frequency: Frequency,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            name: name.into(),
            frequency,
            created_at,
            current_streak: 0,
            longest_streak: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckInResult {
    Done,
    Skipped,
}

/// Immutable once created; ordering by timestamp defines streak computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitCheckIn {
    pub id: u64,
    pub habit_id: u64,
    pub timestamp: DateTime<Utc>,
    pub result: CheckInResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Streaks {
    pub current: u32,
    pub longest: u32,
}

fn interval_index(ts: DateTime<Utc>, interval_days: i64) -> i64 {
    ts.num_days_from_ce() as i64 / interval_days
}

#[derive(Debug, Default, Clone, Copy)]
struct IntervalTally {
    done: u32,
    skipped: bool,
}

/// Recompute current and longest streak from a habit's check-ins.
///
/// `now` anchors the current interval: a trailing run only survives when no
/// whole interval has elapsed since the last check-in.
pub fn compute_streaks(frequency: Frequency, check_ins: &[HabitCheckIn], now: DateTime<Utc>) -> Streaks {
    let days = frequency.interval_days();
    let required = frequency.required_per_interval();

    let mut tallies: BTreeMap<i64, IntervalTally> = BTreeMap::new();
    for c in check_ins {
        let t = tallies.entry(interval_index(c.timestamp, days)).or_default();
        match c.result {
            CheckInResult::Done => t.done += 1,
            CheckInResult::Skipped => t.skipped = true,
        }
    }

    if tallies.is_empty() {
        return Streaks::default();
    }

    let satisfied = |t: &IntervalTally| !t.skipped && t.done >= required;

    // Longest: scan ascending, break runs on gaps or unsatisfied intervals.
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut prev: Option<i64> = None;
    for (idx, tally) in &tallies {
        let contiguous = prev.map(|p| idx - p == 1).unwrap_or(true);
        if satisfied(tally) {
            run = if contiguous { run + 1 } else { 1 };
        } else {
            run = 0;
        }
        longest = longest.max(run);
        prev = Some(*idx);
    }

    // Current: trailing run ending at the most recent check-in interval.
    let here = interval_index(now, days);
    let last = *tallies.keys().next_back().unwrap_or(&here);
    if here - last > 1 {
        // A whole interval passed with no check-in at all.
        return Streaks { current: 0, longest };
    }

    let last_tally = tallies.get(&last).copied().unwrap_or_default();
    let mut cursor = if satisfied(&last_tally) {
        last
    } else if !last_tally.skipped && last == here {
        // Current interval is in progress but not yet satisfied; the streak
        // through the previous interval still stands.
        last - 1
    } else {
        return Streaks { current: 0, longest };
    };

    let mut current = 0u32;
    while let Some(t) = tallies.get(&cursor) {
        if !satisfied(t) {
            break;
        }
        current += 1;
        cursor -= 1;
    }

    Streaks { current, longest }
}
