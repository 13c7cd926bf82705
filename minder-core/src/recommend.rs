//! Recommendation engine: correlate expense spikes with habit breakdowns.
//!
//! This is a detection heuristic, not causal inference. A coinciding
//! adherence drop and spending spike is a proxy signal worth surfacing, not
//! proof that one caused the other; both thresholds are tunable.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::habit::Habit;
use crate::recommendation::{AnalysisWindow, Recommendation};
use crate::store::UserStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecommendPolicy {
    /// Length of the trailing comparison window, in days.
    pub trailing_days: i64,
    /// Emit when adherence falls below this fraction of baseline (0.7 =>
    /// "dropped below 70% of what it was").
    pub adherence_drop_threshold: f64,
    /// Emit when a category's spend exceeds this multiple of its baseline
    /// median (1.3 => "30% above normal").
    pub expense_spike_threshold: f64,
    /// How many prior windows feed the expense baseline median.
    pub baseline_windows: usize,
}

impl Default for RecommendPolicy {
    fn default() -> Self {
        Self {
            trailing_days: 14,
            adherence_drop_threshold: 0.7,
            expense_spike_threshold: 1.3,
            baseline_windows: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AdherenceDrop {
    habit_id: u64,
    habit_name: String,
    current_ratio: f64,
    baseline_ratio: f64,
    /// Relative drop magnitude in [0, 1]; ranking key.
    drop: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct CategorySpike {
    category: String,
    current_total: f64,
    baseline_median: f64,
    ratio: f64,
}

/// Evaluate one user partition. Emits at most one recommendation per call
/// (the habit with the largest adherence drop) to avoid notification spam;
/// the store marks any prior recommendation for that habit stale.
pub fn evaluate(store: &mut UserStore, now: DateTime<Utc>, policy: &RecommendPolicy) -> Option<Recommendation> {
    let window = Duration::days(policy.trailing_days);
    let current_start = now - window;
    let baseline_start = current_start - window;

    let mut drops: Vec<AdherenceDrop> = store
        .habits()
        .iter()
        .filter_map(|h| adherence_drop(store, h, baseline_start, current_start, now, policy))
        .collect();
    if drops.is_empty() {
        return None;
    }
    // Largest drop first; habit id breaks ties deterministically.
    drops.sort_by(|a, b| {
        b.drop
            .partial_cmp(&a.drop)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.habit_id.cmp(&b.habit_id))
    });

    let spike = top_category_spike(store, now, policy)?;
    let top = drops.remove(0);

    let message = format!(
        "Your habit '{}' slipped to {:.0}% adherence (was {:.0}%) while '{}' spending rose to {:.2} ({:.0}% above its usual level). These may be connected; worth a look.",
        top.habit_name,
        top.current_ratio * 100.0,
        top.baseline_ratio * 100.0,
        spike.category,
        spike.current_total,
        (spike.ratio - 1.0) * 100.0,
    );

    let window = AnalysisWindow {
        start: current_start,
        end: now,
    };
    Some(store.push_recommendation(top.habit_id, window, message, now).clone())
}

fn adherence_drop(
    store: &UserStore,
    habit: &Habit,
    baseline_start: DateTime<Utc>,
    current_start: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &RecommendPolicy,
) -> Option<AdherenceDrop> {
    // Only habits old enough to have a full baseline window qualify.
    if habit.created_at > baseline_start {
        return None;
    }
    let days = (now - current_start).num_days();
    let expected = habit.frequency.expected_in(days);
    if expected <= 0.0 {
        return None;
    }

    let current_done = store.done_check_ins_in(habit.id, current_start, now) as f64;
    let baseline_done = store.done_check_ins_in(habit.id, baseline_start, current_start) as f64;

    let current_ratio = (current_done / expected).min(1.0);
    let baseline_ratio = (baseline_done / expected).min(1.0);
    if baseline_ratio <= 0.0 {
        // Nothing to drop from; the habit was never established.
        return None;
    }
    if current_ratio >= policy.adherence_drop_threshold * baseline_ratio {
        return None;
    }

    Some(AdherenceDrop {
        habit_id: habit.id,
        habit_name: habit.name.clone(),
        current_ratio,
        baseline_ratio,
        drop: (baseline_ratio - current_ratio) / baseline_ratio,
    })
}

/// The category with the strongest spike over its rolling-median baseline,
/// if any crosses the threshold in the trailing window.
fn top_category_spike(store: &UserStore, now: DateTime<Utc>, policy: &RecommendPolicy) -> Option<CategorySpike> {
    let window = Duration::days(policy.trailing_days);
    let current = store.spend_by_category(now - window, now);

    let mut best: Option<CategorySpike> = None;
    for (category, total) in &current {
        let mut priors: Vec<f64> = Vec::with_capacity(policy.baseline_windows);
        for i in 1..=policy.baseline_windows {
            let end = now - window * (i as i32);
            let start = end - window;
            priors.push(
                store
                    .spend_by_category(start, end)
                    .get(category)
                    .copied()
                    .unwrap_or(0.0),
            );
        }
        let baseline = median(&mut priors);
        if baseline <= 0.0 {
            continue;
        }
        let ratio = total / baseline;
        if ratio <= policy.expense_spike_threshold {
            continue;
        }
        let candidate = CategorySpike {
            category: category.clone(),
            current_total: *total,
            baseline_median: baseline,
            ratio,
        };
        if best.as_ref().map(|b| ratio > b.ratio).unwrap_or(true) {
            best = Some(candidate);
        }
    }
    best
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
