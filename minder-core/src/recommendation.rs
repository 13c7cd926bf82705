//! Generated recommendations linking a habit breakdown to a spending spike.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The expense/adherence window a recommendation was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Never user-authored. A newer recommendation for the same habit supersedes
/// the old one (marked stale, not deleted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: u64,
    pub user_id: i64,
    pub habit_id: u64,
    pub window: AnalysisWindow,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub stale: bool,
}
