//! Append-only expense ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ledger entry. Immutable once created: corrections are modeled as a new
/// compensating entry, never an in-place edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: u64,
    pub user_id: i64,
    /// Always > 0; validated before insertion.
    pub amount: f64,
    /// Normalized lowercase category ("food", "transport", ...).
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

/// Normalize a free-form category the way the classifier may emit it.
pub fn normalize_category(raw: &str) -> String {
    let c = raw.trim().to_lowercase();
    if c.is_empty() { "other".to_string() } else { c }
}
