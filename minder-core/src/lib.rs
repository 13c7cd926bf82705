//! minder-core: Domain types and algorithms for the Minder assistant engine.
//!
//! Pure, synchronous, and clock-free: every time-dependent operation takes
//! `now` explicitly so the async layer (and tests) control time.

pub mod error;
pub mod expense;
pub mod habit;
pub mod recommend;
pub mod recommendation;
pub mod resolve;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod time;

pub use error::{DomainError, DomainResult};
pub use expense::{Expense, normalize_category};
pub use habit::{CheckInResult, Frequency, Habit, HabitCheckIn, Streaks, compute_streaks};
pub use recommend::{RecommendPolicy, evaluate};
pub use recommendation::{AnalysisWindow, Recommendation};
pub use resolve::resolve_name;
pub use scheduler::{DueNotification, ReminderPolicy, ReminderScheduler, WakeKind};
pub use store::{HabitSummary, StatusSummary, TaskSummary, UserStore};
pub use task::{ReminderState, Task, TaskStatus};
pub use time::{parse_local_deadline_to_utc, resolve_timezone};
