pub mod date_utils;
pub mod eligibility;
pub mod engine;
pub mod scoring;
pub mod types;
pub mod window;

pub use date_utils::{format_day, window_dates};
pub use eligibility::{is_excluded, Ineligibility};
pub use engine::{allocate, plan_day};
pub use scoring::{AllocationHistory, UserHistory, DEFAULT_TRAILING_DAYS};
pub use types::{Candidate, DayPlan, Rejection};
pub use window::{DayOutcome, WindowReport, WindowRunner};
