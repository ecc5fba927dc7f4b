//! Office attendance and parking-space allocation.
//!
//! Users record the days they plan to be in the office; an allocation run assigns parking
//! spaces for every day of the upcoming window, balancing fairness against attendance.

pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod model;
pub mod parser;
pub mod schedule;
pub mod settings;
pub mod store;
pub mod web;

pub use error::{AllocationError, AppError, Result};
pub use settings::{AllocationSettings, ValidatedSettings};
