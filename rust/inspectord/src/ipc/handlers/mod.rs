pub mod backup;
pub mod core;
pub mod eligibility;
pub mod reports;
pub mod setup;
pub mod sheet;
pub mod sync;
pub mod teachers;
