//! Record-keeping core for school inspectors: a tabular mirror of teachers
//! and their inspection reports, the eligibility rules run over them, and
//! the sidecar that serves both to the desktop shell.

pub mod backup;
pub mod db;
pub mod eligibility;
pub mod ipc;
pub mod model;
pub mod normalize;
pub mod schema;
pub mod sheet;
pub mod sync;
