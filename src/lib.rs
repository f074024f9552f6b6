//! Weekly school timetable generation.
//!
//! Given which teachers are free when, which subjects each section needs and
//! how often, and which (day, period) slots each section is in session, the
//! crate assigns every weekly lesson a teacher and a slot without double
//! booking anyone, then optionally improves the result against soft
//! preferences.
//!
//! - **`constraints`**: hard constraint predicates and full-schedule validation
//! - **`demand`**: expansion into weekly lessons, hardest first
//! - **`solver`**: greedy placement and bounded backtracking enumeration
//! - **`advisor`**: availability suggestions when lessons cannot be placed
//! - **`optimizer`**: scoring and local search
//! - **`generator`**: one transactional run against a `ScheduleStore`
//! - **`export`**: section and teacher timetable views

pub mod advisor;
pub mod config;
pub mod constraints;
pub mod data;
pub mod demand;
pub mod error;
pub mod export;
pub mod generator;
pub mod optimizer;
pub mod solver;
pub mod status;
pub mod store;
pub mod validation;

pub use config::GenerationConfig;
pub use data::{Assignment, GenerationResult, Snapshot, Suggestion};
pub use error::{SchedulerError, SchedulerResult};
pub use generator::{GenerationJob, ScheduleGenerator};
pub use status::{GenerationStatus, Phase, StatusReporter};
pub use store::{InMemoryStore, ScheduleStore};
