//! Plans: the Level/Task model and synthesis from a task description

mod model;
mod synthesis;

pub use model::{Level, Plan, Status, Task};
pub use synthesis::{DEFAULT_AGENT_TYPE, PLANNER_SYSTEM, PlanSynthesizer, plan_from_value};
