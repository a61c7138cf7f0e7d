//! Agents and their goal-directed execution loop

#[allow(clippy::module_inception)]
mod agent;
mod goal_loop;
mod retry;

pub use agent::{Agent, BUSY_MESSAGE, Reply};
pub use goal_loop::{
    AgentProfile, CLARIFICATION_MESSAGE, CycleOutcome, CycleState, DEFAULT_GOAL, GoalLoop, GoalLoopConfig,
    MAX_ITERATIONS_SENTINEL,
};
pub use retry::{RetryOutcome, RetryPolicy};
