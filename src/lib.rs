//! Arcane - goal-directed agents and a level-barrier plan executor
//!
//! Each agent runs a bounded goal loop per inbound message: set a goal, pick
//! one action, execute it, check whether the goal is achieved, repeat. Complex
//! tasks are delegated to a plan executor that runs ordered levels of
//! independent tasks with disposable worker loops.

pub mod actions;
pub mod agent;
pub mod domain;
pub mod error;
pub mod executor;
pub mod history;
pub mod id;
pub mod llm;
pub mod plan;
pub mod prompt;
pub mod storage;

pub use error::{ArcaneError, Result};
