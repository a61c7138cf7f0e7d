//! Plan persistence: the store port plus file-backed and in-memory stores.

mod json;
mod memory;
mod plan_store;

pub use json::JsonPlanStore;
pub use memory::InMemoryPlanStore;
pub use plan_store::PlanStore;
