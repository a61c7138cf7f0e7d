//! Domain types shared across the agent core
//!
//! - Event: immutable history entries owned by an agent's event log
//! - ActionDescriptor / ActionOutcome / ActionRecord: what an agent asked for,
//!   what happened, and the per-cycle record of it
//! - InboundMessage / AgentMessage: messages that start a goal cycle

pub mod action;
pub mod event;
pub mod message;

pub use action::{ActionDescriptor, ActionOutcome, ActionParams, ActionRecord};
pub use event::{Event, EventType};
pub use message::{AgentMessage, InboundMessage};
