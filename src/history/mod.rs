//! Agent history: the event log and its narrative rendering.

mod event_log;

pub use event_log::EventLog;
