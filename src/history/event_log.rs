//! Append-only, timestamp-ordered event history for one agent.

use std::collections::VecDeque;

use crate::domain::Event;

/// Ordered record of everything an agent has observed or done.
///
/// Events are stored in insertion order; every read view sorts them by
/// timestamp (stable, so equal timestamps keep insertion order). The
/// narrative is a pure projection of the current contents.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: VecDeque<Event>,
    capacity_limit: Option<usize>,
}

impl EventLog {
    /// Create an empty, unbounded log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that drops its oldest events beyond `limit`
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity_limit: Some(limit.max(1)),
        }
    }

    /// Append an event
    pub fn append(&mut self, event: Event) {
        self.events.push_back(event);
        if let Some(limit) = self.capacity_limit {
            while self.events.len() > limit {
                self.events.pop_front();
            }
        }
    }

    /// Append several events in order
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.append(event);
        }
    }

    /// Number of events held
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log holds no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn sorted(&self) -> Vec<&Event> {
        let mut ordered: Vec<&Event> = self.events.iter().collect();
        ordered.sort_by_key(|e| e.timestamp);
        ordered
    }

    /// The `n` most recently timestamped events, newest first
    pub fn recent(&self, n: usize) -> Vec<&Event> {
        let mut ordered = self.sorted();
        ordered.reverse();
        ordered.truncate(n);
        ordered
    }

    /// Events in ascending timestamp order
    pub fn iter_ordered(&self) -> impl Iterator<Item = &Event> + '_ {
        self.sorted().into_iter()
    }

    /// Lazily rendered narrative lines, oldest first
    pub fn narrative_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.iter_ordered().map(Event::render)
    }

    /// Newline-joined narrative text
    pub fn narrative(&self) -> String {
        self.narrative_lines().collect::<Vec<_>>().join("\n")
    }
}
