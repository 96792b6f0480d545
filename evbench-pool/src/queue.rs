//! Unscheduled queues: bounded FIFOs the application polls directly

use crate::event::Event;
use std::collections::VecDeque;
use std::fmt;

/// Capacity used when a queue is created with `min_events == 0`
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Handle to a queue owned by an [`EventMachine`](crate::EventMachine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(pub(crate) u16);

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct UnschedQueue {
    pub name: String,
    capacity: usize,
    events: VecDeque<Event>,
}

impl UnschedQueue {
    pub fn new(name: &str, min_events: usize) -> Self {
        let capacity = if min_events == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            min_events
        };
        Self {
            name: name.to_string(),
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue unless full; a full queue hands the event back
    pub fn push(&mut self, event: Event) -> Result<(), Event> {
        if self.events.len() >= self.capacity {
            return Err(event);
        }
        self.events.push_back(event);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }
}
