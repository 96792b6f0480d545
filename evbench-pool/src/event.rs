//! Event handles and per-event metadata

use crate::pool::PoolId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Major event type. Fixed per pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Software event with a flat payload
    Sw,
    /// Packet; supports references
    Packet,
    /// Table of other event handles
    Vector,
}

impl EventType {
    /// Short form used in case names: `sw`, `pkt`, `vect`
    pub fn short(self) -> &'static str {
        match self {
            EventType::Sw => "sw",
            EventType::Packet => "pkt",
            EventType::Vector => "vect",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// Full type of a live event: the pool's major type plus a user subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeTag {
    /// Major type
    pub major: Option<EventType>,
    /// User-assigned subtype
    pub minor: u8,
}

impl TypeTag {
    pub(crate) fn new(major: EventType, minor: u8) -> Self {
        Self {
            major: Some(major),
            minor,
        }
    }
}

/// Handle to an allocated event.
///
/// Handles are plain values: copying one does not create a reference.
/// A handle goes stale once its event is freed; using it afterwards yields
/// [`EmError::InvalidEvent`](crate::EmError::InvalidEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event {
    pub(crate) pool: PoolId,
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl Event {
    /// Pool the event was allocated from
    pub fn pool(&self) -> PoolId {
        self.pool
    }
}

/// Result of [`EventMachine::uarea_info`](crate::EventMachine::uarea_info)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UareaInfo {
    /// User area size in bytes (0 = none)
    pub size: usize,
    /// User area id, if one was set
    pub id: Option<u16>,
}

/// Result of [`EventMachine::vector_info`](crate::EventMachine::vector_info)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VectorInfo {
    /// Number of valid entries in the table
    pub size: usize,
    /// Table capacity
    pub max_size: usize,
}
