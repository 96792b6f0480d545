#![warn(missing_docs)]
//! Evbench Pool - Event Machine Model
//!
//! Single-threaded model of an event API whose calls the benchmark suite
//! measures:
//! - Typed pools (`sw`, `pkt`, `vect`) with subpools and user areas
//! - Event metadata: size, type, pool, user area id
//! - Packet references and event cloning
//! - Vector events holding tables of other events
//! - Bounded unscheduled queues

mod error;
mod event;
mod machine;
mod pool;
mod queue;

pub use error::EmError;
pub use event::{Event, EventType, TypeTag, UareaInfo, VectorInfo};
pub use machine::{EventMachine, MAX_POOLS, MAX_QUEUES, PoolLease};
pub use pool::{
    EventPool, MAX_SUBPOOLS, MAX_USER_AREA, PoolConfig, PoolId, PoolStats, SubpoolConfig,
    SubpoolStats,
};
pub use queue::{DEFAULT_QUEUE_CAPACITY, QueueId};
