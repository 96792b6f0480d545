//! Event machine error codes

use crate::event::EventType;
use crate::pool::PoolId;
use crate::queue::QueueId;
use thiserror::Error;

/// Errors returned by [`EventMachine`](crate::EventMachine) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmError {
    #[error("Invalid pool config: {0}")]
    BadPoolConfig(&'static str),

    #[error("Pool name already in use: {0}")]
    PoolExists(String),

    #[error("Too many pools (max {max})")]
    TooManyPools { max: usize },

    #[error("Unknown pool: {0}")]
    UnknownPool(PoolId),

    #[error("Pool {pool} busy: {outstanding} events outstanding")]
    PoolBusy { pool: PoolId, outstanding: usize },

    #[error("Pool {0} exhausted")]
    PoolExhausted(PoolId),

    #[error("Event type {requested} does not match pool type {pool_type}")]
    TypeMismatch {
        requested: EventType,
        pool_type: EventType,
    },

    #[error("Requested size {size} exceeds largest subpool ({max})")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid or stale event handle")]
    InvalidEvent,

    #[error("{op} not supported for {event_type} events")]
    NotSupported {
        op: &'static str,
        event_type: EventType,
    },

    #[error("Vector size {size} exceeds max size {max}")]
    VectorSize { size: usize, max: usize },

    #[error("Unknown queue: {0}")]
    UnknownQueue(QueueId),

    #[error("Too many queues (max {max})")]
    TooManyQueues { max: usize },

    #[error("Queue {0} full")]
    QueueFull(QueueId),

    #[error("Queue {queue} not empty: {len} events queued")]
    QueueNotEmpty { queue: QueueId, len: usize },
}
