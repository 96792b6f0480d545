//! Event Machine
//!
//! Owns every pool and unscheduled queue of one benchmark environment and
//! exposes the event API as methods. All state is owned by a single thread;
//! handles ([`Event`], [`PoolId`], [`QueueId`]) are plain values validated on
//! each call.

use crate::error::EmError;
use crate::event::{Event, EventType, TypeTag, UareaInfo, VectorInfo};
use crate::pool::{EventPool, PoolConfig, PoolId, PoolStats, Slot, copy_slot};
use crate::queue::{QueueId, UnschedQueue};
use evbench_core::ResourcePool;
use tracing::{debug, warn};

/// Pools per machine
pub const MAX_POOLS: usize = 16;

/// Unscheduled queues per machine
pub const MAX_QUEUES: usize = 64;

/// In-memory event machine
#[derive(Debug)]
pub struct EventMachine {
    pools: Vec<Option<EventPool>>,
    queues: Vec<Option<UnschedQueue>>,
    core_id: u32,
    core_count: u32,
}

impl Default for EventMachine {
    fn default() -> Self {
        Self::new(1)
    }
}

impl EventMachine {
    /// Machine spanning `core_count` cores, running on core 0
    pub fn new(core_count: u32) -> Self {
        Self {
            pools: Vec::new(),
            queues: Vec::new(),
            core_id: 0,
            core_count: core_count.max(1),
        }
    }

    /// Bind the calling context to a core
    pub fn set_core_id(&mut self, core_id: u32) {
        self.core_id = core_id.min(self.core_count - 1);
    }

    /// Core the caller runs on
    #[inline]
    pub fn core_id(&self) -> u32 {
        self.core_id
    }

    /// Cores in the machine
    #[inline]
    pub fn core_count(&self) -> u32 {
        self.core_count
    }

    // ─── Pools ───────────────────────────────────────────────────────────

    /// Create a named pool
    pub fn pool_create(&mut self, name: &str, config: &PoolConfig) -> Result<PoolId, EmError> {
        if self.pool_find(name).is_some() {
            return Err(EmError::PoolExists(name.to_string()));
        }

        let index = match self.pools.iter().position(Option::is_none) {
            Some(free) => free,
            None if self.pools.len() < MAX_POOLS => {
                self.pools.push(None);
                self.pools.len() - 1
            }
            None => return Err(EmError::TooManyPools { max: MAX_POOLS }),
        };

        let id = PoolId(index as u16);
        let pool = EventPool::new(id, name, config)?;
        debug!(%id, name, event_type = %config.event_type, events = pool.capacity(), "pool created");
        self.pools[index] = Some(pool);
        Ok(id)
    }

    /// Delete a pool. Fails while any of its events is outstanding.
    pub fn pool_delete(&mut self, id: PoolId) -> Result<(), EmError> {
        let pool = self.pool(id)?;
        if pool.outstanding() > 0 {
            return Err(EmError::PoolBusy {
                pool: id,
                outstanding: pool.outstanding(),
            });
        }
        debug!(%id, name = pool.name(), "pool deleted");
        self.pools[id.index()] = None;
        Ok(())
    }

    /// Look a pool up by name
    pub fn pool_find(&self, name: &str) -> Option<PoolId> {
        self.pools.iter().flatten().find(|p| p.name() == name).map(EventPool::id)
    }

    /// Number of live pools
    pub fn pool_count(&self) -> usize {
        self.pools.iter().flatten().count()
    }

    /// Borrow a pool
    pub fn pool(&self, id: PoolId) -> Result<&EventPool, EmError> {
        self.pools
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(EmError::UnknownPool(id))
    }

    /// Usage snapshot of a pool
    pub fn pool_info(&self, id: PoolId) -> Result<PoolStats, EmError> {
        self.pool(id).map(EventPool::stats)
    }

    fn pool_mut(&mut self, id: PoolId) -> Result<&mut EventPool, EmError> {
        self.pools
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(EmError::UnknownPool(id))
    }

    fn slot(&self, event: Event) -> Result<&Slot, EmError> {
        self.pools
            .get(event.pool.index())
            .and_then(Option::as_ref)
            .ok_or(EmError::InvalidEvent)?
            .slot(event)
    }

    fn slot_mut(&mut self, event: Event) -> Result<&mut Slot, EmError> {
        self.pools
            .get_mut(event.pool.index())
            .and_then(Option::as_mut)
            .ok_or(EmError::InvalidEvent)?
            .slot_mut(event)
    }

    /// Adapter exposing one pool to the resource provisioner
    pub fn provision(&mut self, pool: PoolId) -> PoolLease<'_> {
        PoolLease { em: self, pool }
    }

    // ─── Alloc / free ────────────────────────────────────────────────────

    /// Allocate one event
    #[inline]
    pub fn alloc(&mut self, size: usize, event_type: EventType, pool: PoolId) -> Result<Event, EmError> {
        let mut got = None;
        self.pool_mut(pool)?
            .alloc_into(size, event_type, 1, |e| got = Some(e))?;
        got.ok_or(EmError::PoolExhausted(pool))
    }

    /// Fill `out` from the front with up to `out.len()` events.
    ///
    /// Returns the number allocated; `Ok(0)` means the pool is empty.
    #[inline]
    pub fn alloc_multi(
        &mut self,
        out: &mut [Option<Event>],
        size: usize,
        event_type: EventType,
        pool: PoolId,
    ) -> Result<usize, EmError> {
        let num = out.len();
        let mut slots = out.iter_mut();
        self.pool_mut(pool)?.alloc_into(size, event_type, num, |e| {
            if let Some(slot) = slots.next() {
                *slot = Some(e);
            }
        })
    }

    /// Free an event (or drop one packet reference).
    ///
    /// Freeing a vector also frees the events in its table.
    #[inline]
    pub fn free(&mut self, event: Event) -> Result<(), EmError> {
        let slot = self.slot_mut(event)?;
        let contents: Vec<Event> = if slot.refs == 1 && slot.vector_size > 0 {
            let size = slot.vector_size;
            slot.vector[..size].iter_mut().filter_map(Option::take).collect()
        } else {
            Vec::new()
        };

        self.pool_mut(event.pool)?.release(event)?;

        for inner in contents {
            self.free(inner)?;
        }
        Ok(())
    }

    /// Free every valid entry, leaving the slots empty
    #[inline]
    pub fn free_multi(&mut self, events: &mut [Option<Event>]) -> Result<(), EmError> {
        for slot in events {
            if let Some(event) = slot.take() {
                self.free(event)?;
            }
        }
        Ok(())
    }

    // ─── Event metadata ──────────────────────────────────────────────────

    /// Payload of an event, `get_size` bytes long
    #[inline]
    pub fn event_pointer(&mut self, event: Event) -> Result<&mut [u8], EmError> {
        let slot = self.slot_mut(event)?;
        if slot.tag.major == Some(EventType::Vector) {
            return Err(EmError::NotSupported {
                op: "event_pointer",
                event_type: EventType::Vector,
            });
        }
        let size = slot.size;
        Ok(&mut slot.data[..size])
    }

    /// Size requested at allocation (vector: max table size requested)
    #[inline]
    pub fn get_size(&self, event: Event) -> Result<usize, EmError> {
        self.slot(event).map(|s| s.size)
    }

    /// Full type of an event
    #[inline]
    pub fn get_type(&self, event: Event) -> Result<TypeTag, EmError> {
        self.slot(event).map(|s| s.tag)
    }

    /// Types of the leading valid events; stops at the first invalid one
    #[inline]
    pub fn get_type_multi(&self, events: &[Option<Event>], out: &mut [TypeTag]) -> usize {
        let mut n = 0;
        for (event, tag) in events.iter().zip(out.iter_mut()) {
            match event.map(|e| self.get_type(e)) {
                Some(Ok(t)) => *tag = t,
                _ => break,
            }
            n += 1;
        }
        n
    }

    /// Number of leading events sharing the first event's type, and that type
    #[inline]
    pub fn same_type_multi(&self, events: &[Option<Event>]) -> (usize, TypeTag) {
        let mut iter = events.iter().map(|e| e.map(|e| self.get_type(e)));
        let Some(Some(Ok(first))) = iter.next() else {
            return (0, TypeTag::default());
        };
        let same = iter
            .take_while(|t| matches!(t, Some(Ok(t)) if *t == first))
            .count();
        (same + 1, first)
    }

    /// Change the subtype; the major type is fixed by the pool
    #[inline]
    pub fn set_type(&mut self, event: Event, major: EventType, minor: u8) -> Result<(), EmError> {
        let slot = self.slot_mut(event)?;
        match slot.tag.major {
            Some(current) if current == major => {
                slot.tag.minor = minor;
                Ok(())
            }
            Some(current) => Err(EmError::TypeMismatch {
                requested: major,
                pool_type: current,
            }),
            None => Err(EmError::InvalidEvent),
        }
    }

    /// Pool an event belongs to
    #[inline]
    pub fn get_pool(&self, event: Event) -> Result<PoolId, EmError> {
        self.slot(event).map(|_| event.pool)
    }

    // ─── User area ───────────────────────────────────────────────────────

    /// User area of an event (empty if the pool has none)
    #[inline]
    pub fn uarea_get(&mut self, event: Event) -> Result<&mut [u8], EmError> {
        self.slot_mut(event).map(|s| s.uarea.as_mut_slice())
    }

    /// Tag the user area with an id
    #[inline]
    pub fn uarea_id_set(&mut self, event: Event, id: u16) -> Result<(), EmError> {
        self.slot_mut(event).map(|s| s.uarea_id = Some(id))
    }

    /// User area id, `None` if never set since allocation
    #[inline]
    pub fn uarea_id_get(&self, event: Event) -> Result<Option<u16>, EmError> {
        self.slot(event).map(|s| s.uarea_id)
    }

    /// Size and id of the user area in one call
    #[inline]
    pub fn uarea_info(&self, event: Event) -> Result<UareaInfo, EmError> {
        self.slot(event).map(|s| UareaInfo {
            size: s.uarea.len(),
            id: s.uarea_id,
        })
    }

    // ─── Clone / references ──────────────────────────────────────────────

    /// New event with a copy of the payload and user area, allocated from
    /// `pool` or, when `None`, from the source event's pool.
    pub fn clone_event(&mut self, event: Event, pool: Option<PoolId>) -> Result<Event, EmError> {
        let (size, major) = {
            let slot = self.slot(event)?;
            (slot.size, slot.tag.major.ok_or(EmError::InvalidEvent)?)
        };
        if major == EventType::Vector {
            return Err(EmError::NotSupported {
                op: "clone",
                event_type: major,
            });
        }

        let target = pool.unwrap_or(event.pool);
        let copy = self.alloc(size, major, target)?;

        let copied = if target == event.pool {
            self.pool_mut(target)?.copy_within(event, copy)
        } else {
            self.two_pools(event.pool, target).and_then(|(src, dst)| {
                copy_slot(src.slot(event)?, dst.slot_mut(copy)?);
                Ok(())
            })
        };

        if let Err(e) = copied {
            self.free(copy)?;
            return Err(e);
        }
        Ok(copy)
    }

    fn two_pools(&mut self, a: PoolId, b: PoolId) -> Result<(&EventPool, &mut EventPool), EmError> {
        let (ia, ib) = (a.index(), b.index());
        let missing = |id| move || EmError::UnknownPool(id);
        if ia < ib {
            let (lo, hi) = self.pools.split_at_mut(ib);
            let src = lo[ia].as_ref().ok_or_else(missing(a))?;
            let dst = hi.first_mut().and_then(Option::as_mut).ok_or_else(missing(b))?;
            Ok((src, dst))
        } else {
            let (lo, hi) = self.pools.split_at_mut(ia);
            let dst = lo.get_mut(ib).and_then(Option::as_mut).ok_or_else(missing(b))?;
            let src = hi.first().and_then(Option::as_ref).ok_or_else(missing(a))?;
            Ok((src, dst))
        }
    }

    /// Add a reference to a packet. Each reference is released with `free`.
    #[inline]
    pub fn event_ref(&mut self, event: Event) -> Result<Event, EmError> {
        let slot = self.slot_mut(event)?;
        if slot.tag.major != Some(EventType::Packet) {
            return Err(EmError::NotSupported {
                op: "ref",
                event_type: slot.tag.major.unwrap_or(EventType::Sw),
            });
        }
        slot.refs += 1;
        Ok(event)
    }

    /// Whether more than one reference to the event exists
    #[inline]
    pub fn has_ref(&self, event: Event) -> Result<bool, EmError> {
        self.slot(event).map(|s| s.refs > 1)
    }

    // ─── Vectors ─────────────────────────────────────────────────────────

    fn vector_slot(&self, event: Event, op: &'static str) -> Result<&Slot, EmError> {
        let slot = self.slot(event)?;
        match slot.tag.major {
            Some(EventType::Vector) => Ok(slot),
            Some(other) => Err(EmError::NotSupported { op, event_type: other }),
            None => Err(EmError::InvalidEvent),
        }
    }

    fn vector_slot_mut(&mut self, event: Event, op: &'static str) -> Result<&mut Slot, EmError> {
        self.vector_slot(event, op)?;
        self.slot_mut(event)
    }

    /// Free a vector without touching the events in its table
    pub fn vector_free(&mut self, event: Event) -> Result<(), EmError> {
        let slot = self.vector_slot_mut(event, "vector_free")?;
        slot.vector.fill(None);
        slot.vector_size = 0;
        self.pool_mut(event.pool)?.release(event).map(|_| ())
    }

    /// Number of valid table entries
    #[inline]
    pub fn vector_size(&self, event: Event) -> Result<usize, EmError> {
        self.vector_slot(event, "vector_size").map(|s| s.vector_size)
    }

    /// Set the number of valid table entries
    #[inline]
    pub fn vector_size_set(&mut self, event: Event, size: usize) -> Result<(), EmError> {
        let slot = self.vector_slot_mut(event, "vector_size_set")?;
        if size > slot.vector.len() {
            return Err(EmError::VectorSize {
                size,
                max: slot.vector.len(),
            });
        }
        slot.vector_size = size;
        Ok(())
    }

    /// Table capacity
    #[inline]
    pub fn vector_max_size(&self, event: Event) -> Result<usize, EmError> {
        self.vector_slot(event, "vector_max_size").map(|s| s.vector.len())
    }

    /// Current size and the whole table
    #[inline]
    pub fn vector_tbl(&mut self, event: Event) -> Result<(usize, &mut [Option<Event>]), EmError> {
        let slot = self.vector_slot_mut(event, "vector_tbl")?;
        Ok((slot.vector_size, slot.vector.as_mut_slice()))
    }

    /// Size and capacity in one call
    #[inline]
    pub fn vector_info(&self, event: Event) -> Result<VectorInfo, EmError> {
        self.vector_slot(event, "vector_info").map(|s| VectorInfo {
            size: s.vector_size,
            max_size: s.vector.len(),
        })
    }

    // ─── Unscheduled queues ──────────────────────────────────────────────

    /// Create a queue able to hold at least `min_events` events
    pub fn queue_create(&mut self, name: &str, min_events: usize) -> Result<QueueId, EmError> {
        let index = match self.queues.iter().position(Option::is_none) {
            Some(free) => free,
            None if self.queues.len() < MAX_QUEUES => {
                self.queues.push(None);
                self.queues.len() - 1
            }
            None => return Err(EmError::TooManyQueues { max: MAX_QUEUES }),
        };
        let queue = UnschedQueue::new(name, min_events);
        let id = QueueId(index as u16);
        debug!(%id, name, capacity = queue.capacity(), "queue created");
        self.queues[index] = Some(queue);
        Ok(id)
    }

    /// Delete an empty queue
    pub fn queue_delete(&mut self, id: QueueId) -> Result<(), EmError> {
        let queue = self.queue_mut(id)?;
        if queue.len() > 0 {
            let len = queue.len();
            warn!(%id, name = %queue.name, len, "refusing to delete non-empty queue");
            return Err(EmError::QueueNotEmpty { queue: id, len });
        }
        self.queues[id.0 as usize] = None;
        debug!(%id, "queue deleted");
        Ok(())
    }

    /// Events currently queued
    pub fn queue_len(&self, id: QueueId) -> Result<usize, EmError> {
        self.queues
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .map(UnschedQueue::len)
            .ok_or(EmError::UnknownQueue(id))
    }

    fn queue_mut(&mut self, id: QueueId) -> Result<&mut UnschedQueue, EmError> {
        self.queues
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(EmError::UnknownQueue(id))
    }

    /// Enqueue an event. On error the event still belongs to the caller.
    #[inline]
    pub fn send(&mut self, event: Event, queue: QueueId) -> Result<(), EmError> {
        self.slot(event)?;
        self.queue_mut(queue)?
            .push(event)
            .map_err(|_| EmError::QueueFull(queue))
    }

    /// Enqueue the leading valid events, taking them out of `events`.
    /// Stops at the first empty slot or when the queue fills up.
    #[inline]
    pub fn send_multi(&mut self, events: &mut [Option<Event>], queue: QueueId) -> Result<usize, EmError> {
        self.queue_mut(queue)?;
        let mut sent = 0;
        for slot in events {
            let Some(event) = *slot else { break };
            if self.slot(event).is_err() {
                break;
            }
            if self.queue_mut(queue)?.push(event).is_err() {
                break;
            }
            *slot = None;
            sent += 1;
        }
        Ok(sent)
    }

    /// Dequeue one event, `None` when empty
    #[inline]
    pub fn dequeue(&mut self, queue: QueueId) -> Result<Option<Event>, EmError> {
        self.queue_mut(queue).map(UnschedQueue::pop)
    }

    /// Dequeue into `out` from the front; returns the count
    #[inline]
    pub fn dequeue_multi(&mut self, queue: QueueId, out: &mut [Option<Event>]) -> Result<usize, EmError> {
        let q = self.queue_mut(queue)?;
        let mut n = 0;
        for slot in out {
            let Some(event) = q.pop() else { break };
            *slot = Some(event);
            n += 1;
        }
        Ok(n)
    }
}

/// One pool of an [`EventMachine`] seen through the provisioner seam
pub struct PoolLease<'a> {
    em: &'a mut EventMachine,
    pool: PoolId,
}

impl ResourcePool for PoolLease<'_> {
    type Resource = Event;
    type Kind = EventType;
    type Error = EmError;

    fn alloc_batch(
        &mut self,
        kind: EventType,
        size: usize,
        max: usize,
        out: &mut Vec<Event>,
    ) -> Result<usize, EmError> {
        self.em
            .pool_mut(self.pool)?
            .alloc_into(size, kind, max, |e| out.push(e))
    }

    fn free(&mut self, resource: Event) {
        if let Err(e) = self.em.free(resource) {
            warn!(pool = %self.pool, error = %e, "release of provisioned event failed");
        }
    }
}
