//! Event Pools
//!
//! A pool owns a fixed number of event slots split across up to
//! [`MAX_SUBPOOLS`] subpools of increasing buffer size. Allocation takes the
//! smallest subpool that fits the requested size and falls through to larger
//! ones when it is empty. Payload buffers are created on first use and kept
//! across frees, so steady-state alloc/free does not touch the heap.

use crate::error::EmError;
use crate::event::{Event, EventType, TypeTag};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subpools per pool
pub const MAX_SUBPOOLS: usize = 4;

/// Largest user area per event, in bytes
pub const MAX_USER_AREA: usize = 256;

/// Handle to a pool owned by an [`EventMachine`](crate::EventMachine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(pub(crate) u16);

impl PoolId {
    /// Position of the pool in the machine's pool table
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// One subpool: `num` events of up to `size` bytes (or table entries)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubpoolConfig {
    /// Buffer size in bytes; max table length for vector pools
    pub size: usize,
    /// Number of events
    pub num: usize,
    /// Per-core cache hint (`None` = pool default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<u32>,
}

/// Pool creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Major type of every event in the pool
    pub event_type: EventType,
    /// User area bytes per event (0 = none)
    #[serde(default)]
    pub user_area_size: usize,
    /// Subpools, any order; sorted by size at creation
    pub subpools: Vec<SubpoolConfig>,
}

impl PoolConfig {
    /// Single-subpool config
    pub fn new(event_type: EventType, size: usize, num: usize) -> Self {
        Self {
            event_type,
            user_area_size: 0,
            subpools: vec![SubpoolConfig {
                size,
                num,
                cache_size: None,
            }],
        }
    }

    /// Set the user area size
    pub fn with_user_area(mut self, size: usize) -> Self {
        self.user_area_size = size;
        self
    }

    /// Set the cache hint on every subpool
    pub fn with_cache_size(mut self, cache_size: Option<u32>) -> Self {
        for subpool in &mut self.subpools {
            subpool.cache_size = cache_size;
        }
        self
    }

    /// Check limits before creation
    pub fn validate(&self) -> Result<(), EmError> {
        if self.subpools.is_empty() || self.subpools.len() > MAX_SUBPOOLS {
            return Err(EmError::BadPoolConfig("subpool count out of range"));
        }
        if self.subpools.iter().any(|s| s.size == 0) {
            return Err(EmError::BadPoolConfig("subpool size must be > 0"));
        }
        if self.subpools.iter().any(|s| s.num == 0) {
            return Err(EmError::BadPoolConfig("subpool event count must be > 0"));
        }
        if self.user_area_size > MAX_USER_AREA {
            return Err(EmError::BadPoolConfig("user area too large"));
        }
        Ok(())
    }
}

/// Usage snapshot of one subpool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubpoolStats {
    /// Buffer size
    pub size: usize,
    /// Total events
    pub num: usize,
    /// Events currently allocated
    pub used: usize,
    /// Cache hint given at creation
    pub cache_size: Option<u32>,
}

/// Usage snapshot of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Pool name
    pub name: String,
    /// Major type
    pub event_type: EventType,
    /// User area bytes per event
    pub user_area_size: usize,
    /// Per-subpool usage, ascending size
    pub subpools: Vec<SubpoolStats>,
}

#[derive(Debug)]
struct Subpool {
    size: usize,
    num: usize,
    cache_size: Option<u32>,
    free: Vec<u32>,
}

#[derive(Debug)]
pub(crate) struct Slot {
    pub generation: u32,
    pub live: bool,
    pub subpool: u8,
    pub tag: TypeTag,
    pub size: usize,
    pub refs: u32,
    pub uarea_id: Option<u16>,
    pub data: Vec<u8>,
    pub uarea: Vec<u8>,
    pub vector: Vec<Option<Event>>,
    pub vector_size: usize,
}

/// A typed event pool
#[derive(Debug)]
pub struct EventPool {
    id: PoolId,
    name: String,
    event_type: EventType,
    user_area_size: usize,
    subpools: Vec<Subpool>,
    slots: Vec<Slot>,
    outstanding: usize,
}

impl EventPool {
    pub(crate) fn new(id: PoolId, name: &str, config: &PoolConfig) -> Result<Self, EmError> {
        config.validate()?;

        let mut sorted = config.subpools.clone();
        sorted.sort_by_key(|s| s.size);

        let mut subpools = Vec::with_capacity(sorted.len());
        let mut slots = Vec::with_capacity(sorted.iter().map(|s| s.num).sum());

        for (idx, sub) in sorted.iter().enumerate() {
            let first = slots.len() as u32;
            for _ in 0..sub.num {
                slots.push(Slot {
                    generation: 0,
                    live: false,
                    subpool: idx as u8,
                    tag: TypeTag::default(),
                    size: 0,
                    refs: 0,
                    uarea_id: None,
                    data: Vec::new(),
                    uarea: Vec::new(),
                    vector: Vec::new(),
                    vector_size: 0,
                });
            }
            // Reverse so that pops hand out ascending slots.
            let free = (first..first + sub.num as u32).rev().collect();
            subpools.push(Subpool {
                size: sub.size,
                num: sub.num,
                cache_size: sub.cache_size,
                free,
            });
        }

        Ok(Self {
            id,
            name: name.to_string(),
            event_type: config.event_type,
            user_area_size: config.user_area_size,
            subpools,
            slots,
            outstanding: 0,
        })
    }

    /// Pool handle
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Major type of every event in this pool
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Total events across subpools
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Events currently allocated
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Largest subpool buffer size
    pub fn max_size(&self) -> usize {
        self.subpools.last().map_or(0, |s| s.size)
    }

    /// Usage snapshot
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            name: self.name.clone(),
            event_type: self.event_type,
            user_area_size: self.user_area_size,
            subpools: self
                .subpools
                .iter()
                .map(|s| SubpoolStats {
                    size: s.size,
                    num: s.num,
                    used: s.num - s.free.len(),
                    cache_size: s.cache_size,
                })
                .collect(),
        }
    }

    /// Allocate up to `num` events of `size`, handing each to `sink`.
    /// Returns how many were allocated; 0 when every fitting subpool is empty.
    pub(crate) fn alloc_into(
        &mut self,
        size: usize,
        event_type: EventType,
        num: usize,
        mut sink: impl FnMut(Event),
    ) -> Result<usize, EmError> {
        if event_type != self.event_type {
            return Err(EmError::TypeMismatch {
                requested: event_type,
                pool_type: self.event_type,
            });
        }
        let first_fit = self
            .subpools
            .iter()
            .position(|s| s.size >= size)
            .ok_or(EmError::TooLarge {
                size,
                max: self.max_size(),
            })?;

        let mut done = 0;
        for sp in first_fit..self.subpools.len() {
            while done < num {
                let Some(slot_idx) = self.subpools[sp].free.pop() else {
                    break;
                };
                sink(self.activate(slot_idx, sp, size));
                done += 1;
            }
            if done == num {
                break;
            }
        }

        self.outstanding += done;
        Ok(done)
    }

    fn activate(&mut self, slot_idx: u32, sp: usize, size: usize) -> Event {
        let buf_size = self.subpools[sp].size;
        let event_type = self.event_type;
        let uarea_size = self.user_area_size;
        let slot = &mut self.slots[slot_idx as usize];

        match event_type {
            EventType::Vector => {
                if slot.vector.len() != buf_size {
                    slot.vector.resize(buf_size, None);
                }
                slot.vector_size = 0;
            }
            EventType::Sw | EventType::Packet => {
                if slot.data.len() != buf_size {
                    slot.data.resize(buf_size, 0);
                }
            }
        }
        if slot.uarea.len() != uarea_size {
            slot.uarea.resize(uarea_size, 0);
        }

        slot.live = true;
        slot.tag = TypeTag::new(event_type, 0);
        slot.size = size;
        slot.refs = 1;
        slot.uarea_id = None;

        Event {
            pool: self.id,
            slot: slot_idx,
            generation: slot.generation,
        }
    }

    pub(crate) fn slot(&self, event: Event) -> Result<&Slot, EmError> {
        match self.slots.get(event.slot as usize) {
            Some(slot) if slot.live && slot.generation == event.generation => Ok(slot),
            _ => Err(EmError::InvalidEvent),
        }
    }

    pub(crate) fn slot_mut(&mut self, event: Event) -> Result<&mut Slot, EmError> {
        match self.slots.get_mut(event.slot as usize) {
            Some(slot) if slot.live && slot.generation == event.generation => Ok(slot),
            _ => Err(EmError::InvalidEvent),
        }
    }

    /// Drop one reference; the slot returns to its subpool on the last one.
    /// Returns whether the event was actually released.
    pub(crate) fn release(&mut self, event: Event) -> Result<bool, EmError> {
        let slot = self.slot_mut(event)?;
        slot.refs -= 1;
        if slot.refs > 0 {
            return Ok(false);
        }

        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.vector_size = 0;
        let sp = slot.subpool as usize;
        self.subpools[sp].free.push(event.slot);
        self.outstanding -= 1;
        Ok(true)
    }

    /// Copy payload and user area from `src` to `dst` within this pool
    pub(crate) fn copy_within(&mut self, src: Event, dst: Event) -> Result<(), EmError> {
        self.slot(src)?;
        self.slot(dst)?;
        let (s, d) = (src.slot as usize, dst.slot as usize);
        let (from, to) = if s < d {
            let (lo, hi) = self.slots.split_at_mut(d);
            (&lo[s], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(s);
            (&hi[0], &mut lo[d])
        };
        copy_slot(from, to);
        Ok(())
    }
}

/// Copy payload bytes, user area and id between two live slots
pub(crate) fn copy_slot(from: &Slot, to: &mut Slot) {
    let n = from.size.min(to.data.len()).min(from.data.len());
    to.data[..n].copy_from_slice(&from.data[..n]);
    let u = from.uarea.len().min(to.uarea.len());
    to.uarea[..u].copy_from_slice(&from.uarea[..u]);
    to.uarea_id = from.uarea_id;
    to.tag = from.tag;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(config: &PoolConfig) -> EventPool {
        EventPool::new(PoolId(0), "test", config).unwrap()
    }

    #[test]
    fn config_limits() {
        let mut cfg = PoolConfig::new(EventType::Sw, 128, 4);
        assert!(cfg.validate().is_ok());

        cfg.subpools[0].num = 0;
        assert!(matches!(cfg.validate(), Err(EmError::BadPoolConfig(_))));

        let cfg = PoolConfig::new(EventType::Sw, 0, 4);
        assert!(cfg.validate().is_err());

        let cfg = PoolConfig::new(EventType::Sw, 128, 4).with_user_area(MAX_USER_AREA + 1);
        assert!(cfg.validate().is_err());

        let mut cfg = PoolConfig::new(EventType::Sw, 128, 4);
        cfg.subpools = vec![cfg.subpools[0]; MAX_SUBPOOLS + 1];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn smallest_fitting_subpool_first_then_larger() {
        let cfg = PoolConfig {
            event_type: EventType::Sw,
            user_area_size: 0,
            subpools: vec![
                SubpoolConfig { size: 1024, num: 2, cache_size: None },
                SubpoolConfig { size: 64, num: 1, cache_size: None },
            ],
        };
        let mut p = pool(&cfg);

        let mut got = Vec::new();
        assert_eq!(p.alloc_into(32, EventType::Sw, 3, |e| got.push(e)).unwrap(), 3);

        let stats = p.stats();
        assert_eq!(stats.subpools[0].size, 64);
        assert_eq!(stats.subpools[0].used, 1);
        assert_eq!(stats.subpools[1].used, 2);

        // Exhausted: zero, not an error.
        assert_eq!(p.alloc_into(32, EventType::Sw, 1, |_| {}).unwrap(), 0);
        assert!(matches!(
            p.alloc_into(4096, EventType::Sw, 1, |_| {}),
            Err(EmError::TooLarge { size: 4096, max: 1024 })
        ));
        assert!(matches!(
            p.alloc_into(32, EventType::Packet, 1, |_| {}),
            Err(EmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn release_invalidates_handle() {
        let mut p = pool(&PoolConfig::new(EventType::Sw, 64, 1));
        let mut got = Vec::new();
        p.alloc_into(64, EventType::Sw, 1, |e| got.push(e)).unwrap();
        let ev = got[0];

        assert!(p.release(ev).unwrap());
        assert_eq!(p.outstanding(), 0);
        assert_eq!(p.release(ev), Err(EmError::InvalidEvent));

        // Slot is reused under a new generation.
        let mut again = Vec::new();
        p.alloc_into(64, EventType::Sw, 1, |e| again.push(e)).unwrap();
        assert_eq!(again[0].slot, ev.slot);
        assert_ne!(again[0], ev);
    }
}
