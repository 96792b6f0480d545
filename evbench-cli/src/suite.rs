//! Event API Benchmark Suite
//!
//! Every case performs [`REPEAT_COUNT`] event API calls per `run`. Inputs
//! are prepared by `init` and released by `term`, outside the measured
//! window. Cases share one [`EventBench`] context holding the event machine,
//! three test pools, an unscheduled queue and the per-case data tables.

use crate::config::PoolSection;
use evbench_core::{
    BenchCase, BenchError, BenchRegistry, Environment, MAX_BURST, ResourceProvisioner,
};
use evbench_pool::{
    Event, EventMachine, EventType, PoolConfig, PoolId, QueueId, TypeTag,
};
use std::hint::black_box;
use tracing::{debug, error, info};

/// API calls per `run` invocation
pub const REPEAT_COUNT: usize = 1000;

/// Largest event table any case touches
pub const MAX_EVENTS: usize = REPEAT_COUNT * MAX_BURST as usize;

/// Prefix of report names for cases without a display name
pub const NAME_PREFIX: &str = "em_";

const SW: u8 = 0;
const PKT: u8 = 1;
const VECT: u8 = 2;

const fn event_type(t: u8) -> EventType {
    match t {
        SW => EventType::Sw,
        PKT => EventType::Packet,
        _ => EventType::Vector,
    }
}

/// Suite parameters fixed for one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteParams {
    /// Events per `*_multi` call
    pub burst_size: usize,
    /// Payload size of sw and packet events
    pub event_size: usize,
    /// Table size of vector events
    pub vector_size: usize,
    /// User area bytes per event
    pub user_area_size: usize,
    /// Pool cache hint
    pub cache_size: Option<u32>,
}

impl SuiteParams {
    /// Parameters from the pool section of the configuration
    pub fn new(burst_size: u32, pool: &PoolSection) -> Self {
        Self {
            burst_size: burst_size as usize,
            event_size: pool.event_size,
            vector_size: pool.vector_size,
            user_area_size: pool.user_area_size,
            cache_size: pool.cache_size,
        }
    }

    /// Events per test pool. Clone and ref cases hold two tables at once.
    pub fn pool_events(&self) -> usize {
        if self.burst_size < 2 {
            2 * REPEAT_COUNT
        } else {
            self.burst_size * REPEAT_COUNT
        }
    }
}

const EVENT_TYPES: [EventType; 3] = [EventType::Sw, EventType::Packet, EventType::Vector];

fn type_slot(t: EventType) -> usize {
    match t {
        EventType::Sw => 0,
        EventType::Packet => 1,
        EventType::Vector => 2,
    }
}

/// Shared context of every case in the suite
pub struct EventBench {
    params: SuiteParams,
    em: EventMachine,
    provisioner: ResourceProvisioner,
    pools: [Option<PoolId>; 3],
    unsched_queue: Option<QueueId>,
    event_tbl: Vec<Option<Event>>,
    event2_tbl: Vec<Option<Event>>,
    ptr_tbl: Vec<usize>,
    u16_tbl: Vec<u16>,
    u32_tbl: Vec<u32>,
    et_tbl: Vec<TypeTag>,
    pool_tbl: Vec<Option<PoolId>>,
}

impl EventBench {
    /// Context with an empty machine; pools and queue are created by `setup`
    pub fn new(params: SuiteParams) -> Self {
        let mut em = EventMachine::new(2);
        em.set_core_id(1);
        Self {
            params,
            em,
            provisioner: ResourceProvisioner::default(),
            pools: [None; 3],
            unsched_queue: None,
            event_tbl: vec![None; MAX_EVENTS],
            event2_tbl: vec![None; REPEAT_COUNT],
            ptr_tbl: vec![0; REPEAT_COUNT],
            u16_tbl: vec![0; REPEAT_COUNT],
            u32_tbl: vec![0; REPEAT_COUNT],
            et_tbl: vec![TypeTag::default(); MAX_EVENTS],
            pool_tbl: vec![None; REPEAT_COUNT],
        }
    }

    /// Suite parameters
    pub fn params(&self) -> &SuiteParams {
        &self.params
    }

    /// The event machine under test
    pub fn machine(&self) -> &EventMachine {
        &self.em
    }

    /// Events currently held in the case tables
    pub fn live_events(&self) -> usize {
        self.event_tbl.iter().chain(&self.event2_tbl).flatten().count()
    }

    fn pool(&self, t: EventType) -> Option<PoolId> {
        self.pools[type_slot(t)]
    }

    fn size_of(&self, t: EventType) -> usize {
        match t {
            EventType::Vector => self.params.vector_size,
            EventType::Sw | EventType::Packet => self.params.event_size,
        }
    }

    fn burst(&self) -> usize {
        self.params.burst_size
    }

    fn create_pools(&mut self) -> Result<(), BenchError> {
        let num = self.params.pool_events();
        let names = ["sw_event_pool", "packet_pool", "vector_pool"];
        for (t, name) in EVENT_TYPES.into_iter().zip(names) {
            let config = PoolConfig::new(t, self.size_of(t), num)
                .with_user_area(self.params.user_area_size)
                .with_cache_size(self.params.cache_size);
            let id = self
                .em
                .pool_create(name, &config)
                .map_err(|e| BenchError::setup(format!("{name} create failed: {e}")))?;
            self.pools[type_slot(t)] = Some(id);
        }
        Ok(())
    }

    fn create_queues(&mut self) -> Result<(), BenchError> {
        let min_events = self.burst() * REPEAT_COUNT;
        let queue = self
            .em
            .queue_create("unsch-queue", min_events)
            .map_err(|e| BenchError::setup(format!("unscheduled queue create failed: {e}")))?;
        self.unsched_queue = Some(queue);
        Ok(())
    }

    fn delete_queues(&mut self) -> Result<(), String> {
        let Some(queue) = self.unsched_queue else {
            return Ok(());
        };
        let mut drained = 0usize;
        while let Ok(Some(event)) = self.em.dequeue(queue) {
            if let Err(e) = self.em.free(event) {
                error!(error = %e, "free of drained event failed");
            }
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "drained unscheduled queue");
        }
        self.em
            .queue_delete(queue)
            .map_err(|e| format!("queue delete failed: {e}"))?;
        self.unsched_queue = None;
        Ok(())
    }

    /// Return whatever a failed or interrupted case left in the tables
    fn release_tables(&mut self) {
        let Some(pool) = self.pools.iter().flatten().next().copied() else {
            return;
        };
        let leftover = self.live_events();
        if leftover == 0 {
            return;
        }
        info!(leftover, "releasing events left in case tables");
        // Lease frees through the machine, whichever pool an event came from.
        let mut lease = self.em.provision(pool);
        self.provisioner.release(&mut lease, &mut self.event_tbl);
        self.provisioner.release(&mut lease, &mut self.event2_tbl);
    }

    fn delete_pools(&mut self) -> Vec<String> {
        let mut failures = Vec::new();
        for slot in &mut self.pools {
            let Some(pool) = slot.take() else { continue };
            if let Err(e) = self.em.pool_delete(pool) {
                failures.push(format!("pool delete failed: {e}"));
            }
        }
        failures
    }
}

impl Environment for EventBench {
    fn setup(&mut self) -> Result<(), BenchError> {
        self.create_pools()?;
        self.create_queues()?;
        debug!(
            pool_events = self.params.pool_events(),
            pools = self.em.pool_count(),
            "test environment ready"
        );
        Ok(())
    }

    fn teardown(&mut self) -> Result<(), BenchError> {
        self.release_tables();

        let mut failures = Vec::new();
        if let Err(e) = self.delete_queues() {
            error!(error = %e, "queue teardown failed");
            failures.push(e);
        }
        for e in self.delete_pools() {
            error!(error = %e, "pool teardown failed");
            failures.push(e);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BenchError::teardown(failures.join("; ")))
        }
    }
}

// ─── Init / term helpers ─────────────────────────────────────────────────────

fn allocate_test_events(b: &mut EventBench, t: EventType, num: usize) -> Result<(), BenchError> {
    let pool = b
        .pool(t)
        .ok_or_else(|| BenchError::setup("test pools not created"))?;
    let size = b.size_of(t);
    let mut lease = b.em.provision(pool);
    b.provisioner
        .acquire_into(&mut lease, t, size, &mut b.event_tbl[..num])?;
    Ok(())
}

fn init_test_events(b: &mut EventBench, num: usize) -> Result<(), BenchError> {
    for (i, slot) in b.event_tbl[..num].iter().enumerate() {
        if let Some(event) = *slot {
            b.em
                .uarea_id_set(event, i as u16)
                .map_err(|e| BenchError::operation("uarea_id_set", e))?;
        }
    }
    Ok(())
}

fn create_events<const T: u8>(b: &mut EventBench) -> Result<(), BenchError> {
    allocate_test_events(b, event_type(T), REPEAT_COUNT)?;
    init_test_events(b, REPEAT_COUNT)
}

fn create_events_multi<const T: u8>(b: &mut EventBench) -> Result<(), BenchError> {
    let num = REPEAT_COUNT * b.burst();
    allocate_test_events(b, event_type(T), num)?;
    init_test_events(b, num)
}

/// Packets as they would arrive from packet I/O: no user area id set
fn create_ext_packets(b: &mut EventBench) -> Result<(), BenchError> {
    allocate_test_events(b, EventType::Packet, REPEAT_COUNT)
}

fn free_event_tbl(em: &mut EventMachine, tbl: &mut [Option<Event>]) -> Result<(), BenchError> {
    em.free_multi(tbl).map_err(|e| BenchError::operation("free", e))
}

fn free_events(b: &mut EventBench) -> Result<(), BenchError> {
    free_event_tbl(&mut b.em, &mut b.event_tbl[..REPEAT_COUNT])
}

fn free_events_multi(b: &mut EventBench) -> Result<(), BenchError> {
    let num = REPEAT_COUNT * b.burst();
    free_event_tbl(&mut b.em, &mut b.event_tbl[..num])
}

/// Restore the vector size changed by the size_set case, then free
fn free_vectors(b: &mut EventBench) -> Result<(), BenchError> {
    for event in b.event_tbl[..REPEAT_COUNT].iter().flatten() {
        b.em
            .vector_size_set(*event, 0)
            .map_err(|e| BenchError::operation("vector_size_set", e))?;
    }
    free_events(b)
}

fn free_clone_events(b: &mut EventBench) -> Result<(), BenchError> {
    free_event_tbl(&mut b.em, &mut b.event_tbl[..REPEAT_COUNT])?;
    free_event_tbl(&mut b.em, &mut b.event2_tbl[..REPEAT_COUNT])
}

fn create_send_unsched_sw_events(b: &mut EventBench) -> Result<(), BenchError> {
    create_events::<SW>(b)?;
    if unsched_send(b) <= 0 {
        return Err(BenchError::operation("send", queue_error(b)));
    }
    Ok(())
}

fn create_send_unsched_sw_events_multi(b: &mut EventBench) -> Result<(), BenchError> {
    create_events_multi::<SW>(b)?;
    if unsched_send_multi(b) <= 0 {
        return Err(BenchError::operation("send_multi", queue_error(b)));
    }
    Ok(())
}

fn unsched_dequeue_free(b: &mut EventBench) -> Result<(), BenchError> {
    let dequeued = unsched_dequeue(b);
    free_events(b)?;
    if dequeued <= 0 {
        return Err(BenchError::operation("dequeue", queue_error(b)));
    }
    Ok(())
}

fn unsched_dequeue_free_multi(b: &mut EventBench) -> Result<(), BenchError> {
    let dequeued = unsched_dequeue_multi(b);
    free_events_multi(b)?;
    if dequeued <= 0 {
        return Err(BenchError::operation("dequeue_multi", queue_error(b)));
    }
    Ok(())
}

fn queue_error(b: &EventBench) -> evbench_pool::EmError {
    match b.unsched_queue {
        Some(queue) => evbench_pool::EmError::QueueFull(queue),
        None => evbench_pool::EmError::InvalidEvent,
    }
}

// ─── Measured operations ─────────────────────────────────────────────────────

fn event_alloc<const T: u8>(b: &mut EventBench) -> i64 {
    let t = event_type(T);
    let (Some(pool), size) = (b.pool(t), b.size_of(t)) else {
        return 0;
    };
    let mut i = 0;
    while i < REPEAT_COUNT {
        b.event_tbl[i] = b.em.alloc(size, t, pool).ok();
        i += 1;
    }
    i as i64
}

fn event_alloc_multi<const T: u8>(b: &mut EventBench) -> i64 {
    let t = event_type(T);
    let (Some(pool), size, burst) = (b.pool(t), b.size_of(t), b.burst()) else {
        return 0;
    };
    let mut ret = 0;
    for i in 0..REPEAT_COUNT {
        let tbl = &mut b.event_tbl[i * burst..(i + 1) * burst];
        ret += b.em.alloc_multi(tbl, size, t, pool).unwrap_or(0);
    }
    ret as i64
}

fn event_alloc_free<const T: u8>(b: &mut EventBench) -> i64 {
    let t = event_type(T);
    let (Some(pool), size) = (b.pool(t), b.size_of(t)) else {
        return 0;
    };
    let mut i = 0;
    while i < REPEAT_COUNT {
        if let Ok(event) = b.em.alloc(size, t, pool) {
            let _ = b.em.free(event);
        }
        i += 1;
    }
    i as i64
}

fn event_alloc_free_multi<const T: u8>(b: &mut EventBench) -> i64 {
    let t = event_type(T);
    let (Some(pool), size, burst) = (b.pool(t), b.size_of(t), b.burst()) else {
        return 0;
    };
    let mut i = 0;
    while i < REPEAT_COUNT {
        let tbl = &mut b.event_tbl[..burst];
        let n = b.em.alloc_multi(tbl, size, t, pool).unwrap_or(0);
        if n > 0 {
            let _ = b.em.free_multi(&mut tbl[..n]);
        }
        i += 1;
    }
    i as i64
}

fn event_free(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        if let Some(event) = b.event_tbl[i].take() {
            let _ = b.em.free(event);
        }
        i += 1;
    }
    i as i64
}

fn event_free_multi(b: &mut EventBench) -> i64 {
    let burst = b.burst();
    let mut i = 0;
    while i < REPEAT_COUNT {
        let _ = b.em.free_multi(&mut b.event_tbl[i * burst..(i + 1) * burst]);
        i += 1;
    }
    i as i64
}

fn event_vector_free(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        if let Some(event) = b.event_tbl[i].take() {
            let _ = b.em.vector_free(event);
        }
        i += 1;
    }
    i as i64
}

fn unsched_send(b: &mut EventBench) -> i64 {
    let Some(queue) = b.unsched_queue else {
        return 0;
    };
    for i in 0..REPEAT_COUNT {
        let Some(event) = b.event_tbl[i].take() else {
            return 0;
        };
        if b.em.send(event, queue).is_err() {
            b.event_tbl[i] = Some(event);
            return 0;
        }
    }
    REPEAT_COUNT as i64
}

fn unsched_send_multi(b: &mut EventBench) -> i64 {
    let (Some(queue), burst) = (b.unsched_queue, b.burst()) else {
        return 0;
    };
    let mut ret = 0;
    for i in 0..REPEAT_COUNT {
        let tbl = &mut b.event_tbl[i * burst..(i + 1) * burst];
        ret += b.em.send_multi(tbl, queue).unwrap_or(0);
    }
    if ret != burst * REPEAT_COUNT {
        return 0;
    }
    ret as i64
}

fn unsched_dequeue(b: &mut EventBench) -> i64 {
    let Some(queue) = b.unsched_queue else {
        return 0;
    };
    for i in 0..REPEAT_COUNT {
        match b.em.dequeue(queue) {
            Ok(Some(event)) => b.event_tbl[i] = Some(event),
            _ => return 0,
        }
    }
    REPEAT_COUNT as i64
}

fn unsched_dequeue_multi(b: &mut EventBench) -> i64 {
    let (Some(queue), burst) = (b.unsched_queue, b.burst()) else {
        return 0;
    };
    let mut ret = 0;
    for i in 0..REPEAT_COUNT {
        let tbl = &mut b.event_tbl[i * burst..(i + 1) * burst];
        ret += b.em.dequeue_multi(queue, tbl).unwrap_or(0);
    }
    if ret != burst * REPEAT_COUNT {
        return 0;
    }
    ret as i64
}

fn unsched_send_dequeue(b: &mut EventBench) -> i64 {
    let Some(queue) = b.unsched_queue else {
        return 0;
    };
    for i in 0..REPEAT_COUNT {
        let Some(event) = b.event_tbl[i].take() else {
            return 0;
        };
        if b.em.send(event, queue).is_err() {
            b.event_tbl[i] = Some(event);
            return 0;
        }
        match b.em.dequeue(queue) {
            Ok(Some(event)) => b.event_tbl[i] = Some(event),
            _ => return 0,
        }
    }
    REPEAT_COUNT as i64
}

fn unsched_send_dequeue_multi(b: &mut EventBench) -> i64 {
    let (Some(queue), burst) = (b.unsched_queue, b.burst()) else {
        return 0;
    };
    let (mut sent, mut dequeued) = (0, 0);
    for i in 0..REPEAT_COUNT {
        let tbl = &mut b.event_tbl[i * burst..(i + 1) * burst];
        sent += b.em.send_multi(tbl, queue).unwrap_or(0);
        dequeued += b.em.dequeue_multi(queue, tbl).unwrap_or(0);
    }
    if sent != burst * REPEAT_COUNT || dequeued != burst * REPEAT_COUNT {
        return 0;
    }
    dequeued as i64
}

fn event_clone(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        b.event2_tbl[i] = b.event_tbl[i].and_then(|e| b.em.clone_event(e, None).ok());
        i += 1;
    }
    i as i64
}

fn event_has_ref(b: &mut EventBench) -> i64 {
    let mut ret = 0;
    for slot in &b.event_tbl[..REPEAT_COUNT] {
        let Some(event) = *slot else { return 0 };
        ret += b.em.has_ref(event).unwrap_or(true) as i64;
    }
    (ret == 0) as i64
}

fn event_ref(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        b.event2_tbl[i] = b.event_tbl[i].and_then(|e| b.em.event_ref(e).ok());
        i += 1;
    }
    i as i64
}

fn event_pointer(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        b.ptr_tbl[i] = b.em.event_pointer(event).map_or(0, |p| p.as_ptr() as usize);
        i += 1;
    }
    i as i64
}

fn event_uarea_get(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        b.ptr_tbl[i] = b.em.uarea_get(event).map_or(0, |u| u.as_ptr() as usize);
        i += 1;
    }
    i as i64
}

fn event_uarea_get_size(b: &mut EventBench) -> i64 {
    let mut size = 0;
    for i in 0..REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        match b.em.uarea_get(event) {
            Ok(uarea) => {
                size = uarea.len();
                b.ptr_tbl[i] = uarea.as_ptr() as usize;
            }
            Err(_) => b.ptr_tbl[i] = 0,
        }
    }
    size as i64
}

fn event_uarea_id_get(b: &mut EventBench) -> i64 {
    let mut isset = false;
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        let id = b.em.uarea_id_get(event).ok().flatten();
        isset = id.is_some();
        b.u16_tbl[i] = id.unwrap_or(0);
        i += 1;
    }
    i as i64 + isset as i64
}

fn event_uarea_id_set(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        let _ = b.em.uarea_id_set(event, i as u16);
        i += 1;
    }
    i as i64
}

fn event_uarea_info(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        let _ = black_box(b.em.uarea_info(event));
        i += 1;
    }
    i as i64
}

fn event_get_size(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        b.u32_tbl[i] = b.em.get_size(event).unwrap_or(0) as u32;
        i += 1;
    }
    i as i64
}

fn event_get_type(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        b.et_tbl[i] = b.em.get_type(event).unwrap_or_default();
        i += 1;
    }
    i as i64
}

fn event_get_type_multi(b: &mut EventBench) -> i64 {
    let burst = b.burst();
    let mut ret = 0;
    for i in 0..REPEAT_COUNT {
        let range = i * burst..(i + 1) * burst;
        ret += b
            .em
            .get_type_multi(&b.event_tbl[range.clone()], &mut b.et_tbl[range]);
    }
    ret as i64
}

fn event_same_type_multi(b: &mut EventBench) -> i64 {
    let burst = b.burst();
    let mut ret = 0;
    for i in 0..REPEAT_COUNT {
        let (same, tag) = b.em.same_type_multi(&b.event_tbl[i * burst..(i + 1) * burst]);
        b.et_tbl[i] = tag;
        ret += same;
    }
    ret as i64
}

fn event_set_type<const T: u8>(b: &mut EventBench) -> i64 {
    let t = event_type(T);
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        let _ = b.em.set_type(event, t, 1);
        i += 1;
    }
    i as i64
}

fn event_get_pool(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        b.pool_tbl[i] = b.em.get_pool(event).ok();
        i += 1;
    }
    i as i64
}

fn event_vector_tbl(b: &mut EventBench) -> i64 {
    let mut ret = 0;
    for i in 0..REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        match b.em.vector_tbl(event) {
            Ok((size, tbl)) => {
                b.ptr_tbl[i] = tbl.as_ptr() as usize;
                ret += size;
            }
            Err(_) => return 0,
        }
    }
    (ret == 0) as i64
}

fn event_vector_size(b: &mut EventBench) -> i64 {
    let mut ret = 0;
    for i in 0..REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        ret += b.em.vector_size(event).unwrap_or(1);
    }
    (ret == 0) as i64
}

fn event_vector_max_size(b: &mut EventBench) -> i64 {
    let mut ret = 0;
    for i in 0..REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        ret += b.em.vector_max_size(event).unwrap_or(0);
    }
    ret as i64
}

fn event_vector_size_set(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        let _ = b.em.vector_size_set(event, 1);
        i += 1;
    }
    i as i64
}

fn event_vector_info(b: &mut EventBench) -> i64 {
    let mut i = 0;
    while i < REPEAT_COUNT {
        let Some(event) = b.event_tbl[i] else { return 0 };
        let _ = black_box(b.em.vector_info(event));
        i += 1;
    }
    i as i64
}

fn core_id(b: &mut EventBench) -> i64 {
    for slot in &mut b.u32_tbl[..REPEAT_COUNT] {
        *slot = b.em.core_id();
    }
    REPEAT_COUNT as i64
}

fn core_count(b: &mut EventBench) -> i64 {
    for slot in &mut b.u32_tbl[..REPEAT_COUNT] {
        *slot = b.em.core_count();
    }
    REPEAT_COUNT as i64
}

// ─── Registry ────────────────────────────────────────────────────────────────

type Case = BenchCase<EventBench>;

/// The event suite in execution order
pub fn registry() -> BenchRegistry<EventBench> {
    let sw_events = create_events::<SW>;
    let packets = create_events::<PKT>;
    let vectors = create_events::<VECT>;

    let cases: Vec<Case> = vec![
        Case::new("event_alloc", event_alloc::<SW>)
            .with_term(free_events)
            .with_display_name("em_event_alloc(sw)"),
        Case::new("event_alloc", event_alloc::<PKT>)
            .with_term(free_events)
            .with_display_name("em_event_alloc(pkt)"),
        Case::new("event_alloc", event_alloc::<VECT>)
            .with_term(free_events)
            .with_display_name("em_event_alloc(vect)"),
        Case::new("event_alloc_multi", event_alloc_multi::<SW>)
            .with_term(free_events_multi)
            .with_display_name("em_event_alloc_multi(sw)"),
        Case::new("event_alloc_multi", event_alloc_multi::<PKT>)
            .with_term(free_events_multi)
            .with_display_name("em_event_alloc_multi(pkt)"),
        Case::new("event_alloc_multi", event_alloc_multi::<VECT>)
            .with_term(free_events_multi)
            .with_display_name("em_event_alloc_multi(vect)"),
        Case::new("event_free", event_free)
            .with_init(sw_events)
            .with_display_name("em_free(sw)"),
        Case::new("event_free", event_free)
            .with_init(packets)
            .with_display_name("em_free(pkt)"),
        Case::new("event_free", event_free)
            .with_init(vectors)
            .with_display_name("em_free(vect)"),
        Case::new("event_free_multi", event_free_multi)
            .with_init(create_events_multi::<SW>)
            .with_display_name("em_free_multi(sw)"),
        Case::new("event_free_multi", event_free_multi)
            .with_init(create_events_multi::<PKT>)
            .with_display_name("em_free_multi(pkt)"),
        Case::new("event_free_multi", event_free_multi)
            .with_init(create_events_multi::<VECT>)
            .with_display_name("em_free_multi(vect)"),
        Case::new("event_vector_free", event_vector_free).with_init(vectors),
        Case::new("event_alloc_free", event_alloc_free::<SW>)
            .with_display_name("event_alloc_free(sw)"),
        Case::new("event_alloc_free", event_alloc_free::<PKT>)
            .with_display_name("event_alloc_free(pkt)"),
        Case::new("event_alloc_free", event_alloc_free::<VECT>)
            .with_display_name("event_alloc_free(vect)"),
        Case::new("event_alloc_free_multi", event_alloc_free_multi::<SW>)
            .with_display_name("event_alloc_free_multi(sw)"),
        Case::new("event_alloc_free_multi", event_alloc_free_multi::<PKT>)
            .with_display_name("event_alloc_free_multi(pkt)"),
        Case::new("event_alloc_free_multi", event_alloc_free_multi::<VECT>)
            .with_display_name("event_alloc_free_multi(vect)"),
        Case::new("unsched_send", unsched_send)
            .with_init(sw_events)
            .with_term(unsched_dequeue_free)
            .with_display_name("em_send(unsched-Q)"),
        Case::new("unsched_send_multi", unsched_send_multi)
            .with_init(create_events_multi::<SW>)
            .with_term(unsched_dequeue_free_multi)
            .with_display_name("em_send_multi(unsched-Q)"),
        Case::new("unsched_dequeue", unsched_dequeue)
            .with_init(create_send_unsched_sw_events)
            .with_term(free_events)
            .with_display_name("em_queue_dequeue(unsched-Q)"),
        Case::new("unsched_dequeue_multi", unsched_dequeue_multi)
            .with_init(create_send_unsched_sw_events_multi)
            .with_term(free_events_multi)
            .with_display_name("em_queue_dequeue_multi(unsched-Q)"),
        Case::new("unsched_send_dequeue", unsched_send_dequeue)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("event_send_dequeue(unsched-Q)"),
        Case::new("unsched_send_dequeue_multi", unsched_send_dequeue_multi)
            .with_init(create_events_multi::<SW>)
            .with_term(free_events_multi)
            .with_display_name("event_send_dequeue_multi(unsched-Q)"),
        Case::new("event_clone", event_clone)
            .with_init(sw_events)
            .with_term(free_clone_events)
            .with_display_name("em_event_clone(sw)"),
        Case::new("event_clone", event_clone)
            .with_init(packets)
            .with_term(free_clone_events)
            .with_display_name("em_event_clone(pkt)"),
        Case::new("event_has_ref", event_has_ref)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("em_event_has_ref(pkt)"),
        Case::new("event_ref", event_ref)
            .with_init(packets)
            .with_term(free_clone_events)
            .with_display_name("em_event_ref(pkt)"),
        Case::new("event_pointer", event_pointer)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("em_event_pointer(sw)"),
        Case::new("event_pointer", event_pointer)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("em_event_pointer(pkt)"),
        Case::new("event_uarea_get", event_uarea_get)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("em_event_uarea_get(sw, null)"),
        Case::new("event_uarea_get", event_uarea_get)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("em_event_uarea_get(pkt, null)"),
        Case::new("event_uarea_get", event_uarea_get)
            .with_init(create_ext_packets)
            .with_term(free_events)
            .with_display_name("em_event_uarea_get(ext-pkt, null)"),
        Case::new("event_uarea_get_size", event_uarea_get_size)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("em_event_uarea_get(sw, size)"),
        Case::new("event_uarea_get_size", event_uarea_get_size)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("em_event_uarea_get(pkt, size)"),
        Case::new("event_uarea_get_size", event_uarea_get_size)
            .with_init(create_ext_packets)
            .with_term(free_events)
            .with_display_name("em_event_uarea_get(ext-pkt, size)"),
        Case::new("event_uarea_id_get", event_uarea_id_get)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("em_event_uarea_id_get(sw)"),
        Case::new("event_uarea_id_get", event_uarea_id_get)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("em_event_uarea_id_get(pkt)"),
        Case::new("event_uarea_id_get", event_uarea_id_get)
            .with_init(create_ext_packets)
            .with_term(free_events)
            .with_display_name("em_event_uarea_id_get(ext-pkt)"),
        Case::new("event_uarea_id_set", event_uarea_id_set)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("em_event_uarea_id_set(sw)"),
        Case::new("event_uarea_id_set", event_uarea_id_set)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("em_event_uarea_id_set(pkt)"),
        Case::new("event_uarea_id_set", event_uarea_id_set)
            .with_init(create_ext_packets)
            .with_term(free_events)
            .with_display_name("em_event_uarea_id_set(ext-pkt)"),
        Case::new("event_uarea_info", event_uarea_info)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("event_uarea_info(sw)"),
        Case::new("event_uarea_info", event_uarea_info)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("event_uarea_info(pkt)"),
        Case::new("event_uarea_info", event_uarea_info)
            .with_init(create_ext_packets)
            .with_term(free_events)
            .with_display_name("event_uarea_info(ext-pkt)"),
        Case::new("event_get_size", event_get_size)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("em_event_get_size(sw)"),
        Case::new("event_get_size", event_get_size)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("em_event_get_size(pkt)"),
        Case::new("event_get_type", event_get_type)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("em_event_get_type(sw)"),
        Case::new("event_get_type", event_get_type)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("em_event_get_type(pkt)"),
        Case::new("event_get_type_multi", event_get_type_multi)
            .with_init(create_events_multi::<SW>)
            .with_term(free_events_multi)
            .with_display_name("em_event_get_type_multi(sw)"),
        Case::new("event_get_type_multi", event_get_type_multi)
            .with_init(create_events_multi::<PKT>)
            .with_term(free_events_multi)
            .with_display_name("em_event_get_type_multi(pkt)"),
        Case::new("event_same_type_multi", event_same_type_multi)
            .with_init(create_events_multi::<SW>)
            .with_term(free_events_multi)
            .with_display_name("em_event_same_type_multi(sw)"),
        Case::new("event_same_type_multi", event_same_type_multi)
            .with_init(create_events_multi::<PKT>)
            .with_term(free_events_multi)
            .with_display_name("em_event_same_type_multi(pkt)"),
        Case::new("event_set_type", event_set_type::<SW>)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("em_event_set_type(sw)"),
        Case::new("event_set_type", event_set_type::<PKT>)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("em_event_set_type(pkt)"),
        Case::new("event_get_pool", event_get_pool)
            .with_init(sw_events)
            .with_term(free_events)
            .with_display_name("em_event_get_pool(sw)"),
        Case::new("event_get_pool", event_get_pool)
            .with_init(packets)
            .with_term(free_events)
            .with_display_name("em_event_get_pool(pkt)"),
        Case::new("event_vector_tbl", event_vector_tbl)
            .with_init(vectors)
            .with_term(free_events),
        Case::new("event_vector_size", event_vector_size)
            .with_init(vectors)
            .with_term(free_events),
        Case::new("event_vector_max_size", event_vector_max_size)
            .with_init(vectors)
            .with_term(free_events),
        Case::new("event_vector_size_set", event_vector_size_set)
            .with_init(vectors)
            .with_term(free_vectors),
        Case::new("event_vector_info", event_vector_info)
            .with_init(vectors)
            .with_term(free_vectors),
        Case::new("core_id", core_id),
        Case::new("core_count", core_count),
    ];

    BenchRegistry::new(cases, REPEAT_COUNT as u32).with_name_prefix(NAME_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolSection;

    fn bench(burst: u32) -> EventBench {
        let mut b = EventBench::new(SuiteParams::new(burst, &PoolSection::default()));
        b.setup().unwrap();
        b
    }

    fn case(registry: &BenchRegistry<EventBench>, label: &str) -> Case {
        *registry
            .iter()
            .find(|c| registry.report_name(c) == label)
            .unwrap_or_else(|| panic!("no case {label}"))
    }

    fn run_once(b: &mut EventBench, c: &Case) -> i64 {
        if let Some(init) = c.init {
            init(b).unwrap();
        }
        let ret = (c.run)(b);
        if let Some(term) = c.term {
            term(b).unwrap();
        }
        ret
    }

    #[test]
    fn pool_sizing_follows_burst() {
        let pool = PoolSection::default();
        assert_eq!(SuiteParams::new(1, &pool).pool_events(), 2 * REPEAT_COUNT);
        assert_eq!(SuiteParams::new(8, &pool).pool_events(), 8 * REPEAT_COUNT);
    }

    #[test]
    fn registry_names_and_prefix() {
        let registry = registry();
        assert_eq!(registry.repeat_count(), REPEAT_COUNT as u32);
        assert_eq!(registry.report_name(registry.get(0).unwrap()), "em_event_alloc(sw)");

        let last = registry.get(registry.len() - 1).unwrap();
        assert_eq!(registry.report_name(last), "em_core_count");
        assert!(
            registry
                .iter()
                .any(|c| registry.report_name(c) == "em_event_vector_free")
        );
    }

    #[test]
    fn every_case_succeeds_and_releases_its_events() {
        let registry = registry();
        let mut b = bench(2);

        for c in registry.iter() {
            let ret = run_once(&mut b, c);
            let name = registry.report_name(c);
            assert!(ret > 0, "{name} returned {ret}");
            assert_eq!(b.live_events(), 0, "{name} left events in tables");
            for pool in EVENT_TYPES {
                let id = b.pool(pool).unwrap();
                assert_eq!(
                    b.machine().pool(id).unwrap().outstanding(),
                    0,
                    "{name} leaked {pool} events"
                );
            }
        }

        b.teardown().unwrap();
        assert_eq!(b.machine().pool_count(), 0);
    }

    #[test]
    fn return_values_match_operation_counts() {
        let registry = registry();
        let mut b = bench(4);

        let alloc_multi = case(&registry, "em_event_alloc_multi(sw)");
        assert_eq!(run_once(&mut b, &alloc_multi), (4 * REPEAT_COUNT) as i64);

        let id_get = case(&registry, "em_event_uarea_id_get(sw)");
        assert_eq!(run_once(&mut b, &id_get), REPEAT_COUNT as i64 + 1);
        let ext = case(&registry, "em_event_uarea_id_get(ext-pkt)");
        assert_eq!(run_once(&mut b, &ext), REPEAT_COUNT as i64);

        let size = case(&registry, "em_event_uarea_get(sw, size)");
        assert_eq!(run_once(&mut b, &size), 8);

        let has_ref = case(&registry, "em_event_has_ref(pkt)");
        assert_eq!(run_once(&mut b, &has_ref), 1);

        b.teardown().unwrap();
    }

    #[test]
    fn teardown_releases_leftovers() {
        let registry = registry();
        let mut b = bench(8);

        // Init without term: events stay in the tables and the queue.
        let dequeue = case(&registry, "em_queue_dequeue(unsched-Q)");
        (dequeue.init.unwrap())(&mut b).unwrap();
        let queue = b.unsched_queue.unwrap();
        assert_eq!(b.machine().queue_len(queue).unwrap(), REPEAT_COUNT);

        // Clone case with only its init and run, no term.
        let clone = case(&registry, "em_event_clone(pkt)");
        (clone.init.unwrap())(&mut b).unwrap();
        (clone.run)(&mut b);
        assert_eq!(b.live_events(), 2 * REPEAT_COUNT);

        b.teardown().unwrap();
        assert_eq!(b.machine().pool_count(), 0);
        assert_eq!(b.live_events(), 0);
    }

    #[test]
    fn setup_failure_is_reported() {
        let pool = PoolSection {
            vector_size: 0,
            ..PoolSection::default()
        };
        let mut b = EventBench::new(SuiteParams::new(8, &pool));
        let err = b.setup().unwrap_err();
        assert!(matches!(err, BenchError::Setup(ref msg) if msg.contains("vector_pool")));

        // Partial setup is still torn down.
        b.teardown().unwrap();
        assert_eq!(b.machine().pool_count(), 0);
    }
}
