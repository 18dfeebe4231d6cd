//! Memory profiler (C8): a `VkAllocationCallbacks` shim plus a background
//! sampler that turns the resulting event stream into bounded per-object-
//! type ring buffers for time-series reporting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use ash::vk;

/// Mirrors `VkSystemAllocationScope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocationScope {
    Command,
    Object,
    Cache,
    Device,
    Instance,
}

impl From<vk::SystemAllocationScope> for AllocationScope {
    fn from(scope: vk::SystemAllocationScope) -> Self {
        match scope {
            vk::SystemAllocationScope::COMMAND => AllocationScope::Command,
            vk::SystemAllocationScope::OBJECT => AllocationScope::Object,
            vk::SystemAllocationScope::CACHE => AllocationScope::Cache,
            vk::SystemAllocationScope::DEVICE => AllocationScope::Device,
            vk::SystemAllocationScope::INSTANCE => AllocationScope::Instance,
            _ => AllocationScope::Object,
        }
    }
}

/// Mirrors `VkInternalAllocationType`/`VkObjectType` coarsely enough for
/// reporting; the exact object type is whatever string the caller passes.
pub type ObjectTypeKey = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationEventKind {
    Alloc,
    Realloc,
    Free,
}

#[derive(Debug, Clone)]
pub struct AllocationEvent {
    pub kind: AllocationEventKind,
    pub size: usize,
    pub alignment: usize,
    pub scope: AllocationScope,
    pub object_type: ObjectTypeKey,
}

/// Fixed-capacity ring buffer of samples; pushing past capacity overwrites
/// the oldest entry. Used for the 128-sample per-object-type time series.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    capacity: usize,
    data: std::collections::VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            data: std::collections::VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: T) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub const DEFAULT_RING_CAPACITY: usize = 128;
pub const DEFAULT_SAMPLER_INTERVAL: Duration = Duration::from_millis(100);

/// Running total per object type, sampled into a ring buffer on every
/// sampler tick.
#[derive(Default)]
struct ObjectTypeTotals {
    live_bytes: u64,
    history: Option<RingBuffer<u64>>,
}

struct SamplerState {
    totals: HashMap<ObjectTypeKey, ObjectTypeTotals>,
}

/// Owns the allocation-callback shim's event sender and the background
/// sampler thread. One instance per device profiler.
pub struct MemoryProfiler {
    sender: Sender<AllocationEvent>,
    state: Arc<Mutex<SamplerState>>,
    stop: Arc<AtomicBool>,
    wake: Arc<Condvar>,
    wake_lock: Arc<Mutex<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MemoryProfiler {
    pub fn new(interval: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();
        let state = Arc::new(Mutex::new(SamplerState { totals: HashMap::new() }));
        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Condvar::new());
        let wake_lock = Arc::new(Mutex::new(()));

        let thread = {
            let state = state.clone();
            let stop = stop.clone();
            let wake = wake.clone();
            let wake_lock = wake_lock.clone();
            std::thread::spawn(move || sampler_loop(receiver, state, stop, wake, wake_lock, interval))
        };

        Self {
            sender,
            state,
            stop,
            wake,
            wake_lock,
            thread: Some(thread),
        }
    }

    /// Records one allocation-callback invocation. Never blocks: if the
    /// event cannot be queued (the only failure mode for an unbounded mpsc
    /// sender is the receiver having hung up, which only happens at
    /// shutdown), the event is silently dropped rather than stalling the
    /// allocator.
    pub fn record(&self, event: AllocationEvent) {
        let _ = self.sender.send(event);
    }

    /// Convenience wrapper matching the shape of a `PFN_vkAllocationFunction`
    /// call site: records the event then forwards to either the
    /// application-provided allocator or the system allocator.
    pub fn record_and_forward<A>(&self, event: AllocationEvent, forward: A) -> *mut std::ffi::c_void
    where
        A: FnOnce() -> *mut std::ffi::c_void,
    {
        self.record(event);
        forward()
    }

    pub fn snapshot(&self, object_type: &str) -> Vec<u64> {
        let state = self.state.lock().unwrap();
        state
            .totals
            .get(object_type)
            .and_then(|t| t.history.as_ref())
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Drop for MemoryProfiler {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn sampler_loop(
    receiver: Receiver<AllocationEvent>,
    state: Arc<Mutex<SamplerState>>,
    stop: Arc<AtomicBool>,
    wake: Arc<Condvar>,
    wake_lock: Arc<Mutex<()>>,
    interval: Duration,
) {
    loop {
        // Drop policy: drain whatever has queued since the last tick; if the
        // flush lock could not be taken the events simply wait for the next
        // tick (mpsc already does this, so `try_lock` pressure never stalls
        // an allocating thread).
        while let Ok(event) = receiver.try_recv() {
            apply_event(&state, &event);
        }
        sample_tick(&state);

        if stop.load(Ordering::SeqCst) {
            break;
        }
        let guard = wake_lock.lock().unwrap();
        let _ = wake.wait_timeout(guard, interval).unwrap();
        if stop.load(Ordering::SeqCst) {
            while let Ok(event) = receiver.try_recv() {
                apply_event(&state, &event);
            }
            sample_tick(&state);
            break;
        }
    }
}

/// Applies one allocation-callback event to its object type's running total.
/// Does not touch the history ring buffer — that only advances once per
/// sampler tick, in [`sample_tick`], regardless of how many events landed
/// between ticks.
fn apply_event(state: &Arc<Mutex<SamplerState>>, event: &AllocationEvent) {
    let mut state = state.lock().unwrap();
    let entry = state.totals.entry(event.object_type.clone()).or_default();
    match event.kind {
        AllocationEventKind::Alloc => entry.live_bytes = entry.live_bytes.saturating_add(event.size as u64),
        AllocationEventKind::Free => entry.live_bytes = entry.live_bytes.saturating_sub(event.size as u64),
        AllocationEventKind::Realloc => entry.live_bytes = event.size as u64,
    }
}

/// Pushes every object type's current `live_bytes` into its history ring.
/// Called once per sampler wake so the ring holds one sample per tick.
fn sample_tick(state: &Arc<Mutex<SamplerState>>) {
    let mut state = state.lock().unwrap();
    for totals in state.totals.values_mut() {
        let live = totals.live_bytes;
        totals.history.get_or_insert_with(|| RingBuffer::new(DEFAULT_RING_CAPACITY)).push(live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_evicts_oldest_past_capacity() {
        let mut ring = RingBuffer::new(3);
        for i in 0..5 {
            ring.push(i);
        }
        let values: Vec<_> = ring.iter().copied().collect();
        assert_eq!(values, vec![2, 3, 4]);
    }

    #[test]
    fn alloc_then_free_returns_live_bytes_to_zero() {
        let state = Arc::new(Mutex::new(SamplerState { totals: HashMap::new() }));
        apply_event(
            &state,
            &AllocationEvent {
                kind: AllocationEventKind::Alloc,
                size: 256,
                alignment: 16,
                scope: AllocationScope::Object,
                object_type: "buffer".into(),
            },
        );
        apply_event(
            &state,
            &AllocationEvent {
                kind: AllocationEventKind::Free,
                size: 256,
                alignment: 16,
                scope: AllocationScope::Object,
                object_type: "buffer".into(),
            },
        );
        let state = state.lock().unwrap();
        assert_eq!(state.totals["buffer"].live_bytes, 0);
    }

    #[test]
    fn memory_profiler_records_without_blocking_and_shuts_down_cleanly() {
        let profiler = MemoryProfiler::new(Duration::from_millis(5));
        profiler.record(AllocationEvent {
            kind: AllocationEventKind::Alloc,
            size: 64,
            alignment: 8,
            scope: AllocationScope::Command,
            object_type: "image".into(),
        });
        std::thread::sleep(Duration::from_millis(30));
        drop(profiler);
    }
}
