//! Maps dispatchable handles (`VkInstance`, `VkDevice`, `VkQueue`,
//! `VkCommandBuffer`) to the layer's per-device state.
//!
//! The loader writes a dispatch table pointer into the first machine word of
//! every dispatchable handle it hands back. Two handles that were allocated
//! against the same device therefore always agree on that pointer, even
//! though the handle values themselves differ (a `VkCommandBuffer` and the
//! `VkDevice` it was allocated from are unrelated integers). We hash and
//! compare by that pointer rather than by the handle value so any
//! dispatchable object routes to its owning device in O(1), without needing
//! a link back to the parent device baked into every call site.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::error::ProfilerError;

/// The dispatch table address extracted from a dispatchable handle. Two
/// handles that were created against the same `VkDevice` always produce the
/// same key.
pub type DispatchKey = u64;

/// Reads the dispatch table pointer out of a dispatchable Vulkan handle.
///
/// # Safety
/// `handle` must be a valid, non-null dispatchable Vulkan handle (i.e. a
/// pointer whose first eight bytes are the loader-managed dispatch table
/// pointer). This is guaranteed by the Vulkan loader for every dispatchable
/// object type but cannot be checked from a raw integer handle value.
pub unsafe fn dispatch_key_of(handle: u64) -> DispatchKey {
    debug_assert_ne!(handle, 0, "dispatch key requested for a null handle");
    *(handle as *const u64)
}

/// Thread-safe registry mapping [`DispatchKey`]s to arbitrary per-device
/// state `T` (normally an `Arc<DeviceProfiler>`).
///
/// Reads (the hot path — every intercepted call needs to find its device)
/// take a shared lock; only `Create*`/`Destroy*` interception takes the
/// exclusive lock.
pub struct DispatchRegistry<T> {
    table: RwLock<HashMap<DispatchKey, Arc<T>>>,
}

impl<T> Default for DispatchRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DispatchRegistry<T> {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Registers per-device state under `key`. Called once, from `CreateDevice`
    /// interception.
    pub fn insert(&self, key: DispatchKey, state: Arc<T>) {
        let mut table = self.table.write().unwrap();
        table.insert(key, state);
    }

    /// Removes per-device state, called from `DestroyDevice` interception.
    pub fn erase(&self, key: DispatchKey) -> Option<Arc<T>> {
        let mut table = self.table.write().unwrap();
        table.remove(&key)
    }

    /// Looks up the per-device state owning `key`.
    pub fn get(&self, key: DispatchKey) -> Result<Arc<T>, ProfilerError> {
        let table = self.table.read().unwrap();
        table.get(&key).cloned().ok_or(ProfilerError::InvalidHandle)
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn lookup_of_unknown_key_is_invalid_handle() {
        let registry: DispatchRegistry<u32> = DispatchRegistry::new();
        assert!(matches!(registry.get(0xdead), Err(ProfilerError::InvalidHandle)));
    }

    #[test]
    fn insert_then_erase_round_trips_and_size_recovers() {
        let registry: DispatchRegistry<u32> = DispatchRegistry::new();
        registry.insert(1, Arc::new(42));
        assert_eq!(*registry.get(1).unwrap(), 42);
        registry.erase(1);
        assert!(registry.get(1).is_err());
    }

    #[test]
    fn concurrent_create_destroy_pairs_return_registry_to_initial_size() {
        let registry: Arc<DispatchRegistry<u32>> = Arc::new(DispatchRegistry::new());
        let initial = registry.len();
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let key = 1000 + i;
                    registry.insert(key, Arc::new(i as u32));
                    assert_eq!(*registry.get(key).unwrap(), i as u32);
                    registry.erase(key);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), initial);
    }
}
