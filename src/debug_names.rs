//! Debug-object registry (C9): opaque handle value → UTF-8 name, populated
//! by `VK_EXT_debug_utils`/`VK_EXT_debug_marker` object-name commands.
//! Consulted only during C7 output serialization — never on a hot path.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct DebugNameRegistry {
    names: RwLock<HashMap<u64, String>>,
}

impl DebugNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&self, handle: u64, name: String) {
        self.names.write().unwrap().insert(handle, name);
    }

    pub fn clear_name(&self, handle: u64) {
        self.names.write().unwrap().remove(&handle);
    }

    /// Looks up a name, falling back to the handle's hex representation
    /// when nothing was ever assigned.
    pub fn display_name(&self, handle: u64) -> String {
        self.names
            .read()
            .unwrap()
            .get(&handle)
            .cloned()
            .unwrap_or_else(|| format!("{handle:#x}"))
    }

    pub fn get(&self, handle: u64) -> Option<String> {
        self.names.read().unwrap().get(&handle).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_handle_displays_as_hex() {
        let registry = DebugNameRegistry::new();
        assert_eq!(registry.display_name(0xdead_beef), "0xdeadbeef");
    }

    #[test]
    fn named_handle_overrides_hex_display_until_cleared() {
        let registry = DebugNameRegistry::new();
        registry.set_name(1, "shadow-pass".into());
        assert_eq!(registry.display_name(1), "shadow-pass");
        registry.clear_name(1);
        assert_eq!(registry.display_name(1), "0x1");
    }
}
