//! The server's node registry.
//!
//! A bidirectional hardware-address ⇄ node-id table. Both directions are
//! needed every frame: data slots resolve a reservation's node id to the
//! hardware address handed to the application, and join handling must detect
//! an already-registered address to keep registration idempotent.
//!
//! The two underlying maps are private and only ever updated together, so
//! every entry appears in exactly one of each mapping.

use crate::consts::{DQN_NODE_CAPACITY, HwAddr};
use heapless::FnvIndexMap;
use thiserror::Error;

/// Registration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry already holds the configured number of nodes.
    #[error("node registry at capacity")]
    Full,
}

/// Bounded bidirectional mapping between hardware addresses and node ids.
#[derive(Debug)]
pub struct NodeRegistry {
    by_id: FnvIndexMap<u16, HwAddr, DQN_NODE_CAPACITY>,
    by_addr: FnvIndexMap<HwAddr, u16, DQN_NODE_CAPACITY>,
    capacity: u16,
    next_id: u16,
}

impl NodeRegistry {
    /// An empty registry admitting up to `capacity` nodes (validated by
    /// [`crate::config::Config::validate`] to fit the bounded maps).
    pub fn new(capacity: u16) -> Self {
        Self {
            by_id: FnvIndexMap::new(),
            by_addr: FnvIndexMap::new(),
            capacity,
            // Node id 0 is never assigned; join TRs carry it as "no identity".
            next_id: 1,
        }
    }

    /// Registers a hardware address, allocating the next node id.
    ///
    /// Re-registering a known address returns its existing id, so a node
    /// whose join response was lost can simply try again.
    pub fn register(&mut self, hw_addr: HwAddr) -> Result<u16, RegistryError> {
        if let Some(id) = self.by_addr.get(&hw_addr) {
            return Ok(*id);
        }
        if self.by_addr.len() >= self.capacity as usize {
            return Err(RegistryError::Full);
        }
        let id = self.next_id;
        self.next_id += 1;
        // Capacity was checked above; both maps share it, so neither insert
        // can fail and the two directions stay in sync.
        let _ = self.by_addr.insert(hw_addr, id);
        let _ = self.by_id.insert(id, hw_addr);
        Ok(id)
    }

    /// The hardware address registered under `node_id`.
    pub fn addr_of(&self, node_id: u16) -> Option<&HwAddr> {
        self.by_id.get(&node_id)
    }

    /// The node id registered for `hw_addr`.
    pub fn id_of(&self, hw_addr: &HwAddr) -> Option<u16> {
        self.by_addr.get(hw_addr).copied()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    /// Whether no node has registered yet.
    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> HwAddr {
        [n, n, n, n, n, n]
    }

    #[test]
    fn ids_start_at_one_and_increment() {
        let mut reg = NodeRegistry::new(4);
        assert_eq!(reg.register(addr(1)), Ok(1));
        assert_eq!(reg.register(addr(2)), Ok(2));
        assert_eq!(reg.register(addr(3)), Ok(3));
    }

    #[test]
    fn both_directions_stay_in_sync() {
        let mut reg = NodeRegistry::new(4);
        let id = reg.register(addr(7)).unwrap();
        assert_eq!(reg.addr_of(id), Some(&addr(7)));
        assert_eq!(reg.id_of(&addr(7)), Some(id));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn reregistration_is_idempotent() {
        let mut reg = NodeRegistry::new(4);
        let first = reg.register(addr(9)).unwrap();
        let second = reg.register(addr(9)).unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn capacity_boundary_leaves_existing_entries_intact() {
        let mut reg = NodeRegistry::new(2);
        let a = reg.register(addr(1)).unwrap();
        let b = reg.register(addr(2)).unwrap();
        assert_eq!(reg.register(addr(3)), Err(RegistryError::Full));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.addr_of(a), Some(&addr(1)));
        assert_eq!(reg.addr_of(b), Some(&addr(2)));
        assert_eq!(reg.id_of(&addr(3)), None);
        // The full registry still resolves re-registrations.
        assert_eq!(reg.register(addr(2)), Ok(b));
    }
}
