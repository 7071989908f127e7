//! Priority queue of vaults waiting to invest (max-heap by surplus buffer)

use priority_queue::PriorityQueue;
use std::collections::HashMap;
use strata_common::normalize;
use strata_controller::state::{VaultId, VaultPosition};

/// Investable surplus of one vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSurplus {
    pub vault: VaultId,
    /// Buffer above the hold, native units
    pub surplus: u128,
    /// Surplus scaled to 18 decimals, used for ordering across coins
    pub surplus_norm: u128,
}

impl VaultSurplus {
    pub fn of(vault: VaultId, position: &VaultPosition) -> Self {
        let surplus = position.buffer.saturating_sub(position.hold());
        Self {
            vault,
            surplus,
            surplus_norm: normalize(surplus, position.decimals),
        }
    }
}

/// Surplus-ordered queue: largest idle buffer first
pub struct InvestQueue {
    queue: PriorityQueue<VaultId, u128>,
    map: HashMap<VaultId, VaultSurplus>,
}

impl InvestQueue {
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            map: HashMap::new(),
        }
    }

    /// Push or update a vault's surplus
    pub fn push(&mut self, entry: VaultSurplus) {
        let vault = entry.vault;
        let priority = entry.surplus_norm;
        self.map.insert(vault, entry);
        self.queue.push(vault, priority);
    }

    /// Pop the vault with the largest surplus
    pub fn pop(&mut self) -> Option<VaultSurplus> {
        let (vault, _priority) = self.queue.pop()?;
        self.map.remove(&vault)
    }

    pub fn peek(&self) -> Option<&VaultSurplus> {
        let (vault, _priority) = self.queue.peek()?;
        self.map.get(vault)
    }

    pub fn remove(&mut self, vault: &VaultId) -> Option<VaultSurplus> {
        self.queue.remove(vault);
        self.map.remove(vault)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.map.clear();
    }
}

impl Default for InvestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vault: VaultId, surplus_norm: u128) -> VaultSurplus {
        VaultSurplus {
            vault,
            surplus: surplus_norm,
            surplus_norm,
        }
    }

    #[test]
    fn test_largest_surplus_first() {
        let mut queue = InvestQueue::new();
        queue.push(entry(VaultId::Stable(0), 100));
        queue.push(entry(VaultId::Stable(1), 500));
        queue.push(entry(VaultId::Curve, 300));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek().unwrap().vault, VaultId::Stable(1));
        assert_eq!(queue.pop().unwrap().vault, VaultId::Stable(1));
        assert_eq!(queue.pop().unwrap().vault, VaultId::Curve);
        assert_eq!(queue.pop().unwrap().vault, VaultId::Stable(0));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_update_reorders() {
        let mut queue = InvestQueue::new();
        queue.push(entry(VaultId::Stable(0), 100));
        queue.push(entry(VaultId::Stable(1), 50));
        queue.push(entry(VaultId::Stable(1), 900));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek().unwrap().surplus_norm, 900);

        queue.remove(&VaultId::Stable(1));
        assert_eq!(queue.peek().unwrap().vault, VaultId::Stable(0));
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_surplus_normalised_by_decimals() {
        let mut position = VaultPosition::new(6, &Default::default()).unwrap();
        position.deposit(1_000 * 1_000_000);
        let s = VaultSurplus::of(VaultId::Stable(1), &position);
        // 5% of 1000 is held back
        assert_eq!(s.surplus, 950 * 1_000_000);
        assert_eq!(s.surplus_norm, 950 * 1_000_000_000_000_000_000);
    }
}
