//! Slot table pinning embedded values by integer id.
//!
//! Ids start at 1 and freed ids are handed out again, most recently freed
//! first. A pinned value stays reachable from the host side until its id is
//! released, independent of the embedded evaluation stack.

use core::fmt;
use core::mem;

use tracing::trace;

use crate::config::RegistryConfig;
use crate::error::{BridgeError, Result};

/// Identifier of a pinned value, unique while the value stays pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryId(u32);

impl RegistryId {
    /// Wrap a raw id, e.g. one reported back by an embedded runtime.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw integer id
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    fn slot(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    fn from_slot(slot: usize) -> Option<Self> {
        slot.checked_add(1)
            .and_then(|raw| u32::try_from(raw).ok())
            .map(Self)
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug)]
enum Slot<V> {
    Pinned(V),
    Free,
}

/// Table of values pinned on behalf of host-side owners.
#[derive(Debug)]
pub struct Registry<V> {
    slots: Vec<Slot<V>>,
    /// Freed slot indices, reused last-in first-out
    free: Vec<usize>,
    pinned: usize,
    limit: Option<usize>,
}

impl<V> Registry<V> {
    /// Create an unbounded registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            pinned: 0,
            limit: None,
        }
    }

    /// Create a registry sized and bounded by `config`
    ///
    /// # Errors
    /// Returns `Config` if the initial slots cannot be allocated
    pub fn with_config(config: &RegistryConfig) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(config.initial_capacity)
            .map_err(|error| {
                BridgeError::Config(format!(
                    "registry.initial_capacity of {} cannot be reserved: {error}",
                    config.initial_capacity
                ))
            })?;
        Ok(Self {
            slots,
            free: Vec::new(),
            pinned: 0,
            limit: config.max_references,
        })
    }

    /// Pin `value` and return its id.
    ///
    /// # Errors
    /// Returns `RegistryFull` when the configured limit is reached or the id
    /// space is exhausted. The table is unchanged in that case.
    pub fn register(&mut self, value: V) -> Result<RegistryId> {
        let limit = self.limit.unwrap_or(usize::MAX);
        if self.pinned >= limit {
            return Err(BridgeError::RegistryFull { limit });
        }

        let id = match self.free.pop() {
            Some(slot) => match (RegistryId::from_slot(slot), self.slots.get_mut(slot)) {
                (Some(id), Some(entry)) => {
                    *entry = Slot::Pinned(value);
                    id
                }
                _ => {
                    self.free.push(slot);
                    return Err(BridgeError::RegistryFull { limit });
                }
            },
            None => {
                let id = RegistryId::from_slot(self.slots.len())
                    .ok_or(BridgeError::RegistryFull { limit })?;
                self.slots.push(Slot::Pinned(value));
                id
            }
        };

        self.pinned += 1;
        trace!(id = id.get(), pinned = self.pinned, "pinned value");
        Ok(id)
    }

    /// Look up a pinned value.
    ///
    /// # Errors
    /// Returns `StaleReference` if `id` was released or never issued.
    pub fn lookup(&self, id: RegistryId) -> Result<&V> {
        match id.slot().and_then(|slot| self.slots.get(slot)) {
            Some(Slot::Pinned(value)) => Ok(value),
            Some(Slot::Free) | None => Err(BridgeError::StaleReference(id)),
        }
    }

    /// Unpin `id`, handing the value back so the embedded collector may reclaim it.
    ///
    /// # Errors
    /// Returns `StaleReference` if `id` is not currently pinned. Nothing is
    /// modified in that case.
    pub fn release(&mut self, id: RegistryId) -> Result<V> {
        let slot = id.slot().ok_or(BridgeError::StaleReference(id))?;
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(BridgeError::StaleReference(id))?;

        match mem::replace(entry, Slot::Free) {
            Slot::Pinned(value) => {
                self.free.push(slot);
                self.pinned -= 1;
                trace!(id = id.get(), pinned = self.pinned, "released value");
                Ok(value)
            }
            Slot::Free => Err(BridgeError::StaleReference(id)),
        }
    }

    /// Check whether `id` is currently pinned
    #[must_use]
    pub fn contains(&self, id: RegistryId) -> bool {
        self.lookup(id).is_ok()
    }

    /// Ids of every pinned value, in ascending order
    pub fn ids(&self) -> impl Iterator<Item = RegistryId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, entry)| matches!(entry, Slot::Pinned(_)))
            .filter_map(|(slot, _)| RegistryId::from_slot(slot))
    }

    /// Unpin everything at once, returning how many values were still pinned.
    pub fn clear(&mut self) -> usize {
        let released = self.pinned;
        self.slots.clear();
        self.free.clear();
        self.pinned = 0;
        released
    }

    /// Number of pinned values
    #[must_use]
    pub fn len(&self) -> usize {
        self.pinned
    }

    /// Check if nothing is pinned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pinned == 0
    }
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}
