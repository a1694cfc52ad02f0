//! Live allocations, keyed by the address handed to the caller.

use std::collections::HashMap;

use crate::segment::Segment;

/// What the arena remembers about one live pointer.
///
/// `segment` is the granule-aligned range still reserved in block `block`.
/// The pointer sits `offset` bytes into it and owns `len` bytes from there.
/// `offset` is non-zero only for the tail left behind by a partial free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Registration {
    pub(crate) block: usize,
    pub(crate) segment: Segment,
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

/// Address to [`Registration`] map.
#[derive(Debug, Default)]
pub(crate) struct PointerRegistry {
    entries: HashMap<usize, Registration>,
}

impl PointerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `registration` under `address`.
    pub(crate) fn register(&mut self, address: usize, registration: Registration) {
        let previous: Option<Registration> = self.entries.insert(address, registration);
        debug_assert!(
            previous.is_none(),
            "address {address:#x} registered twice: {previous:?}"
        );
    }

    #[inline(always)]
    pub(crate) fn get(&self, address: usize) -> Option<Registration> {
        self.entries.get(&address).copied()
    }

    pub(crate) fn remove(&mut self, address: usize) -> Option<Registration> {
        self.entries.remove(&address)
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Bytes owned by live pointers.
    pub(crate) fn live_bytes(&self) -> usize {
        self.entries.values().map(|r: &Registration| r.len).sum()
    }

    /// Bytes reserved in `block`, including partial-free slack.
    pub(crate) fn reserved_in(&self, block: usize) -> usize {
        self.entries
            .values()
            .filter(|r: &&Registration| r.block == block)
            .map(|r: &Registration| r.segment.size)
            .sum()
    }
}
