//! Registry of host objects shared with the script side.
//!
//! Proxies carry an opaque handle instead of a pointer: an arena index
//! plus a generation counter, packed into a number scripts can store
//! exactly. Slots are pooled through a free list; vacating a slot bumps
//! its generation, so a stale handle can never resolve to whatever moved
//! in afterwards.

use crate::object::HostRef;

// Generations live in the bits above the index. 32 + 21 = 53 bits keeps
// the packed form exactly representable as a script number.
const GENERATION_BITS: u32 = 21;
const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;

/// Opaque token for a registered host object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Pack into a number with exact script representation.
    pub(crate) fn to_number(self) -> f64 {
        (((self.generation as u64) << 32) | self.index as u64) as f64
    }

    /// Recover a handle from a script number. `None` for anything that is
    /// not a non-negative 53-bit integer.
    pub(crate) fn from_number(n: f64) -> Option<Handle> {
        if !n.is_finite() || n < 0.0 || n.fract() != 0.0 || n >= (1u64 << 53) as f64 {
            return None;
        }
        let bits = n as u64;
        Some(Handle {
            index: (bits & u32::MAX as u64) as u32,
            generation: (bits >> 32) as u32,
        })
    }
}

struct Slot {
    generation: u32,
    value: Option<HostRef>,
}

/// Arena of host objects addressable by [`Handle`].
#[derive(Default)]
pub(crate) struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Registry {
    pub(crate) fn new() -> Registry {
        Registry::default()
    }

    /// Store an object and return its handle.
    pub(crate) fn add(&mut self, value: HostRef) -> Handle {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.value = Some(value);
                return Handle {
                    index,
                    generation: slot.generation,
                };
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle {
            index,
            generation: 0,
        }
    }

    /// Resolve a handle. `None` when the slot is vacant or the
    /// generation does not match; callers decide whether that is an
    /// error.
    pub(crate) fn get(&self, handle: Handle) -> Option<HostRef> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.clone()
    }

    /// Vacate a slot, returning its object. The generation bumps so the
    /// handle (and any copy of it) stops resolving.
    ///
    /// The engine binding has no per-object finalizer hook for plain
    /// objects, so nothing calls this today; entries live as long as
    /// their context. The vacate discipline is still the contract a
    /// future lifetime signal plugs into.
    #[allow(dead_code)]
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<HostRef> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.value.is_none() {
            return None;
        }
        let value = slot.value.take();
        slot.generation = (slot.generation + 1) & GENERATION_MASK;
        self.free.push(handle.index);
        value
    }

    /// Number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }
}
