//! Cross-rank names for per-rank state.
//!
//! An [`Anchor`] is not a pointer: it is a parallel name. Every rank
//! constructs the same object at the same logical site (collectively, in the
//! same order), which places each replica at the same slot of its rank's
//! anchor table. Transmitting the anchor transmits only the slot index; a
//! remote handler dereferences its own rank's replica.

use std::fmt;
use std::marker::PhantomData;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Lightweight cross-rank name for an object registered with
/// [`Comm::make_anchor`](crate::comm::Comm::make_anchor).
///
/// `Copy`, two bytes of meaning on the wire, and only valid on ranks that
/// performed the same registration sequence.
pub struct Anchor<T: ?Sized> {
    pub(crate) index: u32,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized> Anchor<T> {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Slot in the per-rank anchor table.
    pub fn index(&self) -> u32 {
        self.index
    }
}

// Manual impls: derive would demand the bounds on `T`, which is only a
// phantom here.
impl<T: ?Sized> Clone for Anchor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Anchor<T> {}

impl<T: ?Sized> fmt::Debug for Anchor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Anchor({})", self.index)
    }
}

impl<T: ?Sized> PartialEq for Anchor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T: ?Sized> Eq for Anchor<T> {}

impl<T: ?Sized> Serialize for Anchor<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.index.serialize(serializer)
    }
}

impl<'de, T: ?Sized> Deserialize<'de> for Anchor<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Anchor::new)
    }
}
