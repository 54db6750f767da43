//! Per-entity dirty counters.
//!
//! Every frame resource holds its own copy of each entity's constants. When
//! an entity changes, all of those copies are stale, so the counter is set
//! to the number of frame resources and decremented each time one copy is
//! refreshed. The entity is clean again once every copy has been rewritten.

/// Counts the frame resources still holding stale constants for an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyCounter {
    remaining: u32,
    frames_in_flight: u32,
}

impl DirtyCounter {
    /// Creates a counter that starts fully dirty, so every frame resource
    /// receives the entity's initial constants.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is zero.
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "at least one frame resource is required");
        let frames_in_flight = frames_in_flight as u32;
        Self {
            remaining: frames_in_flight,
            frames_in_flight,
        }
    }

    /// Marks every frame resource stale. Restarts the count if it was
    /// already running.
    #[inline]
    pub fn mark(&mut self) {
        self.remaining = self.frames_in_flight;
    }

    /// Returns true while some frame resource still needs a rewrite.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.remaining > 0
    }

    /// Number of frame resources still to be rewritten.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Records that the current frame resource has been rewritten.
    ///
    /// # Panics
    ///
    /// Panics if the counter is already clean.
    #[inline]
    pub fn consume(&mut self) {
        assert!(self.remaining > 0, "consumed a clean dirty counter");
        self.remaining -= 1;
    }
}
