//! Bounded object pool
//!
//! An explicit freelist for recycling individuals across generations
//! instead of reallocating them. A [`Pool`] hands out recycled objects through
//! [`Pool::acquire_with`] and takes them back through [`Pool::release`];
//! [`Pool::reset_to_heap`] drops surplus spares between independent runs.
//!
//! Resetting the pool while a generation still holds individuals drawn
//! from it is a precondition violation of the single-run discipline, not
//! something guarded at runtime: released objects are simply spares, and
//! the caller decides when a run is over.

/// A bounded freelist of reusable objects
#[derive(Debug)]
pub struct Pool<T> {
    free: Vec<T>,
    capacity: usize,
}

impl<T> Pool<T> {
    /// Create a pool that keeps at most `capacity` spare objects
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of spare objects currently pooled
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// Check if the pool holds no spares
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Maximum number of spares the pool retains
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take a spare object, or build a fresh one with `create` if the
    /// freelist is empty
    pub fn acquire_with(&mut self, create: impl FnOnce() -> T) -> T {
        self.free.pop().unwrap_or_else(create)
    }

    /// Return an object to the freelist. Objects beyond the pool capacity
    /// are dropped to the heap instead of being retained.
    pub fn release(&mut self, item: T) {
        if self.free.len() < self.capacity {
            self.free.push(item);
        }
    }

    /// Bulk-release spares back to the heap, keeping at most `keep` of
    /// them. Call between independent fit runs only; see the module
    /// documentation for the precondition.
    pub fn reset_to_heap(&mut self, keep: usize) {
        self.free.truncate(keep);
        self.free.shrink_to(self.capacity.min(keep.max(1)));
    }
}
