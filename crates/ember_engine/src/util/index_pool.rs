//! Fixed-capacity index allocation with free-list reuse
//!
//! Descriptor heaps and pools hand out integer slots. Released slots
//! are reused LIFO before the high-water mark is bumped, so a heap
//! that churns descriptors never grows past its peak working set.

use thiserror::Error;

/// Errors produced by [`IndexPool`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexPoolError {
    /// Every index up to the pool's capacity is live
    #[error("index pool exhausted: all {capacity} indices are live")]
    Exhausted {
        /// The pool's fixed capacity
        capacity: u32,
    },

    /// The released index was never allocated
    #[error("index {index} is outside the allocated range")]
    OutOfRange {
        /// The offending index
        index: u32,
    },
}

/// Free-list index allocator over a fixed capacity.
///
/// An index is either live (returned by [`allocate`](Self::allocate)
/// and not yet released) or sits at most once on the free stack.
/// Capacity never shrinks; releasing only makes an index reusable.
#[derive(Debug)]
pub struct IndexPool {
    capacity: u32,
    high_water: u32,
    free: Vec<u32>,
}

impl IndexPool {
    /// Create a pool handing out indices in `0..capacity`
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            high_water: 0,
            free: Vec::new(),
        }
    }

    /// Allocate an index, preferring the most recently released one
    pub fn allocate(&mut self) -> Result<u32, IndexPoolError> {
        if let Some(index) = self.free.pop() {
            return Ok(index);
        }
        if self.high_water == self.capacity {
            return Err(IndexPoolError::Exhausted {
                capacity: self.capacity,
            });
        }
        let index = self.high_water;
        self.high_water += 1;
        Ok(index)
    }

    /// Return an index to the pool for reuse.
    ///
    /// Releasing an index twice corrupts the free list; this is a
    /// programmer error and only checked in debug builds.
    pub fn release(&mut self, index: u32) -> Result<(), IndexPoolError> {
        if index >= self.high_water {
            return Err(IndexPoolError::OutOfRange { index });
        }
        debug_assert!(
            !self.free.contains(&index),
            "index {index} released twice"
        );
        self.free.push(index);
        Ok(())
    }

    /// Number of live indices
    pub fn live(&self) -> u32 {
        self.high_water - self.free.len() as u32
    }

    /// Highest index ever handed out plus one
    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Fixed capacity of the pool
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_allocation() {
        let mut pool = IndexPool::new(4);
        assert_eq!(pool.allocate().unwrap(), 0);
        assert_eq!(pool.allocate().unwrap(), 1);
        assert_eq!(pool.allocate().unwrap(), 2);
        assert_eq!(pool.live(), 3);
        assert_eq!(pool.high_water(), 3);
    }

    #[test]
    fn test_lifo_reuse_before_bump() {
        let mut pool = IndexPool::new(8);
        for _ in 0..5 {
            pool.allocate().unwrap();
        }

        pool.release(1).unwrap();
        pool.release(3).unwrap();
        pool.release(2).unwrap();

        // Freed indices come back LIFO before the high-water mark moves
        assert_eq!(pool.allocate().unwrap(), 2);
        assert_eq!(pool.allocate().unwrap(), 3);
        assert_eq!(pool.allocate().unwrap(), 1);
        assert_eq!(pool.allocate().unwrap(), 5);
        assert_eq!(pool.high_water(), 6);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut pool = IndexPool::new(2);
        pool.allocate().unwrap();
        pool.allocate().unwrap();
        assert_eq!(
            pool.allocate(),
            Err(IndexPoolError::Exhausted { capacity: 2 })
        );

        // Releasing makes exactly one slot usable again
        pool.release(0).unwrap();
        assert_eq!(pool.allocate().unwrap(), 0);
        assert!(pool.allocate().is_err());
    }

    #[test]
    fn test_high_water_never_exceeds_capacity() {
        let mut pool = IndexPool::new(3);
        for _ in 0..3 {
            pool.allocate().unwrap();
        }
        for index in 0..3 {
            pool.release(index).unwrap();
        }
        for _ in 0..3 {
            pool.allocate().unwrap();
        }
        assert!(pool.allocate().is_err());
        assert_eq!(pool.high_water(), 3);
        assert_eq!(pool.capacity(), 3);
    }

    #[test]
    fn test_release_unallocated_index() {
        let mut pool = IndexPool::new(4);
        pool.allocate().unwrap();
        assert_eq!(pool.release(2), Err(IndexPoolError::OutOfRange { index: 2 }));
    }
}
