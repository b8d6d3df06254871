//! Test helpers shared by the unit tests of multiple modules.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::ArrayPool;

/// An [`ArrayPool`] that counts rentals so tests can assert that every rented array
/// is given back exactly once.
///
/// Returned arrays are kept and handed out again to later rentals that fit, so tests can also
/// observe stale data leaking (or not) between tenants.
#[derive(Debug)]
pub(crate) struct TrackingArrayPool<T> {
    retained: Mutex<Vec<Box<[T]>>>,
    outstanding: AtomicUsize,
    total_rented: AtomicUsize,
}

impl<T> TrackingArrayPool<T> {
    pub(crate) fn new() -> Self {
        Self {
            retained: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
            total_rented: AtomicUsize::new(0),
        }
    }

    /// Number of arrays rented and not yet given back.
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Number of rentals over the lifetime of the pool.
    pub(crate) fn total_rented(&self) -> usize {
        self.total_rented.load(Ordering::Relaxed)
    }
}

impl<T: Copy + Default> ArrayPool<T> for TrackingArrayPool<T> {
    fn rent(&self, minimum_length: usize) -> Box<[T]> {
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        self.total_rented.fetch_add(1, Ordering::Relaxed);

        let mut retained = self.retained.lock();

        if let Some(index) = retained.iter().position(|a| a.len() == minimum_length) {
            return retained.swap_remove(index);
        }

        vec![T::default(); minimum_length].into_boxed_slice()
    }

    fn give_back(&self, mut array: Box<[T]>, clear: bool) {
        let previous = self.outstanding.fetch_sub(1, Ordering::Relaxed);
        assert!(previous > 0, "array given back more times than rented");

        if clear {
            array.fill(T::default());
        }

        self.retained.lock().push(array);
    }
}
