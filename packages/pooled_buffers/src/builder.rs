use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;

use new_zealand::nz;

use crate::SharedArrayPool;
use crate::shared_array_pool::MIN_BUCKET_ARRAY_LENGTH;

/// Largest array length a [`SharedArrayPool`] will retain by default.
const DEFAULT_MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Largest array length a [`SharedArrayPool`] can be configured to retain.
const MAX_MAX_ARRAY_LENGTH: usize = 1 << 30;

const DEFAULT_MAX_ARRAYS_PER_BUCKET: NonZero<usize> = nz!(50);

/// Builder for creating an instance of [`SharedArrayPool`].
///
/// All settings are optional.
///
/// # Examples
///
/// ```
/// use pooled_buffers::SharedArrayPool;
///
/// // Default configuration.
/// let pool = SharedArrayPool::<u8>::builder().build();
/// assert_eq!(pool.max_array_length(), 1 << 20);
///
/// // Smaller footprint.
/// let pool = SharedArrayPool::<u8>::builder()
///     .max_array_length(64 * 1024)
///     .max_arrays_per_bucket(4)
///     .build();
/// assert_eq!(pool.max_array_length(), 64 * 1024);
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) but not thread-safe ([`Sync`]).
#[derive(Debug)]
#[must_use]
pub struct SharedArrayPoolBuilder<T> {
    max_array_length: usize,
    max_arrays_per_bucket: NonZero<usize>,

    _element: PhantomData<fn() -> T>,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> SharedArrayPoolBuilder<T> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            max_array_length: DEFAULT_MAX_ARRAY_LENGTH,
            max_arrays_per_bucket: DEFAULT_MAX_ARRAYS_PER_BUCKET,
            _element: PhantomData,
            _not_sync: PhantomData,
        }
    }

    /// Sets the length of the largest array the pool retains.
    ///
    /// The value is rounded up to a power of two and clamped to the range `16..=2^30`.
    /// Requests longer than this are served by unpooled allocations.
    #[inline]
    pub fn max_array_length(mut self, length: usize) -> Self {
        self.max_array_length = length
            .clamp(MIN_BUCKET_ARRAY_LENGTH, MAX_MAX_ARRAY_LENGTH)
            .next_power_of_two();
        self
    }

    /// Sets how many arrays each size bucket retains. Further given-back arrays are dropped.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    #[inline]
    pub fn max_arrays_per_bucket(mut self, count: usize) -> Self {
        self.max_arrays_per_bucket =
            NonZero::new(count).expect("a pool bucket must be able to retain at least one array");
        self
    }

    /// Builds the pool with the specified configuration.
    #[must_use]
    #[inline]
    pub fn build(self) -> SharedArrayPool<T> {
        SharedArrayPool::new_inner(self.max_array_length, self.max_arrays_per_bucket)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(SharedArrayPoolBuilder<u8>: Send);
    assert_not_impl_any!(SharedArrayPoolBuilder<u8>: Sync);

    #[test]
    fn max_array_length_is_rounded_and_clamped() {
        let pool = SharedArrayPool::<u8>::builder().max_array_length(1000).build();
        assert_eq!(pool.max_array_length(), 1024);

        let pool = SharedArrayPool::<u8>::builder().max_array_length(1).build();
        assert_eq!(pool.max_array_length(), 16);

        let pool = SharedArrayPool::<u8>::builder()
            .max_array_length(usize::MAX)
            .build();
        assert_eq!(pool.max_array_length(), 1 << 30);
    }

    #[test]
    #[should_panic]
    fn zero_arrays_per_bucket_panics() {
        drop(SharedArrayPool::<u8>::builder().max_arrays_per_bucket(0));
    }
}
