use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::fmt;
use std::num::NonZero;
use std::sync::{Arc, LazyLock};

use foldhash::{HashMap, HashMapExt};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::metrics::{ARRAYS_DISCARDED, ARRAYS_RENTED, ARRAYS_RETAINED};
use crate::{ArrayPool, SharedArrayPoolBuilder};

/// Length of the arrays in the smallest bucket. Smaller requests are served from this bucket.
pub(crate) const MIN_BUCKET_ARRAY_LENGTH: usize = 16;

/// Process-wide pools, one per element type, created on first use.
///
/// Generic statics do not exist, so the per-type instances live in a map keyed by type.
static SHARED_POOLS: LazyLock<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

thread_local! {
    /// Handles to the process-wide pools already looked up by this thread. The registry lock is
    /// only taken on the first lookup per thread and element type.
    static LOCAL_HANDLES: RefCell<HashMap<TypeId, Box<dyn Any>>> =
        RefCell::new(HashMap::new());
}

/// A thread-safe [`ArrayPool`] that retains given-back arrays in power-of-two sized buckets.
///
/// Each bucket holds arrays of exactly one length (16, 32, 64, ... up to the configured
/// maximum) and has its own lock, so threads renting different sizes do not contend. Requests
/// are rounded up to the bucket length. Requests larger than the largest bucket are served by
/// a fresh allocation of the exact requested length and such arrays are not retained when
/// given back.
///
/// This type is a cheap handle: clones refer to the same underlying buckets.
///
/// # Examples
///
/// ```
/// use pooled_buffers::{ArrayPool, SharedArrayPool};
///
/// let pool = SharedArrayPool::<u8>::builder()
///     .max_array_length(4096)
///     .build();
///
/// let array = pool.rent(1000);
/// assert_eq!(array.len(), 1024);
///
/// pool.give_back(array, true);
/// ```
///
/// # Thread safety
///
/// The pool is thread-safe ([`Send`] and [`Sync`]) when `T` is [`Send`].
pub struct SharedArrayPool<T> {
    inner: Arc<SharedArrayPoolInner<T>>,
}

struct SharedArrayPoolInner<T> {
    /// Bucket `i` retains arrays of length `MIN_BUCKET_ARRAY_LENGTH << i`.
    buckets: Box<[Mutex<Vec<Box<[T]>>>]>,

    max_arrays_per_bucket: NonZero<usize>,
}

impl<T> SharedArrayPool<T> {
    /// Creates a builder for configuring and constructing a [`SharedArrayPool`].
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_buffers::SharedArrayPool;
    ///
    /// let pool = SharedArrayPool::<u16>::builder()
    ///     .max_arrays_per_bucket(8)
    ///     .build();
    ///
    /// assert_eq!(pool.max_arrays_per_bucket(), 8);
    /// ```
    #[inline]
    pub fn builder() -> SharedArrayPoolBuilder<T> {
        SharedArrayPoolBuilder::new()
    }

    /// Creates a new private pool with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub(crate) fn new_inner(
        max_array_length: usize,
        max_arrays_per_bucket: NonZero<usize>,
    ) -> Self {
        debug_assert!(max_array_length.is_power_of_two());
        debug_assert!(max_array_length >= MIN_BUCKET_ARRAY_LENGTH);

        let bucket_count = max_array_length
            .trailing_zeros()
            .saturating_sub(MIN_BUCKET_ARRAY_LENGTH.trailing_zeros())
            .saturating_add(1);

        let buckets = (0..bucket_count)
            .map(|_| Mutex::new(Vec::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            inner: Arc::new(SharedArrayPoolInner {
                buckets,
                max_arrays_per_bucket,
            }),
        }
    }

    /// The length of arrays in the largest bucket. Longer requests bypass the pool.
    #[must_use]
    pub fn max_array_length(&self) -> usize {
        bucket_array_length(self.inner.buckets.len().saturating_sub(1))
    }

    /// The number of arrays each bucket retains before further given-back arrays are dropped.
    #[must_use]
    pub fn max_arrays_per_bucket(&self) -> usize {
        self.inner.max_arrays_per_bucket.get()
    }

    /// The number of arrays currently retained across all buckets.
    #[must_use]
    pub fn retained_count(&self) -> usize {
        self.inner.buckets.iter().map(|b| b.lock().len()).sum()
    }

    /// Index of the bucket serving requests of `length` elements, if any bucket is large enough.
    fn bucket_index(&self, length: usize) -> Option<usize> {
        if length > self.max_array_length() {
            return None;
        }

        let rounded = length.max(MIN_BUCKET_ARRAY_LENGTH).next_power_of_two();

        Some(
            (rounded.trailing_zeros() as usize)
                .wrapping_sub(MIN_BUCKET_ARRAY_LENGTH.trailing_zeros() as usize),
        )
    }
}

impl<T> SharedArrayPool<T>
where
    T: Copy + Default + Send + 'static,
{
    /// Returns a handle to the process-wide pool for element type `T`.
    ///
    /// The pool is created with default configuration on first use and lives for the rest of
    /// the process. All callers asking for the same element type share the same buckets.
    /// Each thread caches its handle, so repeated calls do not contend on a global lock.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_buffers::{ArrayPool, SharedArrayPool};
    ///
    /// let a = SharedArrayPool::<u8>::shared();
    /// let b = SharedArrayPool::<u8>::shared();
    ///
    /// let array = a.rent(32);
    /// b.give_back(array, false);
    /// ```
    #[must_use]
    pub fn shared() -> Self {
        LOCAL_HANDLES
            .try_with(|handles| {
                handles
                    .borrow_mut()
                    .entry(TypeId::of::<T>())
                    .or_insert_with(|| Box::new(Self::from_registry()))
                    .downcast_ref::<Self>()
                    .expect("thread-local handles are keyed by their element type")
                    .clone()
            })
            // The thread-local cache is gone while the thread is shutting down.
            .unwrap_or_else(|_| Self::from_registry())
    }

    fn from_registry() -> Self {
        let mut pools = SHARED_POOLS.lock();

        let entry = pools.entry(TypeId::of::<T>()).or_insert_with(|| {
            debug!(element_type = type_name::<T>(), "creating shared array pool");
            Box::new(Self::new())
        });

        entry
            .downcast_ref::<Self>()
            .expect("shared pool registry entries are keyed by their element type")
            .clone()
    }
}

impl<T: Copy + Default> ArrayPool<T> for SharedArrayPool<T> {
    fn rent(&self, minimum_length: usize) -> Box<[T]> {
        if minimum_length == 0 {
            return Box::default();
        }

        let array = match self.bucket_index(minimum_length) {
            Some(index) => {
                let reused = self
                    .inner
                    .buckets
                    .get(index)
                    .and_then(|bucket| bucket.lock().pop());

                reused.unwrap_or_else(|| allocate(bucket_array_length(index)))
            }
            None => {
                trace!(
                    minimum_length,
                    max_array_length = self.max_array_length(),
                    "request exceeds largest bucket, allocating unpooled array"
                );
                allocate(minimum_length)
            }
        };

        ARRAYS_RENTED.with(|event| event.observe(array.len()));

        array
    }

    fn give_back(&self, mut array: Box<[T]>, clear: bool) {
        if array.is_empty() {
            return;
        }

        let bucket = array
            .len()
            .is_power_of_two()
            .then(|| self.bucket_index(array.len()))
            .flatten()
            .filter(|index| bucket_array_length(*index) == array.len())
            .and_then(|index| self.inner.buckets.get(index));

        let Some(bucket) = bucket else {
            trace!(length = array.len(), "array does not fit any bucket, dropping it");
            ARRAYS_DISCARDED.with(|event| event.observe_once());
            return;
        };

        if clear {
            array.fill(T::default());
        }

        let mut retained = bucket.lock();

        if retained.len() >= self.inner.max_arrays_per_bucket.get() {
            drop(retained);
            trace!(length = array.len(), "bucket is full, dropping array");
            ARRAYS_DISCARDED.with(|event| event.observe_once());
            return;
        }

        retained.push(array);
        ARRAYS_RETAINED.with(|event| event.observe_once());
    }
}

#[inline]
fn bucket_array_length(index: usize) -> usize {
    MIN_BUCKET_ARRAY_LENGTH << index
}

fn allocate<T: Copy + Default>(length: usize) -> Box<[T]> {
    vec![T::default(); length].into_boxed_slice()
}

impl<T> Clone for SharedArrayPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SharedArrayPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SharedArrayPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("max_array_length", &self.max_array_length())
            .field("max_arrays_per_bucket", &self.max_arrays_per_bucket())
            .field("retained_count", &self.retained_count())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(SharedArrayPool<u8>: Send, Sync, Clone);

    #[test]
    fn rent_rounds_up_to_bucket_length() {
        let pool = SharedArrayPool::<u8>::new();

        assert_eq!(pool.rent(1).len(), 16);
        assert_eq!(pool.rent(16).len(), 16);
        assert_eq!(pool.rent(17).len(), 32);
        assert_eq!(pool.rent(1000).len(), 1024);
        assert_eq!(pool.rent(1 << 20).len(), 1 << 20);
    }

    #[test]
    fn rent_zero_is_empty() {
        let pool = SharedArrayPool::<u8>::new();

        assert!(pool.rent(0).is_empty());
    }

    #[test]
    fn oversized_request_is_exact_and_not_retained() {
        let pool = SharedArrayPool::<u8>::builder().max_array_length(64).build();

        let array = pool.rent(100);
        assert_eq!(array.len(), 100);

        pool.give_back(array, false);
        assert_eq!(pool.retained_count(), 0);
    }

    #[test]
    fn given_back_array_is_reused() {
        let pool = SharedArrayPool::<u8>::new();

        let mut array = pool.rent(20);
        array[0] = 42;
        let address = array.as_ptr();

        pool.give_back(array, false);
        assert_eq!(pool.retained_count(), 1);

        let array = pool.rent(30);
        assert_eq!(array.as_ptr(), address);
        assert_eq!(array[0], 42);
    }

    #[test]
    fn clear_on_give_back_resets_contents() {
        let pool = SharedArrayPool::<u32>::new();

        let mut array = pool.rent(16);
        array.fill(9);

        pool.give_back(array, true);

        let array = pool.rent(16);
        assert!(array.iter().all(|x| *x == 0));
    }

    #[test]
    fn full_bucket_drops_array() {
        let pool = SharedArrayPool::<u8>::builder().max_arrays_per_bucket(1).build();

        let first = pool.rent(16);
        let second = pool.rent(16);

        pool.give_back(first, false);
        pool.give_back(second, false);

        assert_eq!(pool.retained_count(), 1);
    }

    #[test]
    fn foreign_length_array_is_dropped() {
        let pool = SharedArrayPool::<u8>::new();

        pool.give_back(vec![0_u8; 24].into_boxed_slice(), false);

        assert_eq!(pool.retained_count(), 0);
    }

    #[test]
    fn shared_is_one_instance_per_type() {
        let a = SharedArrayPool::<u64>::shared();
        let b = SharedArrayPool::<u64>::shared();

        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }

    #[test]
    fn shared_is_one_instance_across_threads() {
        // No other test touches the shared pool for this type.
        #[derive(Clone, Copy, Debug, Default)]
        struct Sample(u16);

        let local = SharedArrayPool::<Sample>::shared();

        let remote = thread::spawn(SharedArrayPool::<Sample>::shared)
            .join()
            .unwrap();

        assert!(Arc::ptr_eq(&local.inner, &remote.inner));

        // Arrays given back on one thread are visible to renters on another.
        let array = local.rent(64);
        let retained = local.retained_count();
        remote.give_back(array, false);
        assert_eq!(local.retained_count(), retained + 1);
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Too slow under Miri.
    fn concurrent_rent_and_give_back() {
        let pool = SharedArrayPool::<u8>::new();

        let threads = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for size in 1..500 {
                        let array = pool.rent(size);
                        assert!(array.len() >= size);
                        pool.give_back(array, false);
                    }
                })
            })
            .collect::<Vec<_>>();

        for thread in threads {
            thread.join().unwrap();
        }

        assert!(pool.retained_count() <= pool.max_arrays_per_bucket() * 6);
    }
}
