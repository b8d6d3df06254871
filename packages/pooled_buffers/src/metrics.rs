//! Metrics for pooled buffers and the string pool.
//!
//! The events are per-thread to avoid contention between threads renting from the same pool.

use nm::{Event, Magnitude};

/// Histogram buckets for the length of rented arrays, in elements.
///
/// Pooled arrays come in power-of-two sizes so the buckets follow the same progression.
const RENTED_LENGTH_BUCKETS: &[Magnitude] = &[
    16, 64, 256, 1024, 4096, 16_384, 65_536, 262_144, 1_048_576, 4_194_304,
];

thread_local! {
    /// Arrays handed out by a shared array pool. The magnitude is the array length.
    pub(crate) static ARRAYS_RENTED: Event = Event::builder()
        .name("pooled_buffers_arrays_rented")
        .histogram(RENTED_LENGTH_BUCKETS)
        .build();

    /// Arrays accepted back into a shared array pool for reuse.
    pub(crate) static ARRAYS_RETAINED: Event = Event::builder()
        .name("pooled_buffers_arrays_retained")
        .build();

    /// Arrays given back to a shared array pool that were dropped instead of retained,
    /// either because their bucket was full or because they did not fit any bucket.
    pub(crate) static ARRAYS_DISCARDED: Event = Event::builder()
        .name("pooled_buffers_arrays_discarded")
        .build();

    /// String pool lookups that found an existing instance.
    pub(crate) static STRING_POOL_HITS: Event = Event::builder()
        .name("pooled_buffers_string_pool_hits")
        .build();

    /// String pool lookups that had to materialize a new instance.
    pub(crate) static STRING_POOL_MISSES: Event = Event::builder()
        .name("pooled_buffers_string_pool_misses")
        .build();

    /// Entries pushed out of a full string pool bucket.
    pub(crate) static STRING_POOL_EVICTIONS: Event = Event::builder()
        .name("pooled_buffers_string_pool_evictions")
        .build();
}
