use std::any::type_name;
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::num::NonZero;
use std::str;
use std::sync::{Arc, LazyLock};

use foldhash::fast::FixedState;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::decoded_chars::DecodedChars;
use crate::metrics::{STRING_POOL_EVICTIONS, STRING_POOL_HITS, STRING_POOL_MISSES};
use crate::string_pool_builder::{DEFAULT_BUCKET_COUNT, DEFAULT_ENTRIES_PER_BUCKET};
use crate::{StringPoolBuilder, TextEncoding};

/// Fixed so that fingerprints are stable for the lifetime of the process regardless of which
/// thread or pool computes them.
const FINGERPRINT_SEED: u64 = 0x5354_5250_4f4f_4c31;

static EMPTY: LazyLock<Arc<str>> = LazyLock::new(|| Arc::from(""));

static SHARED: LazyLock<StringPool> = LazyLock::new(|| {
    debug!("creating shared string pool");
    StringPool::new()
});

/// A bounded, thread-safe cache that deduplicates strings by content.
///
/// Looking up content that was added before returns the very same [`Arc<str>`] instance, so
/// repeated text (keys in parsed documents, names read from the network) is materialized once
/// and shared afterwards.
///
/// The pool is split into a power-of-two number of buckets, each holding a bounded number of
/// entries behind its own lock. The bucket for some content is chosen from a fingerprint of
/// its characters. When a bucket is full, adding to it evicts its least recently used entry.
///
/// Strings handed out by the pool are independently owned: evicting them or resetting the pool
/// only means the pool stops returning them.
///
/// Empty content always maps to one canonical empty string and never touches a bucket.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use pooled_buffers::{StringPool, TextEncoding};
///
/// let pool = StringPool::new();
///
/// let first = pool.get_or_add("hello");
/// let second = pool.get_or_add(&String::from("hello"));
/// assert!(Arc::ptr_eq(&first, &second));
///
/// // Byte input is decoded before the lookup.
/// let utf16 = [0x68, 0, 0x65, 0, 0x6C, 0, 0x6C, 0, 0x6F, 0];
/// let third = pool.get_or_add_bytes(&utf16, TextEncoding::Utf16Le);
/// assert!(Arc::ptr_eq(&first, &third));
/// ```
///
/// # Thread safety
///
/// The pool is thread-safe ([`Send`] and [`Sync`]). Threads working with content that lands
/// in different buckets do not contend.
pub struct StringPool {
    buckets: Box<[Mutex<Bucket>]>,

    /// `buckets.len() - 1`. The bucket count is a power of two.
    bucket_mask: u64,

    entries_per_bucket: NonZero<usize>,
}

impl StringPool {
    /// Creates a builder for configuring and constructing a [`StringPool`].
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_buffers::StringPool;
    ///
    /// let pool = StringPool::builder().layout(16, 8).build()?;
    /// assert_eq!(pool.size(), 128);
    /// # Ok::<(), pooled_buffers::Error>(())
    /// ```
    #[inline]
    pub fn builder() -> StringPoolBuilder {
        StringPoolBuilder::new()
    }

    /// Creates a pool with the default layout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_layout(DEFAULT_BUCKET_COUNT, DEFAULT_ENTRIES_PER_BUCKET)
    }

    /// The process-wide pool, created with the default layout on first use.
    ///
    /// Code that wants to stay testable can take a `&StringPool` and be handed this instance.
    #[must_use]
    pub fn shared() -> &'static Self {
        &SHARED
    }

    pub(crate) fn with_layout(
        bucket_count: NonZero<usize>,
        entries_per_bucket: NonZero<usize>,
    ) -> Self {
        debug_assert!(bucket_count.is_power_of_two());

        let buckets = (0..bucket_count.get())
            .map(|_| Mutex::new(Bucket::new(entries_per_bucket)))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buckets,
            bucket_mask: u64::try_from(bucket_count.get().wrapping_sub(1))
                .expect("bucket count fits in u64 on all supported targets"),
            entries_per_bucket,
        }
    }

    /// The maximum number of strings the pool holds at once.
    #[must_use]
    pub fn size(&self) -> usize {
        self.buckets
            .len()
            .checked_mul(self.entries_per_bucket.get())
            .expect("layout is validated against overflow when the pool is built")
    }

    /// The number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The number of strings each bucket holds before evicting.
    #[must_use]
    pub fn entries_per_bucket(&self) -> usize {
        self.entries_per_bucket.get()
    }

    /// The number of strings currently in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.lock().entries.len()).sum()
    }

    /// Whether the pool holds no strings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.lock().entries.is_empty())
    }

    /// Stores `value` in the pool, replacing any stored string with the same content.
    ///
    /// Empty strings are not stored; empty content always resolves to the canonical instance.
    pub fn add(&self, value: Arc<str>) {
        if value.is_empty() {
            return;
        }

        let fingerprint = fingerprint(value.chars());
        self.bucket(fingerprint).lock().insert(fingerprint, value);
    }

    /// Returns the stored string with the same content as `content`, if there is one.
    ///
    /// A miss does not change the pool.
    #[must_use]
    pub fn try_get(&self, content: &str) -> Option<Arc<str>> {
        if content.is_empty() {
            return Some(empty());
        }

        let fingerprint = fingerprint(content.chars());
        let found = self
            .bucket(fingerprint)
            .lock()
            .find(fingerprint, |stored| stored == content);

        record_lookup(found.is_some());
        found
    }

    /// Returns the stored string with the same content as `content`, storing a new one first if
    /// there is none.
    #[must_use]
    pub fn get_or_add(&self, content: &str) -> Arc<str> {
        if content.is_empty() {
            return empty();
        }

        self.get_or_insert_with(
            fingerprint(content.chars()),
            |stored| stored == content,
            || Arc::from(content),
        )
    }

    /// Returns the stored string with the same content as `value`, storing `value` itself if
    /// there is none.
    #[must_use]
    pub fn get_or_add_arc(&self, value: Arc<str>) -> Arc<str> {
        if value.is_empty() {
            return empty();
        }

        let fingerprint = fingerprint(value.chars());

        self.get_or_insert_with(fingerprint, |stored| stored == &*value, || {
            Arc::clone(&value)
        })
    }

    /// Decodes `bytes` with `encoding` and behaves like [`get_or_add()`][Self::get_or_add]
    /// with the decoded text.
    ///
    /// The bytes are fingerprinted and compared while being decoded, so a hit does not
    /// allocate. Malformed input decodes as U+FFFD.
    #[must_use]
    pub fn get_or_add_bytes(&self, bytes: &[u8], encoding: TextEncoding) -> Arc<str> {
        let direct = match encoding {
            TextEncoding::Utf8 => str::from_utf8(bytes).ok(),
            TextEncoding::Latin1 if bytes.is_ascii() => str::from_utf8(bytes).ok(),
            _ => None,
        };

        if let Some(text) = direct {
            return self.get_or_add(text);
        }

        let chars = DecodedChars::new(bytes, encoding);

        if chars.clone().next().is_none() {
            return empty();
        }

        self.get_or_insert_with(
            fingerprint(chars.clone()),
            |stored| stored.chars().eq(chars.clone()),
            || Arc::from(chars.clone().collect::<String>()),
        )
    }

    /// Removes every string from the pool.
    ///
    /// Strings handed out earlier stay valid but are no longer returned by lookups.
    pub fn reset(&self) {
        for bucket in &self.buckets {
            bucket.lock().entries.clear();
        }

        debug!(size = self.size(), "string pool reset");
    }

    fn bucket(&self, fingerprint: u64) -> &Mutex<Bucket> {
        let index = usize::try_from(fingerprint & self.bucket_mask)
            .expect("masked fingerprint is below the bucket count");

        self.buckets
            .get(index)
            .expect("masked fingerprint is below the bucket count")
    }

    fn get_or_insert_with(
        &self,
        fingerprint: u64,
        matches: impl Fn(&str) -> bool,
        materialize: impl FnOnce() -> Arc<str>,
    ) -> Arc<str> {
        let mut bucket = self.bucket(fingerprint).lock();

        if let Some(existing) = bucket.find(fingerprint, matches) {
            record_lookup(true);
            return existing;
        }

        record_lookup(false);

        let value = materialize();
        bucket.insert(fingerprint, Arc::clone(&value));
        value
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("bucket_count", &self.buckets.len())
            .field("entries_per_bucket", &self.entries_per_bucket)
            .finish()
    }
}

struct Bucket {
    entries: Vec<Entry>,
    limit: NonZero<usize>,

    /// Logical time of the most recent access. Entries with the smallest stamp are evicted
    /// first.
    clock: u64,
}

struct Entry {
    fingerprint: u64,
    value: Arc<str>,
    last_used: u64,
}

impl Bucket {
    fn new(limit: NonZero<usize>) -> Self {
        Self {
            entries: Vec::new(),
            limit,
            clock: 0,
        }
    }

    #[cfg_attr(test, mutants::skip)] // Wrapping the clock is untestable in practice.
    fn tick(&mut self) -> u64 {
        self.clock = self.clock.wrapping_add(1);
        self.clock
    }

    fn find(&mut self, fingerprint: u64, matches: impl Fn(&str) -> bool) -> Option<Arc<str>> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.fingerprint == fingerprint && matches(&entry.value))?;

        let now = self.tick();
        let entry = self.entries.get_mut(index)?;

        entry.last_used = now;
        Some(Arc::clone(&entry.value))
    }

    fn insert(&mut self, fingerprint: u64, value: Arc<str>) {
        let now = self.tick();

        let new_entry = Entry {
            fingerprint,
            value,
            last_used: now,
        };

        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|entry| entry.fingerprint == fingerprint && entry.value == new_entry.value)
        {
            *existing = new_entry;
            return;
        }

        if self.entries.len() < self.limit.get() {
            self.entries.push(new_entry);
            return;
        }

        let oldest = self
            .entries
            .iter_mut()
            .min_by_key(|entry| entry.last_used)
            .expect("a full bucket has at least one entry");

        trace!(evicted_length = oldest.value.len(), "string pool bucket full, evicting");
        STRING_POOL_EVICTIONS.with(|event| event.observe_once());

        *oldest = new_entry;
    }
}

fn fingerprint(chars: impl Iterator<Item = char>) -> u64 {
    let mut hasher = FixedState::with_seed(FINGERPRINT_SEED).build_hasher();

    for c in chars {
        hasher.write_u32(u32::from(c));
    }

    hasher.finish()
}

fn empty() -> Arc<str> {
    Arc::clone(&EMPTY)
}

fn record_lookup(hit: bool) {
    if hit {
        STRING_POOL_HITS.with(|event| event.observe_once());
    } else {
        STRING_POOL_MISSES.with(|event| event.observe_once());
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::{ptr, thread};

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(StringPool: Send, Sync);

    #[test]
    fn equal_content_returns_same_instance() {
        let pool = StringPool::new();

        let first_buffer = String::from("interned");
        let second_buffer = String::from("interned");

        let first = pool.get_or_add(&first_buffer);
        let second = pool.get_or_add(&second_buffer);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn reset_forgets_instances() {
        let pool = StringPool::new();

        let before = pool.get_or_add("value");
        pool.reset();

        assert!(pool.is_empty());
        assert_eq!(pool.try_get("value"), None);

        let after = pool.get_or_add("value");
        assert!(!Arc::ptr_eq(&before, &after));

        // Previously returned instances remain usable.
        assert_eq!(&*before, "value");
    }

    #[test]
    fn empty_content_is_canonical() {
        let pool = StringPool::new();

        let a = pool.get_or_add("");
        let b = pool.try_get("").unwrap();
        let c = pool.get_or_add_bytes(&[], TextEncoding::Utf16Le);
        let d = StringPool::shared().get_or_add_arc(Arc::from(""));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert!(Arc::ptr_eq(&a, &d));
        assert!(pool.is_empty());

        pool.add(Arc::from(""));
        assert!(pool.is_empty());
    }

    #[test]
    fn try_get_miss_does_not_insert() {
        let pool = StringPool::new();

        assert_eq!(pool.try_get("absent"), None);
        assert!(pool.is_empty());
    }

    #[test]
    fn add_then_try_get() {
        let pool = StringPool::new();
        let value: Arc<str> = Arc::from("added");

        pool.add(Arc::clone(&value));

        let found = pool.try_get("added").unwrap();
        assert!(Arc::ptr_eq(&found, &value));
    }

    #[test]
    fn add_replaces_equal_content() {
        let pool = StringPool::new();

        let first: Arc<str> = Arc::from("same");
        let second: Arc<str> = Arc::from("same");

        pool.add(Arc::clone(&first));
        pool.add(Arc::clone(&second));

        assert_eq!(pool.len(), 1);
        assert!(Arc::ptr_eq(&pool.try_get("same").unwrap(), &second));
    }

    #[test]
    fn get_or_add_arc_stores_caller_instance() {
        let pool = StringPool::new();
        let value: Arc<str> = Arc::from("owned by caller");

        let stored = pool.get_or_add_arc(Arc::clone(&value));
        assert!(Arc::ptr_eq(&stored, &value));

        let again = pool.get_or_add_arc(Arc::from("owned by caller"));
        assert!(Arc::ptr_eq(&again, &value));
    }

    #[test]
    fn bytes_resolve_to_same_instance_as_text() {
        let pool = StringPool::new();
        let text = "Grüße 🦀";

        let from_text = pool.get_or_add(text);

        let utf16le = text.encode_utf16().flat_map(u16::to_le_bytes).collect::<Vec<_>>();
        let utf16be = text.encode_utf16().flat_map(u16::to_be_bytes).collect::<Vec<_>>();

        assert!(Arc::ptr_eq(
            &from_text,
            &pool.get_or_add_bytes(text.as_bytes(), TextEncoding::Utf8)
        ));
        assert!(Arc::ptr_eq(
            &from_text,
            &pool.get_or_add_bytes(&utf16le, TextEncoding::Utf16Le)
        ));
        assert!(Arc::ptr_eq(
            &from_text,
            &pool.get_or_add_bytes(&utf16be, TextEncoding::Utf16Be)
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn latin1_bytes_resolve_to_decoded_text() {
        let pool = StringPool::new();

        let ascii = pool.get_or_add_bytes(b"plain", TextEncoding::Latin1);
        assert!(Arc::ptr_eq(&ascii, &pool.get_or_add("plain")));

        let accented = pool.get_or_add_bytes(&[0x63, 0x61, 0x66, 0xE9], TextEncoding::Latin1);
        assert_eq!(&*accented, "café");
        assert!(Arc::ptr_eq(&accented, &pool.get_or_add("café")));
    }

    #[test]
    fn malformed_bytes_match_lossy_decoding() {
        let pool = StringPool::new();

        let decoded = pool.get_or_add_bytes(b"ab\xFFcd", TextEncoding::Utf8);
        assert_eq!(&*decoded, "ab\u{FFFD}cd");

        let lossy = String::from_utf8_lossy(b"ab\xFFcd");
        assert!(Arc::ptr_eq(&decoded, &pool.try_get(&lossy).unwrap()));
    }

    #[test]
    fn full_bucket_evicts_least_recently_used() {
        let pool = StringPool::builder().layout(1, 2).build().unwrap();

        let a = pool.get_or_add("a");
        let _b = pool.get_or_add("b");

        // Touch "a" so that "b" becomes the eviction candidate.
        assert!(Arc::ptr_eq(&a, &pool.try_get("a").unwrap()));

        let _c = pool.get_or_add("c");

        assert_eq!(pool.len(), 2);
        assert!(pool.try_get("a").is_some());
        assert!(pool.try_get("b").is_none());
        assert!(pool.try_get("c").is_some());
    }

    #[test]
    fn never_exceeds_size() {
        let pool = StringPool::builder().layout(4, 4).build().unwrap();

        for i in 0..1000 {
            let _value = pool.get_or_add(&i.to_string());
        }

        assert!(pool.len() <= pool.size());
        assert_eq!(pool.size(), 16);
    }

    #[test]
    fn shared_is_one_instance() {
        assert!(ptr::eq(StringPool::shared(), StringPool::shared()));
    }

    #[test]
    fn concurrent_lookups_agree() {
        // Fewer keys than one bucket holds, so nothing can be evicted.
        let pool = StringPool::new();

        let results = thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        (0..64)
                            .map(|i| pool.get_or_add(&format!("concurrent-{i}")))
                            .collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        let (first, rest) = results.split_first().unwrap();

        for (i, value) in first.iter().enumerate() {
            assert_eq!(&**value, format!("concurrent-{i}"));
        }

        for values in rest {
            for (value, expected) in values.iter().zip(first) {
                assert!(Arc::ptr_eq(value, expected), "{value} was interned twice");
            }
        }

        assert_eq!(pool.len(), 64);
    }
}
