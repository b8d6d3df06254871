use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;

use new_zealand::nz;

use crate::{Error, Result, StringPool};

pub(crate) const DEFAULT_BUCKET_COUNT: NonZero<usize> = nz!(32);
pub(crate) const DEFAULT_ENTRIES_PER_BUCKET: NonZero<usize> = nz!(64);

/// Smaller requested sizes are rounded up to this.
const MIN_SIZE: usize = 32;

/// Largest total number of entries a pool can be configured with.
const MAX_SIZE: usize = 1 << 24;

#[derive(Debug)]
enum Shape {
    Default,
    MinimumSize(usize),
    Layout {
        bucket_count: usize,
        entries_per_bucket: usize,
    },
}

/// Builder for creating an instance of [`StringPool`].
///
/// Either give a minimum total size and let the pool pick a balanced layout, or give the bucket
/// count and per-bucket capacity explicitly. Settings are validated by
/// [`build()`][Self::build].
///
/// # Examples
///
/// ```
/// use pooled_buffers::StringPool;
///
/// // Rounded up to 4096 entries, split as 64 buckets of 64 entries.
/// let pool = StringPool::builder().minimum_size(3000).build()?;
/// assert_eq!(pool.size(), 4096);
/// assert_eq!(pool.bucket_count(), 64);
///
/// let pool = StringPool::builder().layout(8, 4).build()?;
/// assert_eq!(pool.size(), 32);
///
/// assert!(StringPool::builder().layout(3, 4).build().is_err());
/// # Ok::<(), pooled_buffers::Error>(())
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) but not thread-safe ([`Sync`]).
#[derive(Debug)]
#[must_use]
pub struct StringPoolBuilder {
    shape: Shape,

    _not_sync: PhantomData<Cell<()>>,
}

impl StringPoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            shape: Shape::Default,
            _not_sync: PhantomData,
        }
    }

    /// Requests room for at least `size` strings.
    ///
    /// The size is raised to at least 32 and rounded up to a power of two `2^k`, then split
    /// into `2^floor(k/2)` buckets of `2^ceil(k/2)` entries each.
    #[inline]
    pub fn minimum_size(mut self, size: usize) -> Self {
        self.shape = Shape::MinimumSize(size);
        self
    }

    /// Sets the number of buckets and the number of entries each bucket holds.
    ///
    /// Both must be non-zero powers of two.
    #[inline]
    pub fn layout(mut self, bucket_count: usize, entries_per_bucket: usize) -> Self {
        self.shape = Shape::Layout {
            bucket_count,
            entries_per_bucket,
        };
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if a size is zero, if an explicit layout value is not a
    /// power of two, or if the total size exceeds 2^24 entries.
    pub fn build(self) -> Result<StringPool> {
        let (bucket_count, entries_per_bucket) = match self.shape {
            Shape::Default => (DEFAULT_BUCKET_COUNT, DEFAULT_ENTRIES_PER_BUCKET),
            Shape::MinimumSize(size) => split_size(size)?,
            Shape::Layout {
                bucket_count,
                entries_per_bucket,
            } => validate_layout(bucket_count, entries_per_bucket)?,
        };

        Ok(StringPool::with_layout(bucket_count, entries_per_bucket))
    }
}

fn split_size(size: usize) -> Result<(NonZero<usize>, NonZero<usize>)> {
    if size == 0 {
        return Err(Error::out_of_range("size", "must be positive"));
    }

    if size > MAX_SIZE {
        return Err(Error::out_of_range(
            "size",
            format!("{size} exceeds the largest supported size {MAX_SIZE}"),
        ));
    }

    let exponent = size.max(MIN_SIZE).next_power_of_two().trailing_zeros();
    let bucket_exponent = exponent / 2;
    let entries_exponent = exponent.wrapping_sub(bucket_exponent);

    Ok((power_of_two(bucket_exponent), power_of_two(entries_exponent)))
}

fn power_of_two(exponent: u32) -> NonZero<usize> {
    NonZero::new(1_usize << exponent).expect("exponents are bounded by the maximum size")
}

fn validate_layout(
    bucket_count: usize,
    entries_per_bucket: usize,
) -> Result<(NonZero<usize>, NonZero<usize>)> {
    let bucket_count = validate_dimension("bucket_count", bucket_count)?;
    let entries_per_bucket = validate_dimension("entries_per_bucket", entries_per_bucket)?;

    let total = bucket_count
        .get()
        .checked_mul(entries_per_bucket.get())
        .filter(|total| *total <= MAX_SIZE);

    if total.is_none() {
        return Err(Error::out_of_range(
            "entries_per_bucket",
            format!(
                "{bucket_count} buckets of {entries_per_bucket} entries exceed the limit of \
                 {MAX_SIZE} entries"
            ),
        ));
    }

    Ok((bucket_count, entries_per_bucket))
}

fn validate_dimension(parameter: &'static str, value: usize) -> Result<NonZero<usize>> {
    let value =
        NonZero::new(value).ok_or_else(|| Error::out_of_range(parameter, "must be positive"))?;

    if !value.is_power_of_two() {
        return Err(Error::out_of_range(
            parameter,
            format!("{value} is not a power of two"),
        ));
    }

    Ok(value)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(StringPoolBuilder: Send);
    assert_not_impl_any!(StringPoolBuilder: Sync);

    #[test]
    fn default_layout() {
        let pool = StringPool::builder().build().unwrap();

        assert_eq!(pool.bucket_count(), 32);
        assert_eq!(pool.entries_per_bucket(), 64);
        assert_eq!(pool.size(), 2048);
    }

    #[test]
    fn minimum_size_is_rounded_and_split() {
        let pool = StringPool::builder().minimum_size(1).build().unwrap();
        assert_eq!(pool.size(), 32);
        assert_eq!(pool.bucket_count(), 4);
        assert_eq!(pool.entries_per_bucket(), 8);

        let pool = StringPool::builder().minimum_size(1000).build().unwrap();
        assert_eq!(pool.size(), 1024);
        assert_eq!(pool.bucket_count(), 32);
        assert_eq!(pool.entries_per_bucket(), 32);

        let pool = StringPool::builder().minimum_size(2048).build().unwrap();
        assert_eq!(pool.bucket_count(), 32);
        assert_eq!(pool.entries_per_bucket(), 64);
    }

    #[test]
    fn invalid_minimum_size() {
        assert!(matches!(
            StringPool::builder().minimum_size(0).build(),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            StringPool::builder().minimum_size(MAX_SIZE + 1).build(),
            Err(Error::OutOfRange { .. })
        ));
        assert!(StringPool::builder().minimum_size(MAX_SIZE).build().is_ok());
    }

    #[test]
    fn invalid_layout() {
        for (buckets, entries) in [(0, 8), (8, 0), (3, 8), (8, 12), (1 << 20, 1 << 20)] {
            assert!(
                matches!(
                    StringPool::builder().layout(buckets, entries).build(),
                    Err(Error::OutOfRange { .. })
                ),
                "layout {buckets}x{entries} should be rejected"
            );
        }
    }

    #[test]
    fn explicit_layout() {
        let pool = StringPool::builder().layout(1, 1).build().unwrap();
        assert_eq!(pool.size(), 1);

        let pool = StringPool::builder().layout(128, 2).build().unwrap();
        assert_eq!(pool.bucket_count(), 128);
        assert_eq!(pool.entries_per_bucket(), 2);
    }

    #[test]
    fn last_setting_wins() {
        let pool = StringPool::builder()
            .layout(2, 2)
            .minimum_size(64)
            .build()
            .unwrap();

        assert_eq!(pool.size(), 64);
    }
}
