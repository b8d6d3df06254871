use std::any::type_name;
use std::fmt;
use std::num::NonZero;

use new_zealand::nz;
use tracing::debug;

use crate::constants::max_array_length;
use crate::{ArrayPool, BufferWriter, BufferWriterStream, Error, Result, SharedArrayPool};

const TYPE_NAME: &str = "PooledBufferWriter";

/// Capacity rented by a writer that was not given an initial capacity.
const DEFAULT_INITIAL_CAPACITY: NonZero<usize> = nz!(256);

/// A growable [`BufferWriter`] backed by arrays rented from an [`ArrayPool`].
///
/// When a request does not fit in the free capacity, the writer rents a new array whose length
/// is the smallest power of two that holds everything written so far plus the request, copies
/// the written elements over and gives the old array back to the pool. A fresh writer starts
/// with 256 elements.
///
/// Written elements stay in place until [`clear()`][Self::clear], which also zeroes them so a
/// later reader of the same array cannot see them.
///
/// # Examples
///
/// ```
/// use pooled_buffers::{BufferWriter, PooledBufferWriter};
///
/// let mut writer = PooledBufferWriter::<u8>::new();
///
/// writer.write(b"hello, ")?;
/// writer.write(b"world")?;
///
/// assert_eq!(writer.written_span()?, b"hello, world");
/// assert_eq!(writer.capacity()?, 256);
///
/// // Growing beyond the current capacity moves to the next power of two.
/// writer.get_span(300)?;
/// assert_eq!(writer.capacity()?, 512);
/// # Ok::<(), pooled_buffers::Error>(())
/// ```
///
/// # Thread safety
///
/// The writer is thread-mobile ([`Send`]) when both the elements and the pool handle are.
/// It performs no synchronization of its own.
pub struct PooledBufferWriter<T, P = SharedArrayPool<T>>
where
    P: ArrayPool<T>,
{
    /// `None` once disposed.
    array: Option<Box<[T]>>,

    /// Number of elements written. Never exceeds the array length.
    index: usize,

    pool: P,
}

impl<T> PooledBufferWriter<T>
where
    T: Copy + Default + Send + 'static,
{
    /// Creates a writer renting from the process-wide [`SharedArrayPool`] for `T`.
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(SharedArrayPool::shared())
    }

    /// Creates a writer renting from the process-wide [`SharedArrayPool`] for `T`, starting
    /// with room for at least `initial_capacity` elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `initial_capacity` is zero or larger than the largest
    /// possible allocation.
    pub fn with_capacity(initial_capacity: usize) -> Result<Self> {
        Self::with_capacity_in(initial_capacity, SharedArrayPool::shared())
    }
}

impl<T> Default for PooledBufferWriter<T>
where
    T: Copy + Default + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P> PooledBufferWriter<T, P>
where
    T: Copy + Default,
    P: ArrayPool<T>,
{
    /// Creates a writer renting from `pool`.
    #[must_use]
    pub fn new_in(pool: P) -> Self {
        let array = pool.rent(DEFAULT_INITIAL_CAPACITY.get());

        Self {
            array: Some(array),
            index: 0,
            pool,
        }
    }

    /// Creates a writer renting from `pool`, starting with room for at least
    /// `initial_capacity` elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `initial_capacity` is zero or larger than the largest
    /// possible allocation.
    pub fn with_capacity_in(initial_capacity: usize, pool: P) -> Result<Self> {
        if initial_capacity == 0 {
            return Err(Error::out_of_range(
                "initial_capacity",
                "initial capacity must be greater than zero",
            ));
        }

        if initial_capacity > max_array_length::<T>() {
            return Err(Error::out_of_range(
                "initial_capacity",
                format!("{initial_capacity} exceeds the largest possible allocation"),
            ));
        }

        let array = pool.rent(initial_capacity);

        Ok(Self {
            array: Some(array),
            index: 0,
            pool,
        })
    }

    /// Resets the writer to empty, zeroing the previously written elements.
    ///
    /// The backing array is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the writer has been disposed.
    pub fn clear(&mut self) -> Result<()> {
        let index = self.index;
        let array = self.array_mut()?;

        if let Some(written) = array.get_mut(..index) {
            written.fill(T::default());
        }

        self.index = 0;
        Ok(())
    }

    /// Makes sure at least `size_hint` elements (at least one if zero) are free, growing the
    /// backing array if needed.
    #[cfg_attr(test, mutants::skip)] // Can be mutated to infinitely growing memory use.
    fn ensure_capacity(&mut self, size_hint: usize) -> Result<()> {
        let size_hint = size_hint.max(1);
        let index = self.index;
        let capacity = self.array()?.len();

        // Cannot underflow, the cursor never passes the end of the array.
        if size_hint <= capacity.wrapping_sub(index) {
            return Ok(());
        }

        let required = index.checked_add(size_hint).ok_or_else(|| {
            Error::out_of_range(
                "size_hint",
                format!("{size_hint} more elements after {index} would overflow"),
            )
        })?;

        let new_capacity = required
            .checked_next_power_of_two()
            .filter(|c| *c <= max_array_length::<T>())
            .ok_or_else(|| {
                Error::out_of_range(
                    "size_hint",
                    format!("{required} elements exceed the largest possible allocation"),
                )
            })?;

        debug!(
            written = index,
            old_capacity = capacity,
            new_capacity,
            "growing pooled buffer writer"
        );

        let pool = &self.pool;
        let array = self
            .array
            .as_mut()
            .ok_or(Error::disposed(TYPE_NAME))?;
        pool.resize(array, new_capacity, false);

        Ok(())
    }
}

impl<T, P> PooledBufferWriter<T, P>
where
    P: ArrayPool<T>,
{
    /// The number of elements written so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the writer has been disposed.
    pub fn written_count(&self) -> Result<usize> {
        self.array()?;
        Ok(self.index)
    }

    /// The length of the backing array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the writer has been disposed.
    pub fn capacity(&self) -> Result<usize> {
        Ok(self.array()?.len())
    }

    /// The number of elements that can be written without growing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the writer has been disposed.
    pub fn free_capacity(&self) -> Result<usize> {
        // Cannot underflow, the cursor never passes the end of the array.
        Ok(self.array()?.len().wrapping_sub(self.index))
    }

    /// The elements written so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the writer has been disposed.
    pub fn written_span(&self) -> Result<&[T]> {
        let array = self.array()?;

        Ok(array
            .get(..self.index)
            .expect("write cursor never exceeds the array length"))
    }

    /// Whether the writer has been disposed and its array given back.
    #[must_use]
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.array.is_none()
    }

    /// Gives the backing array back to the pool. Subsequent calls do nothing.
    pub fn dispose(&mut self) {
        if let Some(array) = self.array.take() {
            self.pool.give_back(array, false);
        }
    }

    /// Wraps the writer in a write-only [`BufferWriterStream`].
    pub fn into_stream(self) -> BufferWriterStream<Self>
    where
        Self: BufferWriter<u8>,
    {
        BufferWriterStream::new(self)
    }

    fn array(&self) -> Result<&[T]> {
        self.array.as_deref().ok_or(Error::disposed(TYPE_NAME))
    }

    fn array_mut(&mut self) -> Result<&mut [T]> {
        self.array.as_deref_mut().ok_or(Error::disposed(TYPE_NAME))
    }
}

impl<T, P> BufferWriter<T> for PooledBufferWriter<T, P>
where
    T: Copy + Default,
    P: ArrayPool<T>,
{
    fn get_span(&mut self, size_hint: usize) -> Result<&mut [T]> {
        self.ensure_capacity(size_hint)?;

        let index = self.index;
        let array = self.array_mut()?;

        Ok(array
            .get_mut(index..)
            .expect("write cursor never exceeds the array length"))
    }

    fn advance(&mut self, count: usize) -> Result<()> {
        let free = self.free_capacity()?;

        if count > free {
            return Err(Error::invalid_argument(
                "count",
                format!("cannot advance by {count} with only {free} elements free"),
            ));
        }

        // Cannot overflow, bounded by the array length.
        self.index = self.index.wrapping_add(count);
        Ok(())
    }
}

impl<T, P> Drop for PooledBufferWriter<T, P>
where
    P: ArrayPool<T>,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T, P> fmt::Debug for PooledBufferWriter<T, P>
where
    P: ArrayPool<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("written_count", &self.index)
            .field("capacity", &self.array.as_deref().map(<[T]>::len))
            .finish_non_exhaustive()
    }
}
