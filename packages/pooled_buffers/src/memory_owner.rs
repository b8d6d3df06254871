use std::any::type_name;
use std::fmt;

use crate::constants::max_array_length;
use crate::{
    AllocationMode, ArrayPool, Error, MemoryStream, Result, SharedArrayPool, StreamMemory,
};

const TYPE_NAME: &str = "MemoryOwner";

/// Exclusive owner of a region of memory rented from an [`ArrayPool`].
///
/// The owner exposes exactly the requested number of elements, even though the rented array
/// may be longer. The array goes back to the pool exactly once: either on an explicit
/// [`dispose()`][Self::dispose] or when the owner is dropped, whichever comes first. Disposing
/// more than once is a no-op.
///
/// Every accessor fails with [`Error::Disposed`] once the owner has been disposed.
///
/// # Examples
///
/// ```
/// use pooled_buffers::{AllocationMode, MemoryOwner};
///
/// let mut owner = MemoryOwner::<u8>::allocate(5, AllocationMode::Clear)?;
///
/// owner.span_mut()?.copy_from_slice(b"hello");
/// assert_eq!(owner.span()?, b"hello");
///
/// owner.dispose();
/// assert!(owner.span().is_err());
///
/// // Disposing again does nothing.
/// owner.dispose();
/// # Ok::<(), pooled_buffers::Error>(())
/// ```
///
/// # Thread safety
///
/// The owner is thread-mobile ([`Send`]) when both the elements and the pool handle are.
/// It performs no synchronization of its own.
pub struct MemoryOwner<T, P = SharedArrayPool<T>>
where
    P: ArrayPool<T>,
{
    /// `None` once disposed.
    array: Option<Box<[T]>>,

    /// Offset of the exposed region within `array`. Non-zero only for sliced owners.
    start: usize,

    length: usize,

    pool: P,
}

impl<T> MemoryOwner<T>
where
    T: Copy + Default + Send + 'static,
{
    /// Rents `length` elements from the process-wide [`SharedArrayPool`] for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `length` elements of `T` would exceed the largest
    /// possible allocation.
    pub fn allocate(length: usize, mode: AllocationMode) -> Result<Self> {
        Self::allocate_in(length, SharedArrayPool::shared(), mode)
    }

    /// Creates an owner of zero elements that holds no array.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            array: Some(Box::default()),
            start: 0,
            length: 0,
            pool: SharedArrayPool::shared(),
        }
    }
}

impl<T, P> MemoryOwner<T, P>
where
    T: Copy + Default,
    P: ArrayPool<T>,
{
    /// Rents `length` elements from `pool`.
    ///
    /// With [`AllocationMode::Clear`], the exposed region is filled with `T::default()`.
    /// With [`AllocationMode::Uninitialized`], it holds whatever the pool left in the array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `length` elements of `T` would exceed the largest
    /// possible allocation.
    pub fn allocate_in(length: usize, pool: P, mode: AllocationMode) -> Result<Self> {
        if length > max_array_length::<T>() {
            return Err(Error::out_of_range(
                "length",
                format!(
                    "{length} elements of {} exceed the largest possible allocation",
                    type_name::<T>()
                ),
            ));
        }

        let mut array = pool.rent(length);
        debug_assert!(array.len() >= length);

        if mode == AllocationMode::Clear {
            if let Some(visible) = array.get_mut(..length) {
                visible.fill(T::default());
            }
        }

        Ok(Self {
            array: Some(array),
            start: 0,
            length,
            pool,
        })
    }
}

impl<T, P> MemoryOwner<T, P>
where
    P: ArrayPool<T>,
{
    /// The number of elements exposed by this owner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the owner has been disposed.
    pub fn len(&self) -> Result<usize> {
        self.ensure_not_disposed()?;
        Ok(self.length)
    }

    /// Whether this owner exposes zero elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the owner has been disposed.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|length| length == 0)
    }

    /// Whether the owner has been disposed and its array given back.
    #[must_use]
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.array.is_none()
    }

    /// The owned elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the owner has been disposed.
    pub fn span(&self) -> Result<&[T]> {
        let array = self.array.as_deref().ok_or(Error::disposed(TYPE_NAME))?;

        Ok(array
            .get(self.start..)
            .and_then(|tail| tail.get(..self.length))
            .expect("exposed region always lies within the rented array"))
    }

    /// The owned elements, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the owner has been disposed.
    pub fn span_mut(&mut self) -> Result<&mut [T]> {
        let array = self
            .array
            .as_deref_mut()
            .ok_or(Error::disposed(TYPE_NAME))?;

        Ok(array
            .get_mut(self.start..)
            .and_then(|tail| tail.get_mut(..self.length))
            .expect("exposed region always lies within the rented array"))
    }

    /// Narrows the owner to `length` elements starting at `start`, transferring ownership of
    /// the rented array to the returned owner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the owner has been disposed and [`Error::OutOfRange`] if
    /// the requested region does not lie within the current one.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_buffers::{AllocationMode, MemoryOwner};
    ///
    /// let mut owner = MemoryOwner::<u8>::allocate(6, AllocationMode::Clear)?;
    /// owner.span_mut()?.copy_from_slice(b"abcdef");
    ///
    /// let middle = owner.slice(2, 3)?;
    /// assert_eq!(middle.span()?, b"cde");
    /// # Ok::<(), pooled_buffers::Error>(())
    /// ```
    pub fn slice(mut self, start: usize, length: usize) -> Result<Self> {
        self.ensure_not_disposed()?;

        if start > self.length {
            return Err(Error::out_of_range(
                "start",
                format!("{start} is past the end of {} elements", self.length),
            ));
        }

        // Cannot underflow, checked above.
        let remaining = self.length.wrapping_sub(start);

        if length > remaining {
            return Err(Error::out_of_range(
                "length",
                format!("{length} elements starting at {start} exceed the remaining {remaining}"),
            ));
        }

        self.start = self
            .start
            .checked_add(start)
            .expect("offset within the rented array cannot overflow");
        self.length = length;

        Ok(self)
    }

    /// Releases the rented array back to the pool. Subsequent calls do nothing.
    pub fn dispose(&mut self) {
        if let Some(array) = self.array.take() {
            self.pool.give_back(array, false);
        }
    }

    /// Wraps the owner in a [`MemoryStream`] that reads and writes the owned bytes and gives
    /// the array back to the pool when the stream is disposed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the owner has been disposed.
    pub fn into_stream(self) -> Result<MemoryStream<Self>>
    where
        Self: StreamMemory,
    {
        self.ensure_not_disposed()?;
        Ok(MemoryStream::new(self))
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::disposed(TYPE_NAME))
        } else {
            Ok(())
        }
    }
}

impl<T, P> Drop for MemoryOwner<T, P>
where
    P: ArrayPool<T>,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T, P> fmt::Debug for MemoryOwner<T, P>
where
    P: ArrayPool<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("length", &self.length)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
