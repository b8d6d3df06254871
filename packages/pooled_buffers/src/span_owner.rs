use std::any::type_name;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};

use negative_impl::negative_impl;

use crate::constants::max_array_length;
use crate::{AllocationMode, ArrayPool, Error, Result, SharedArrayPool};

/// Short-lived owner of a pooled buffer, meant for function-local scratch space.
///
/// Unlike [`MemoryOwner`][crate::MemoryOwner], a `SpanOwner` has no disposed state to check:
/// it dereferences straight to the owned slice and gives the array back to the pool when it
/// goes out of scope. It is neither [`Send`] nor [`Sync`], which keeps it on the stack frame
/// of the thread that created it.
///
/// # Examples
///
/// ```
/// use pooled_buffers::{AllocationMode, SpanOwner};
///
/// fn checksum(data: &[u8]) -> u32 {
///     let mut scratch = SpanOwner::<u8>::allocate(data.len(), AllocationMode::Uninitialized)
///         .expect("length is within limits");
///
///     scratch.copy_from_slice(data);
///     scratch.reverse();
///     scratch.iter().map(|b| u32::from(*b)).sum()
/// }
///
/// assert_eq!(checksum(&[1, 2, 3]), 6);
/// ```
pub struct SpanOwner<T, P = SharedArrayPool<T>>
where
    P: ArrayPool<T>,
{
    array: Box<[T]>,
    length: usize,
    pool: P,
}

impl<T> SpanOwner<T>
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

    /// Creates an owner of zero elements.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            array: Box::default(),
            length: 0,
            pool: SharedArrayPool::shared(),
        }
    }
}

impl<T, P> SpanOwner<T, P>
where
    T: Copy + Default,
    P: ArrayPool<T>,
{
    /// Rents `length` elements from `pool`.
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

        if mode == AllocationMode::Clear {
            if let Some(visible) = array.get_mut(..length) {
                visible.fill(T::default());
            }
        }

        Ok(Self {
            array,
            length,
            pool,
        })
    }
}

impl<T, P> Deref for SpanOwner<T, P>
where
    P: ArrayPool<T>,
{
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.array
            .get(..self.length)
            .expect("rented array always covers the requested length")
    }
}

impl<T, P> DerefMut for SpanOwner<T, P>
where
    P: ArrayPool<T>,
{
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.array
            .get_mut(..self.length)
            .expect("rented array always covers the requested length")
    }
}

impl<T, P> Drop for SpanOwner<T, P>
where
    P: ArrayPool<T>,
{
    fn drop(&mut self) {
        self.pool.give_back(mem::take(&mut self.array), false);
    }
}

impl<T, P> fmt::Debug for SpanOwner<T, P>
where
    P: ArrayPool<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

#[negative_impl]
impl<T, P: ArrayPool<T>> !Send for SpanOwner<T, P> {}
#[negative_impl]
impl<T, P: ArrayPool<T>> !Sync for SpanOwner<T, P> {}
