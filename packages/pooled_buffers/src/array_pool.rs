use std::mem;
use std::sync::Arc;

/// A source of reusable arrays.
///
/// Owners and writers in this crate never allocate their backing arrays directly. They rent
/// them from an `ArrayPool` and give them back once done, so that short-lived buffers of
/// varying sizes do not churn the global allocator.
///
/// Implementations shared between owners must be safe to use from multiple threads at the
/// same time. The owners and writers themselves are single-owner types and perform no locking.
///
/// The trait is implemented for references and [`Arc`]s of pools, so an owner can hold a pool
/// by value, by reference or by shared handle.
///
/// # Examples
///
/// ```
/// use pooled_buffers::{ArrayPool, SharedArrayPool};
///
/// let pool = SharedArrayPool::<u8>::shared();
///
/// let array = pool.rent(100);
/// assert!(array.len() >= 100);
///
/// pool.give_back(array, false);
/// ```
pub trait ArrayPool<T> {
    /// Rents an array of at least `minimum_length` elements.
    ///
    /// The contents of the returned array are unspecified: a reused array still holds the
    /// values written by its previous tenant.
    #[must_use]
    fn rent(&self, minimum_length: usize) -> Box<[T]>;

    /// Gives an array previously obtained from [`rent()`][Self::rent] back to the pool.
    ///
    /// If `clear` is set, the array is reset to default values before anyone else can rent it.
    /// The pool may decide to drop the array instead of retaining it.
    fn give_back(&self, array: Box<[T]>, clear: bool);

    /// Replaces `array` with a rented array of `new_length` elements, copying over as many
    /// existing elements as fit and giving the old array back to the pool.
    ///
    /// The new array is at least `new_length` long. If `clear` is set, the old array is cleared
    /// when given back.
    fn resize(&self, array: &mut Box<[T]>, new_length: usize, clear: bool)
    where
        T: Copy,
    {
        if array.len() == new_length {
            return;
        }

        let mut replacement = self.rent(new_length);
        let preserved = array.len().min(new_length);

        if let (Some(target), Some(source)) =
            (replacement.get_mut(..preserved), array.get(..preserved))
        {
            target.copy_from_slice(source);
        }

        let previous = mem::replace(array, replacement);
        self.give_back(previous, clear);
    }
}

impl<T, P> ArrayPool<T> for &P
where
    P: ArrayPool<T> + ?Sized,
{
    #[inline]
    fn rent(&self, minimum_length: usize) -> Box<[T]> {
        (**self).rent(minimum_length)
    }

    #[inline]
    fn give_back(&self, array: Box<[T]>, clear: bool) {
        (**self).give_back(array, clear);
    }
}

impl<T, P> ArrayPool<T> for Arc<P>
where
    P: ArrayPool<T> + ?Sized,
{
    #[inline]
    fn rent(&self, minimum_length: usize) -> Box<[T]> {
        (**self).rent(minimum_length)
    }

    #[inline]
    fn give_back(&self, array: Box<[T]>, clear: bool) {
        (**self).give_back(array, clear);
    }
}
