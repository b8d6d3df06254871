use std::any::type_name;
use std::fmt;

use crate::{BufferWriter, BufferWriterStream, Error, Result};

/// A [`BufferWriter`] over a caller-supplied region that never grows.
///
/// Requests that do not fit in the remaining free space fail with
/// [`Error::InvalidArgument`] instead of growing. The writer borrows the region for its whole
/// lifetime and has no allocation or release responsibility of its own.
///
/// # Examples
///
/// ```
/// use pooled_buffers::{BufferWriter, FixedBufferWriter};
///
/// let mut storage = [0_u8; 8];
/// let mut writer = FixedBufferWriter::new(&mut storage);
///
/// writer.write(b"abc")?;
/// assert_eq!(writer.written_span(), b"abc");
/// assert_eq!(writer.free_capacity(), 5);
///
/// // Does not fit.
/// assert!(writer.write(b"too long").is_err());
/// # Ok::<(), pooled_buffers::Error>(())
/// ```
pub struct FixedBufferWriter<'a, T> {
    region: &'a mut [T],

    /// Number of elements written. Never exceeds the region length.
    index: usize,
}

impl<'a, T> FixedBufferWriter<'a, T> {
    /// Creates a writer that fills `region` from the start.
    #[must_use]
    pub fn new(region: &'a mut [T]) -> Self {
        Self { region, index: 0 }
    }

    /// The number of elements written so far.
    #[must_use]
    #[inline]
    pub fn written_count(&self) -> usize {
        self.index
    }

    /// The length of the region.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.len()
    }

    /// The number of elements that can still be written.
    #[must_use]
    #[inline]
    pub fn free_capacity(&self) -> usize {
        // Cannot underflow, the cursor never passes the end of the region.
        self.region.len().wrapping_sub(self.index)
    }

    /// The elements written so far.
    #[must_use]
    pub fn written_span(&self) -> &[T] {
        self.region
            .get(..self.index)
            .expect("write cursor never exceeds the region length")
    }

    /// Resets the writer to empty, zeroing the previously written elements.
    pub fn clear(&mut self)
    where
        T: Default + Copy,
    {
        if let Some(written) = self.region.get_mut(..self.index) {
            written.fill(T::default());
        }

        self.index = 0;
    }

    /// Wraps the writer in a write-only [`BufferWriterStream`].
    #[must_use]
    pub fn into_stream(self) -> BufferWriterStream<Self>
    where
        Self: BufferWriter<u8>,
    {
        BufferWriterStream::new(self)
    }
}

impl<T> BufferWriter<T> for FixedBufferWriter<'_, T> {
    fn get_span(&mut self, size_hint: usize) -> Result<&mut [T]> {
        let size_hint = size_hint.max(1);
        let free = self.free_capacity();

        if size_hint > free {
            return Err(Error::invalid_argument(
                "size_hint",
                format!("{size_hint} elements requested but only {free} are free"),
            ));
        }

        Ok(self
            .region
            .get_mut(self.index..)
            .expect("write cursor never exceeds the region length"))
    }

    fn advance(&mut self, count: usize) -> Result<()> {
        let free = self.free_capacity();

        if count > free {
            return Err(Error::invalid_argument(
                "count",
                format!("cannot advance by {count} with only {free} elements free"),
            ));
        }

        // Cannot overflow, bounded by the region length.
        self.index = self.index.wrapping_add(count);
        Ok(())
    }
}

impl<T> fmt::Debug for FixedBufferWriter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("written_count", &self.index)
            .field("capacity", &self.region.len())
            .finish()
    }
}
