use crate::{Error, Result};

/// A sink that hands out writable regions and is told afterwards how much of each was filled.
///
/// Producers that append data without knowing the concrete backing store depend only on this
/// trait: they ask for a region with [`get_span()`][Self::get_span], write into (a prefix of) it
/// and then [`advance()`][Self::advance] by the number of elements written.
///
/// A size hint of zero means "any non-empty region will do".
///
/// # Examples
///
/// ```
/// use pooled_buffers::{BufferWriter, PooledBufferWriter};
///
/// fn write_greeting(sink: &mut impl BufferWriter<u8>) -> pooled_buffers::Result<()> {
///     let span = sink.get_span(5)?;
///     span[..5].copy_from_slice(b"hello");
///     sink.advance(5)
/// }
///
/// let mut writer = PooledBufferWriter::<u8>::new();
/// write_greeting(&mut writer)?;
///
/// assert_eq!(writer.written_span()?, b"hello");
/// # Ok::<(), pooled_buffers::Error>(())
/// ```
pub trait BufferWriter<T> {
    /// Returns a writable region of at least `size_hint` elements (at least one element if
    /// `size_hint` is zero).
    ///
    /// The contents of the region are unspecified. Nothing is committed until
    /// [`advance()`][Self::advance] is called.
    ///
    /// # Errors
    ///
    /// Fails if the sink cannot provide a region of the requested size or has been disposed.
    fn get_span(&mut self, size_hint: usize) -> Result<&mut [T]>;

    /// Same as [`get_span()`][Self::get_span].
    ///
    /// Kept for producers written against memory-handle APIs. Under Rust borrowing a region
    /// handle and a slice are the same thing.
    ///
    /// # Errors
    ///
    /// Fails if the sink cannot provide a region of the requested size or has been disposed.
    #[inline]
    fn get_memory(&mut self, size_hint: usize) -> Result<&mut [T]> {
        self.get_span(size_hint)
    }

    /// Commits `count` elements of the most recently returned region as written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `count` exceeds the free capacity, or
    /// [`Error::Disposed`] if the sink has been disposed.
    fn advance(&mut self, count: usize) -> Result<()>;

    /// Appends all of `data` or nothing.
    ///
    /// Empty `data` always succeeds on a usable sink, even a full one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the sink returns a region shorter than `data`,
    /// plus anything [`get_span()`][Self::get_span] or [`advance()`][Self::advance] return.
    fn write(&mut self, data: &[T]) -> Result<()>
    where
        T: Copy,
    {
        if data.is_empty() {
            // Still surfaces a disposed sink.
            return self.advance(0);
        }

        let span = self.get_span(data.len())?;
        let provided = span.len();

        let Some(target) = span.get_mut(..data.len()) else {
            return Err(Error::invalid_argument(
                "data",
                format!(
                    "sink provided {provided} elements but {} were required",
                    data.len()
                ),
            ));
        };

        target.copy_from_slice(data);
        self.advance(data.len())
    }

    /// Appends a single element.
    ///
    /// # Errors
    ///
    /// Same as [`write()`][Self::write].
    fn write_one(&mut self, value: T) -> Result<()>
    where
        T: Copy,
    {
        self.write(&[value])
    }
}

impl<T, W> BufferWriter<T> for &mut W
where
    W: BufferWriter<T> + ?Sized,
{
    #[inline]
    fn get_span(&mut self, size_hint: usize) -> Result<&mut [T]> {
        (**self).get_span(size_hint)
    }

    #[inline]
    fn advance(&mut self, count: usize) -> Result<()> {
        (**self).advance(count)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{FixedBufferWriter, PooledBufferWriter};

    /// A sink that always returns a region of a fixed length, regardless of the hint.
    struct StingySink {
        region: [u8; 4],
        committed: usize,
    }

    impl BufferWriter<u8> for StingySink {
        fn get_span(&mut self, _size_hint: usize) -> Result<&mut [u8]> {
            Ok(&mut self.region)
        }

        fn advance(&mut self, count: usize) -> Result<()> {
            self.committed += count;
            Ok(())
        }
    }

    #[test]
    fn write_fits() {
        let mut sink = StingySink {
            region: [0; 4],
            committed: 0,
        };

        sink.write(&[1, 2, 3]).unwrap();

        assert_eq!(sink.committed, 3);
        assert_eq!(&sink.region[..3], &[1, 2, 3]);
    }

    #[test]
    fn write_larger_than_region_commits_nothing() {
        let mut sink = StingySink {
            region: [0; 4],
            committed: 0,
        };

        let result = sink.write(&[1, 2, 3, 4, 5]);

        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
        assert_eq!(sink.committed, 0);
        assert_eq!(sink.region, [0; 4]);
    }

    #[test]
    fn empty_write_skips_region_request() {
        let mut storage = [0_u8; 2];
        let mut sink = FixedBufferWriter::new(&mut storage);

        sink.write(&[1, 2]).unwrap();
        assert!(sink.get_span(0).is_err());

        sink.write(&[]).unwrap();
        assert_eq!(sink.written_span(), &[1_u8, 2]);
    }

    #[test]
    fn empty_write_on_disposed_writer_fails() {
        let mut writer = PooledBufferWriter::<u8>::new();
        writer.dispose();

        assert!(matches!(writer.write(&[]), Err(Error::Disposed { .. })));
    }

    #[test]
    fn write_through_mutable_reference() {
        let mut sink = StingySink {
            region: [0; 4],
            committed: 0,
        };

        fn produce(mut sink: impl BufferWriter<u8>) {
            sink.write_one(7).unwrap();
            sink.get_memory(1).unwrap()[0] = 8;
            sink.advance(1).unwrap();
        }

        produce(&mut sink);

        assert_eq!(sink.committed, 2);
        assert_eq!(sink.region[0], 8);
    }
}
