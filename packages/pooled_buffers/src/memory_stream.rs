use std::any::type_name;
use std::fmt;
use std::future::{Ready, ready};
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::io::{AsyncRead, AsyncSeek, AsyncWrite};

use crate::{Cancellation, Error, Result, StreamMemory};

const TYPE_NAME: &str = "MemoryStream";

type Disposer = Box<dyn FnOnce() + Send>;

/// A sequential read/write/seek stream over a fixed-size region of memory.
///
/// The stream never grows: writes that do not fit between the current position and the end of
/// the region fail with [`Error::InvalidArgument`] and leave the stream unchanged, and
/// [`set_len()`][Self::set_len] is not supported. Whether the stream is writable follows from
/// the [`StreamMemory`] it was created over.
///
/// Disposing the stream drops the memory (for a [`MemoryOwner`][crate::MemoryOwner] this gives
/// the rented array back to its pool) and runs the optional disposer passed to
/// [`with_disposer()`][Self::with_disposer], exactly once. Every operation except disposal
/// fails with [`Error::Disposed`] afterwards.
///
/// The `*_async` methods complete synchronously. They check their cancellation token before
/// doing anything and return [`Error::Cancelled`] without side effects if it is cancelled.
///
/// The stream also implements [`std::io::Read`], [`std::io::Write`] and [`std::io::Seek`], as
/// well as the `futures` async I/O traits.
///
/// # Examples
///
/// ```
/// use std::io::SeekFrom;
///
/// use pooled_buffers::MemoryStream;
///
/// let mut storage = [0_u8; 8];
/// let mut stream = MemoryStream::new(&mut storage[..]);
///
/// stream.write(b"abcd")?;
/// stream.seek(SeekFrom::Start(1))?;
///
/// let mut buffer = [0_u8; 2];
/// assert_eq!(stream.read(&mut buffer)?, 2);
/// assert_eq!(&buffer, b"bc");
///
/// // Only four bytes are left after the current position.
/// assert!(stream.write(b"12345").is_err());
/// # Ok::<(), pooled_buffers::Error>(())
/// ```
pub struct MemoryStream<S>
where
    S: StreamMemory,
{
    /// `None` once disposed.
    memory: Option<S>,

    /// Always within `0..=len`.
    position: usize,

    disposer: Option<Disposer>,
}

impl<S> MemoryStream<S>
where
    S: StreamMemory,
{
    /// Creates a stream positioned at the start of `memory`.
    #[must_use]
    pub fn new(memory: S) -> Self {
        Self {
            memory: Some(memory),
            position: 0,
            disposer: None,
        }
    }

    /// Creates a stream positioned at the start of `memory` that calls `disposer` once when
    /// the stream is disposed or dropped.
    #[must_use]
    pub fn with_disposer(memory: S, disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            memory: Some(memory),
            position: 0,
            disposer: Some(Box::new(disposer)),
        }
    }

    /// Whether the stream can be read from. False once disposed.
    #[must_use]
    #[inline]
    pub fn can_read(&self) -> bool {
        self.memory.is_some()
    }

    /// Whether the stream can seek. False once disposed.
    #[must_use]
    #[inline]
    pub fn can_seek(&self) -> bool {
        self.memory.is_some()
    }

    /// Whether the stream can be written to. False for read-only memory and once disposed.
    #[must_use]
    #[inline]
    pub fn can_write(&self) -> bool {
        self.memory.as_ref().is_some_and(StreamMemory::is_writable)
    }

    /// The length of the underlying region in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the stream has been disposed.
    pub fn len(&self) -> Result<usize> {
        Ok(self.memory()?.bytes().len())
    }

    /// Whether the underlying region is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the stream has been disposed.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|length| length == 0)
    }

    /// The current position in bytes from the start of the region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the stream has been disposed.
    pub fn position(&self) -> Result<usize> {
        self.memory()?;
        Ok(self.position)
    }

    /// Moves to `position` bytes from the start of the region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `position` is past the end of the region, or
    /// [`Error::Disposed`] if the stream has been disposed.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        let length = self.len()?;

        if position > length {
            return Err(Error::out_of_range(
                "position",
                format!("{position} is past the end of the {length} byte stream"),
            ));
        }

        self.position = position;
        Ok(())
    }

    /// Moves the position relative to the start, the current position or the end, returning
    /// the new position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if the target is before the start or past the end of the
    /// region, or [`Error::Disposed`] if the stream has been disposed.
    pub fn seek(&mut self, target: SeekFrom) -> Result<u64> {
        let length = self.len()?;

        let position = match target {
            SeekFrom::Start(offset) => usize::try_from(offset).ok(),
            SeekFrom::Current(offset) => offset_from(self.position, offset),
            SeekFrom::End(offset) => offset_from(length, offset),
        };

        let position = position.filter(|p| *p <= length).ok_or_else(|| {
            Error::out_of_range(
                "offset",
                format!("{target:?} lies outside the {length} byte stream"),
            )
        })?;

        self.position = position;
        Ok(as_u64(position))
    }

    /// Copies as many bytes as fit into `buffer` from the current position, returning the
    /// number of bytes copied. Returns zero at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the stream has been disposed.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let position = self.position;
        let remaining = self
            .memory()?
            .bytes()
            .get(position..)
            .expect("position never passes the end of the stream");

        let count = remaining.len().min(buffer.len());

        if let (Some(target), Some(source)) = (buffer.get_mut(..count), remaining.get(..count)) {
            target.copy_from_slice(source);
        }

        // Cannot overflow, bounded by the region length.
        self.position = position.wrapping_add(count);
        Ok(count)
    }

    /// Reads one byte, or returns `None` at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the stream has been disposed.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0_u8; 1];

        Ok((self.read(&mut byte)? == 1).then_some(byte[0]))
    }

    /// Writes all of `data` at the current position and moves past it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `data` does not fit before the end of the region,
    /// in which case nothing is written. Returns [`Error::NotSupported`] for read-only memory
    /// and [`Error::Disposed`] if the stream has been disposed.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let position = self.position;
        let bytes = self
            .memory
            .as_mut()
            .ok_or(Error::disposed(TYPE_NAME))?
            .bytes_mut()
            .ok_or(Error::NotSupported)?;

        let remaining = bytes
            .get_mut(position..)
            .expect("position never passes the end of the stream");
        let available = remaining.len();

        let Some(target) = remaining.get_mut(..data.len()) else {
            return Err(Error::invalid_argument(
                "data",
                format!(
                    "{} bytes do not fit in the {available} bytes left in the stream",
                    data.len()
                ),
            ));
        };

        target.copy_from_slice(data);

        // Cannot overflow, bounded by the region length.
        self.position = position.wrapping_add(data.len());
        Ok(())
    }

    /// Writes one byte at the current position.
    ///
    /// # Errors
    ///
    /// Same as [`write()`][Self::write].
    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.write(&[value])
    }

    /// Always fails: the stream is a fixed-size view over its memory.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    pub fn set_len(&mut self, _length: usize) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Does nothing beyond the disposal check. Writes go straight to the underlying memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the stream has been disposed.
    pub fn flush(&mut self) -> Result<()> {
        self.memory().map(|_| ())
    }

    /// Copies everything from the current position to the end of the stream into
    /// `destination`, returning the number of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream has been disposed or if `destination` fails.
    pub fn copy_to(&mut self, destination: &mut impl io::Write) -> io::Result<u64> {
        let position = self.position;
        let remaining = self
            .memory()?
            .bytes()
            .get(position..)
            .expect("position never passes the end of the stream");

        destination.write_all(remaining)?;

        let count = remaining.len();
        // Cannot overflow, bounded by the region length.
        self.position = position.wrapping_add(count);
        Ok(as_u64(count))
    }

    /// [`read()`][Self::read] in async form. Completes immediately.
    ///
    /// If `cancellation` is already cancelled, returns [`Error::Cancelled`] without reading.
    pub fn read_async(
        &mut self,
        buffer: &mut [u8],
        cancellation: &Cancellation,
    ) -> Ready<Result<usize>> {
        if cancellation.is_cancelled() {
            return ready(Err(Error::Cancelled));
        }

        ready(self.read(buffer))
    }

    /// [`write()`][Self::write] in async form. Completes immediately.
    ///
    /// If `cancellation` is already cancelled, returns [`Error::Cancelled`] without writing.
    pub fn write_async(
        &mut self,
        data: &[u8],
        cancellation: &Cancellation,
    ) -> Ready<Result<()>> {
        if cancellation.is_cancelled() {
            return ready(Err(Error::Cancelled));
        }

        ready(self.write(data))
    }

    /// [`flush()`][Self::flush] in async form. Completes immediately.
    ///
    /// If `cancellation` is already cancelled, returns [`Error::Cancelled`].
    pub fn flush_async(&mut self, cancellation: &Cancellation) -> Ready<Result<()>> {
        if cancellation.is_cancelled() {
            return ready(Err(Error::Cancelled));
        }

        ready(self.flush())
    }

    /// Whether the stream has been disposed.
    #[must_use]
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.memory.is_none()
    }

    /// Drops the memory and runs the disposer, if any. Subsequent calls do nothing.
    pub fn dispose(&mut self) {
        if self.memory.take().is_none() {
            return;
        }

        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }

    fn memory(&self) -> Result<&S> {
        self.memory.as_ref().ok_or(Error::disposed(TYPE_NAME))
    }
}

fn offset_from(base: usize, offset: i64) -> Option<usize> {
    base.checked_add_signed(isize::try_from(offset).ok()?)
}

fn as_u64(value: usize) -> u64 {
    u64::try_from(value).expect("stream positions fit in u64 on all supported targets")
}

impl<S> Drop for MemoryStream<S>
where
    S: StreamMemory,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<S> fmt::Debug for MemoryStream<S>
where
    S: StreamMemory,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("length", &self.memory.as_ref().map(|m| m.bytes().len()))
            .field("position", &self.position)
            .field("writable", &self.can_write())
            .field("has_disposer", &self.disposer.is_some())
            .finish()
    }
}

impl<S> io::Read for MemoryStream<S>
where
    S: StreamMemory,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(Self::read(self, buf)?)
    }
}

impl<S> io::Write for MemoryStream<S>
where
    S: StreamMemory,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Self::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(Self::flush(self)?)
    }
}

impl<S> io::Seek for MemoryStream<S>
where
    S: StreamMemory,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(Self::seek(self, pos)?)
    }
}

impl<S> AsyncRead for MemoryStream<S>
where
    S: StreamMemory + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(io::Read::read(self.get_mut(), buf))
    }
}

impl<S> AsyncWrite for MemoryStream<S>
where
    S: StreamMemory + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(io::Write::write(self.get_mut(), buf))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(io::Write::flush(self.get_mut()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().dispose();
        Poll::Ready(Ok(()))
    }
}

impl<S> AsyncSeek for MemoryStream<S>
where
    S: StreamMemory + Unpin,
{
    fn poll_seek(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        pos: SeekFrom,
    ) -> Poll<io::Result<u64>> {
        Poll::Ready(io::Seek::seek(self.get_mut(), pos))
    }
}
