use std::any::type_name;
use std::fmt;
use std::future::{Ready, ready};
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::io::AsyncWrite;

use crate::{BufferWriter, Cancellation, Error, Result};

const TYPE_NAME: &str = "BufferWriterStream";

/// A write-only stream that forwards every write to a [`BufferWriter<u8>`].
///
/// Each write asks the sink for a region of exactly the written length, copies the data in and
/// advances the sink. Reading, seeking and length queries are not supported.
///
/// Disposing the stream makes it inert but does not dispose the sink. Call
/// [`into_inner()`][Self::into_inner] to get the sink back.
///
/// # Examples
///
/// ```
/// use pooled_buffers::PooledBufferWriter;
///
/// let mut stream = PooledBufferWriter::<u8>::new().into_stream();
/// stream.write(b"hello ")?;
/// stream.write(b"world")?;
///
/// let writer = stream.into_inner().expect("stream was not disposed");
/// assert_eq!(writer.written_span()?, b"hello world");
/// # Ok::<(), pooled_buffers::Error>(())
/// ```
pub struct BufferWriterStream<W>
where
    W: BufferWriter<u8>,
{
    /// `None` once disposed.
    sink: Option<W>,
}

impl<W> BufferWriterStream<W>
where
    W: BufferWriter<u8>,
{
    /// Creates a stream that writes into `sink`.
    #[must_use]
    pub fn new(sink: W) -> Self {
        Self { sink: Some(sink) }
    }

    /// Always false.
    #[must_use]
    #[inline]
    pub fn can_read(&self) -> bool {
        false
    }

    /// Always false.
    #[must_use]
    #[inline]
    pub fn can_seek(&self) -> bool {
        false
    }

    /// True until the stream is disposed.
    #[must_use]
    #[inline]
    pub fn can_write(&self) -> bool {
        self.sink.is_some()
    }

    /// Appends all of `data` to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the sink returns a region shorter than `data`,
    /// [`Error::Disposed`] if the stream has been disposed and otherwise whatever the sink
    /// returns.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.sink_mut()?.write(data)
    }

    /// Appends one byte to the sink.
    ///
    /// # Errors
    ///
    /// Same as [`write()`][Self::write].
    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.sink_mut()?.write_one(value)
    }

    /// Does nothing beyond checking that the stream is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the stream has been disposed.
    pub fn flush(&mut self) -> Result<()> {
        self.sink_mut().map(|_| ())
    }

    /// Always fails.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    pub fn read(&mut self, _buffer: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupported)
    }

    /// Always fails.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    pub fn seek(&mut self, _target: SeekFrom) -> Result<u64> {
        Err(Error::NotSupported)
    }

    /// Always fails.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    pub fn len(&self) -> Result<usize> {
        Err(Error::NotSupported)
    }

    /// Always fails.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    pub fn is_empty(&self) -> Result<bool> {
        Err(Error::NotSupported)
    }

    /// Always fails.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    pub fn position(&self) -> Result<usize> {
        Err(Error::NotSupported)
    }

    /// Always fails.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    pub fn set_position(&mut self, _position: usize) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Always fails.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`].
    pub fn set_len(&mut self, _length: usize) -> Result<()> {
        Err(Error::NotSupported)
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

    /// Always fails, unless `cancellation` is already cancelled.
    pub fn read_async(
        &mut self,
        _buffer: &mut [u8],
        cancellation: &Cancellation,
    ) -> Ready<Result<usize>> {
        if cancellation.is_cancelled() {
            return ready(Err(Error::Cancelled));
        }

        ready(Err(Error::NotSupported))
    }

    /// Whether the stream has been disposed.
    #[must_use]
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.sink.is_none()
    }

    /// Makes the stream inert. The sink is dropped, not disposed.
    pub fn dispose(&mut self) {
        self.sink = None;
    }

    /// Returns the sink, or `None` if the stream has been disposed.
    #[must_use]
    pub fn into_inner(mut self) -> Option<W> {
        self.sink.take()
    }

    fn sink_mut(&mut self) -> Result<&mut W> {
        self.sink.as_mut().ok_or(Error::disposed(TYPE_NAME))
    }
}

impl<W> fmt::Debug for BufferWriterStream<W>
where
    W: BufferWriter<u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("disposed", &self.sink.is_none())
            .finish()
    }
}

impl<W> io::Write for BufferWriterStream<W>
where
    W: BufferWriter<u8>,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Self::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(Self::flush(self)?)
    }
}

impl<W> AsyncWrite for BufferWriterStream<W>
where
    W: BufferWriter<u8> + Unpin,
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
