#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Pooled array ownership, buffer writers, string interning and stream adapters over
//! contiguous memory.
//!
//! Short-lived buffers are rented from an [`ArrayPool`] and given back when their owner is
//! dropped or disposed, so hot paths that repeatedly need scratch memory stop allocating once
//! the pool has warmed up.
//!
//! # Owners
//!
//! - [`MemoryOwner<T>`] owns a rented array and exposes exactly the requested number of
//!   elements. It can be moved between threads, narrowed with
//!   [`slice()`](MemoryOwner::slice) and projected as a [`MemoryStream`].
//! - [`SpanOwner<T>`] is the scope-bound variant: it cannot leave the thread that created it
//!   and dereferences straight to the slice.
//!
//! # Writers
//!
//! The [`BufferWriter<T>`] trait is the sink contract: ask for a writable region with
//! [`get_span()`](BufferWriter::get_span), fill a prefix of it, then
//! [`advance()`](BufferWriter::advance) by the number of elements written.
//!
//! - [`PooledBufferWriter<T>`] grows by renting larger arrays from its pool.
//! - [`FixedBufferWriter<T>`] fills a caller-supplied region and never grows.
//!
//! # Streams
//!
//! - [`MemoryStream`] reads, writes and seeks within a fixed region of bytes described by
//!   [`StreamMemory`], optionally running a disposer when it is disposed.
//! - [`BufferWriterStream`] is a write-only stream over any [`BufferWriter<u8>`].
//!
//! Both implement the `std::io` and `futures::io` traits. Their `*_async` methods complete
//! synchronously and honor a pre-cancelled [`Cancellation`].
//!
//! # String interning
//!
//! [`StringPool`] deduplicates strings by content, returning the same [`Arc<str>`][std::sync::Arc]
//! for equal content from text or from encoded bytes.
//!
//! # Examples
//!
//! ```
//! use pooled_buffers::{AllocationMode, BufferWriter, MemoryOwner, PooledBufferWriter};
//!
//! let mut owner = MemoryOwner::<u8>::allocate(16, AllocationMode::Clear)?;
//! owner.span_mut()?.fill(7);
//! assert_eq!(owner.len()?, 16);
//!
//! let mut writer = PooledBufferWriter::<u8>::new();
//! writer.write(owner.span()?)?;
//! writer.write(b"tail")?;
//! assert_eq!(writer.written_count()?, 20);
//!
//! // Both give their arrays back to the shared pool here.
//! # Ok::<(), pooled_buffers::Error>(())
//! ```
//!
//! # Observability
//!
//! Lifecycle points are logged through `tracing` and pool activity is counted through `nm`
//! events. The crate installs no subscriber or metrics publisher of its own.

mod allocation_mode;
mod array_pool;
mod buffer_writer;
mod buffer_writer_stream;
mod builder;
mod cancellation;
mod constants;
mod decoded_chars;
mod error;
mod fixed_buffer_writer;
mod memory_owner;
mod memory_stream;
mod metrics;
mod pooled_buffer_writer;
mod shared_array_pool;
mod span_owner;
mod stream_memory;
mod string_pool;
mod string_pool_builder;

#[cfg(test)]
mod testing;

pub use allocation_mode::*;
pub use array_pool::*;
pub use buffer_writer::*;
pub use buffer_writer_stream::*;
pub use builder::*;
pub use cancellation::*;
pub use decoded_chars::TextEncoding;
pub use error::*;
pub use fixed_buffer_writer::*;
pub use memory_owner::*;
pub use memory_stream::*;
pub use pooled_buffer_writer::*;
pub use shared_array_pool::*;
pub use span_owner::*;
pub use stream_memory::*;
pub use string_pool::*;
pub use string_pool_builder::*;
