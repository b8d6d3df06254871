//! Example demonstrating pooled owners, a growable writer, the stream adapters and the
//! string pool working together.

use std::io::Write as _;
use std::sync::Arc;

use pooled_buffers::{AllocationMode, BufferWriter, MemoryOwner, PooledBufferWriter, StringPool};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== pooled_buffers: basic usage ===");

    // Rent a zeroed buffer from the shared pool. It goes back when dropped.
    let mut owner = MemoryOwner::<u8>::allocate(64, AllocationMode::Clear)?;
    owner.span_mut()?[..5].copy_from_slice(b"hello");
    println!("Owner holds {} bytes, starts with {:?}", owner.len()?, &owner.span()?[..5]);

    // Expose the owner as a stream. Disposing the stream gives the array back.
    let mut stream = owner.into_stream()?;
    stream.set_position(5)?;
    stream.write(b", world")?;
    println!("Stream position after write: {}", stream.position()?);
    stream.dispose();

    // Produce data through the sink contract without knowing the backing store.
    let mut writer = PooledBufferWriter::<u8>::new();
    writer.write(b"first chunk; ")?;
    writer.write(b"second chunk")?;
    println!(
        "Writer holds {} bytes in a {} byte buffer",
        writer.written_count()?,
        writer.capacity()?
    );

    // Or through std::io::Write.
    let mut writer_stream = writer.into_stream();
    writeln!(writer_stream, " and a line")?;
    let writer = writer_stream
        .into_inner()
        .ok_or("writer stream was disposed")?;
    println!("Written: {}", String::from_utf8_lossy(writer.written_span()?));

    // Deduplicate repeated text.
    let pool = StringPool::shared();
    let a = pool.get_or_add("content-type");
    let b = pool.get_or_add(&String::from("content-type"));
    println!("Same instance: {}", Arc::ptr_eq(&a, &b));

    Ok(())
}
