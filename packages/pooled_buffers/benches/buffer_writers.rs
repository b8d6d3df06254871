//! Benchmarks for pooled owners, buffer writers and the memory stream.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::time::Instant;

use alloc_tracker::Allocator;
use criterion::{Criterion, criterion_group, criterion_main};
use pooled_buffers::{
    AllocationMode, BufferWriter, FixedBufferWriter, MemoryOwner, MemoryStream,
    PooledBufferWriter, SpanOwner,
};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

const CHUNK: [u8; 100] = [0xA5; 100];

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("buffer_writers");

    let allocs_op = allocs.operation("memory_owner_4k");
    group.bench_function("memory_owner_4k", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let owner = MemoryOwner::<u8>::allocate(4096, AllocationMode::Clear).unwrap();
                drop(black_box(owner));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("span_owner_4k");
    group.bench_function("span_owner_4k", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut owner = SpanOwner::<u8>::allocate(4096, AllocationMode::Uninitialized)
                    .unwrap();
                owner[0] = 1;
                drop(black_box(owner));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("pooled_writer_grow_64k");
    group.bench_function("pooled_writer_grow_64k", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut writer = PooledBufferWriter::<u8>::new();

                for _ in 0..655 {
                    writer.write(&CHUNK).unwrap();
                }

                drop(black_box(writer));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("fixed_writer_4k");
    group.bench_function("fixed_writer_4k", |b| {
        b.iter_custom(|iters| {
            let mut storage = vec![0_u8; 4000];

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut writer = FixedBufferWriter::new(&mut storage);

                for _ in 0..40 {
                    writer.write(&CHUNK).unwrap();
                }

                black_box(writer.written_count());
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("memory_stream_round_trip_4k");
    group.bench_function("memory_stream_round_trip_4k", |b| {
        b.iter_custom(|iters| {
            let mut storage = vec![0_u8; 4000];
            let mut read_back = [0_u8; 100];

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut stream = MemoryStream::new(&mut storage[..]);

                for _ in 0..40 {
                    stream.write(&CHUNK).unwrap();
                }

                stream.set_position(0).unwrap();

                while stream.read(&mut read_back).unwrap() != 0 {
                    black_box(&read_back);
                }
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
