//! Throughput benchmarks for queues and refcounted objects.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sluice::buffer::Buffer;
use sluice::message::{ControlMessage, Segment};
use sluice::metadata::Metadata;
use sluice::queue::{BoundedQueue, ConnectionPoint, LeakyMode, QueueSettings};
use std::hint::black_box;

fn bench_buffer_ref_unref(c: &mut Criterion) {
    let buffer = Buffer::with_size(1024, Metadata::new());
    c.bench_function("buffer_ref_unref", |b| {
        b.iter(|| black_box(buffer.clone()));
    });
}

fn bench_make_writable(c: &mut Criterion) {
    let mut group = c.benchmark_group("make_writable");

    for size in [64, 1024, 64 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("shared", size), size, |b, &size| {
            let buffer = Buffer::with_size(size, Metadata::new());
            b.iter(|| black_box(buffer.clone().make_writable()));
        });
    }

    group.finish();
}

fn bench_single_thread_push_pop(c: &mut Criterion) {
    let queue = BoundedQueue::new(1024);
    let buffer = Buffer::with_size(188, Metadata::new());

    let mut group = c.benchmark_group("push_pop");
    group.throughput(Throughput::Elements(1));
    group.bench_function("single_thread", |b| {
        b.iter(|| {
            queue.push(buffer.clone()).unwrap();
            black_box(queue.pop().unwrap());
        });
    });
    group.finish();
}

fn bench_queue_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_throughput");

    for buffer_count in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*buffer_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(buffer_count),
            buffer_count,
            |b, &buffer_count| {
                b.iter(|| {
                    let queue = BoundedQueue::new(64);

                    std::thread::scope(|s| {
                        let producer = s.spawn(|| {
                            for i in 0..buffer_count {
                                let buffer =
                                    Buffer::with_size(64, Metadata::with_sequence(i as u64));
                                queue.push(buffer).unwrap();
                            }
                            queue.push(ControlMessage::new_eos()).unwrap();
                        });

                        let consumer = s.spawn(|| {
                            let mut count = 0;
                            while !queue.pop().unwrap().is_eos() {
                                count += 1;
                            }
                            count
                        });

                        producer.join().unwrap();
                        black_box(consumer.join().unwrap());
                    });
                });
            },
        );
    }

    group.finish();
}

fn bench_leaky_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaky_push");
    group.throughput(Throughput::Elements(1));

    for (name, mode) in [
        ("upstream", LeakyMode::Upstream),
        ("downstream", LeakyMode::Downstream),
    ] {
        let queue = BoundedQueue::with_settings(QueueSettings::default().max_buffers(16).leaky(mode));
        let buffer = Buffer::with_size(188, Metadata::new());
        group.bench_function(name, |b| {
            b.iter(|| queue.push(buffer.clone()).unwrap());
        });
    }

    group.finish();
}

fn bench_connection_sticky(c: &mut Criterion) {
    let point = ConnectionPoint::new(QueueSettings::default());
    c.bench_function("connection_sticky_send", |b| {
        b.iter(|| {
            point
                .send(ControlMessage::new_segment(Segment::default()).unwrap())
                .unwrap();
            black_box(point.pop().unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_buffer_ref_unref,
    bench_make_writable,
    bench_single_thread_push_pop,
    bench_queue_throughput,
    bench_leaky_push,
    bench_connection_sticky,
);

criterion_main!(benches);
