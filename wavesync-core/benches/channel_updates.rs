use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use wavesync_core::core_channel::{
    DeferredQueue, QueuedEvent, QueuedTransport, SubmitResponse, WaveletDeltaChannel,
};
use wavesync_core::core_ops::TransformedDelta;
use wavesync_core::test_utils::{client_delta, server_delta, version, TEST_TIMESTAMP};

fn connected(at: u64) -> WaveletDeltaChannel<QueuedTransport> {
    let mut channel = WaveletDeltaChannel::new(QueuedTransport::new());
    channel.reset(None);
    channel
        .on_connection(version(at), version(at), None, None, None)
        .unwrap();
    channel
}

/// `count` single-op deltas chained from `start`
fn chain(start: u64, count: usize) -> Vec<TransformedDelta> {
    (0..count as u64).map(|i| server_delta(start + i, 1)).collect()
}

fn bench_in_order_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_in_order");

    for count in [10usize, 100, 1_000].iter() {
        let deltas = chain(0, *count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("single_update", count), count, |b, _| {
            b.iter(|| {
                let mut channel = connected(0);
                channel
                    .on_wavelet_update(black_box(deltas.clone()), Some(version(0)))
                    .unwrap();
                black_box(channel.stats().deltas_delivered)
            });
        });
        group.bench_with_input(BenchmarkId::new("one_per_update", count), count, |b, _| {
            b.iter(|| {
                let mut channel = connected(0);
                for delta in &deltas {
                    channel
                        .on_wavelet_update(vec![black_box(delta.clone())], None)
                        .unwrap();
                }
                black_box(channel.stats().deltas_delivered)
            });
        });
    }

    group.finish();
}

fn bench_late_ack(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_late_ack");

    // Deltas queue behind an unanswered submission, then the ack releases them.
    for deferred in [1usize, 16, 256].iter() {
        let deltas = chain(1, *deferred);
        group.throughput(Throughput::Elements(*deferred as u64));
        group.bench_with_input(BenchmarkId::new("release", deferred), deferred, |b, _| {
            b.iter(|| {
                let mut channel = connected(0);
                let ticket = channel.send(|| client_delta(0, 1)).unwrap();
                for delta in &deltas {
                    channel.on_wavelet_update(vec![delta.clone()], None).unwrap();
                }
                channel
                    .on_submit_response(ticket, SubmitResponse::ack(1, version(1), TEST_TIMESTAMP))
                    .unwrap();
                black_box(channel.deferred_len())
            });
        });
    }

    group.finish();
}

fn bench_deferred_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("deferred_queue");

    for size in [16usize, 256].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("push_pop", size), size, |b, &n| {
            b.iter(|| {
                let mut queue = DeferredQueue::new(n * 2);
                for i in (0..n as u64).rev() {
                    queue.push(QueuedEvent::Commit(i)).unwrap();
                    queue
                        .push(QueuedEvent::Ack {
                            ops_applied: 1,
                            version: version(i + 1),
                        })
                        .unwrap();
                }
                while let Some(event) = queue.pop_next() {
                    black_box(event);
                }
                while let Some(commit) = queue.pop_commit() {
                    black_box(commit);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_in_order_updates,
    bench_late_ack,
    bench_deferred_queue
);
criterion_main!(benches);
