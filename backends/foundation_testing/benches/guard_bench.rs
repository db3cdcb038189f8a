use criterion::{black_box, criterion_group, criterion_main, Criterion};
use foundation_sync::{CancelToken, ReadWriteGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Benchmark uncontended read and write sections.
fn bench_guard_uncontended(c: &mut Criterion) {
    let guard = ReadWriteGuard::new(0_u64);
    let cancel = CancelToken::new();

    c.bench_function("guard_read_value_uncontended", |b| {
        b.iter(|| black_box(guard.read_value(&cancel).unwrap()));
    });

    c.bench_function("guard_write_value_uncontended", |b| {
        b.iter(|| guard.write_value(black_box(7), &cancel).unwrap());
    });

    c.bench_function("guard_try_read_uncontended", |b| {
        b.iter(|| black_box(*guard.try_read().unwrap()));
    });
}

/// Benchmark reads while background readers keep the guard shared.
fn bench_guard_reads_under_readers(c: &mut Criterion) {
    let guard = ReadWriteGuard::new(vec![0_u8; 64]);
    let cancel = CancelToken::new();
    let stop = Arc::new(AtomicBool::new(false));

    let background: Vec<_> = (0..4)
        .map(|_| {
            let guard = guard.clone();
            let cancel = cancel.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let _ = guard.read_with(|bytes| black_box(bytes.len()), &cancel);
                }
            })
        })
        .collect();

    c.bench_function("guard_read_with_4_background_readers", |b| {
        b.iter(|| black_box(guard.read_with(|bytes| bytes[0], &cancel).unwrap()));
    });

    stop.store(true, Ordering::Relaxed);
    for handle in background {
        handle.join().unwrap();
    }
}

/// Benchmark writes competing with background readers; writer preference
/// keeps this bounded.
fn bench_guard_writes_under_readers(c: &mut Criterion) {
    let guard = ReadWriteGuard::new(0_u64);
    let cancel = CancelToken::new();

    let background: Vec<_> = (0..4)
        .map(|_| {
            let guard = guard.clone();
            let cancel = cancel.clone();
            thread::spawn(move || while guard.read_value(&cancel).is_ok() {})
        })
        .collect();

    c.bench_function("guard_update_with_4_background_readers", |b| {
        b.iter(|| guard.update(|value| *value += 1, &cancel).unwrap());
    });

    cancel.cancel();
    for handle in background {
        handle.join().unwrap();
    }
}

criterion_group!(
    benches,
    bench_guard_uncontended,
    bench_guard_reads_under_readers,
    bench_guard_writes_under_readers
);
criterion_main!(benches);
