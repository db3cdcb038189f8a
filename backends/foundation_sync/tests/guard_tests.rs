use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use foundation_sync::{CancelToken, ReadWriteGuard, SyncError};

fn wait_for(mut condition: impl FnMut() -> bool) {
    while !condition() {
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
#[ntest::timeout(5000)]
fn written_value_is_read_back_by_concurrent_readers() {
    let guard = ReadWriteGuard::new(0);
    let cancel = CancelToken::new();

    guard.write_value(5, &cancel).expect("guard is free");
    assert_eq!(guard.read_value(&cancel), Ok(5));

    // both readers hold their section across the barrier, so neither can
    // finish unless they share the guard
    let barrier = Arc::new(Barrier::new(2));
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let guard = guard.clone();
            let cancel = cancel.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let section = guard.read(&cancel).expect("no writer around");
                barrier.wait();
                *section
            })
        })
        .collect();

    for reader in readers {
        assert_eq!(reader.join().expect("reader finished"), 5);
    }
}

#[test]
#[ntest::timeout(5000)]
fn writer_waits_for_active_readers() {
    let guard = ReadWriteGuard::new(String::from("before"));
    let cancel = CancelToken::new();
    let section = guard.read(&cancel).expect("guard is free");

    let (done_tx, done_rx) = mpsc::channel();
    let writer = {
        let guard = guard.clone();
        let cancel = cancel.clone();
        thread::spawn(move || {
            guard
                .write_value(String::from("after"), &cancel)
                .expect("never cancelled");
            done_tx.send(()).expect("receiver alive");
        })
    };

    wait_for(|| guard.state().writers_waiting == 1);
    thread::sleep(Duration::from_millis(20));
    assert!(done_rx.try_recv().is_err());
    assert_eq!(*section, "before");

    drop(section);
    done_rx.recv().expect("writer completes");
    writer.join().expect("writer finished");
    assert_eq!(guard.read_value(&cancel).as_deref(), Ok("after"));
}

#[test]
#[ntest::timeout(5000)]
fn cancel_releases_blocked_reader_and_writer() {
    let guard = ReadWriteGuard::new(1_u64);
    let cancel = CancelToken::new();
    let holder = CancelToken::new();

    let section = guard.write(&holder).expect("guard is free");

    let reader = {
        let guard = guard.clone();
        let cancel = cancel.clone();
        thread::spawn(move || guard.read_value(&cancel))
    };
    let writer = {
        let guard = guard.clone();
        let cancel = cancel.clone();
        thread::spawn(move || {
            guard
                .write_value(2, &cancel)
                .map_err(|rejected| (rejected.error(), rejected.into_inner()))
        })
    };

    wait_for(|| cancel.waiting() == 2);
    cancel.cancel();

    assert_eq!(
        reader.join().expect("reader finished"),
        Err(SyncError::Cancelled)
    );
    assert_eq!(
        writer.join().expect("writer finished"),
        Err((SyncError::Cancelled, 2))
    );

    drop(section);
    assert_eq!(guard.read_value(&holder), Ok(1));
    assert_eq!(guard.state().writers_waiting, 0);
}

#[test]
#[ntest::timeout(20000)]
fn readers_never_observe_torn_values() {
    let guard = ReadWriteGuard::new((0_u64, 0_u64));
    let cancel = CancelToken::new();

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let guard = guard.clone();
            let cancel = cancel.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    guard
                        .update(
                            |pair| {
                                pair.0 += 1;
                                thread::yield_now();
                                pair.1 += 1;
                            },
                            &cancel,
                        )
                        .expect("never cancelled");
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let guard = guard.clone();
            let cancel = cancel.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let (a, b) = guard.read_value(&cancel).expect("never cancelled");
                    assert_eq!(a, b);
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().expect("worker finished");
    }
    assert_eq!(guard.read_value(&cancel), Ok((2_000, 2_000)));
}
