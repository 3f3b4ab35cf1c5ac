//! Randomized-schedule tests under shuttle.
//!
//! Run with `RUSTFLAGS="--cfg shuttle" cargo test -p guardcell --release`.

use std::sync::Arc;

use shuttle::thread;

use super::GuardedCell;

const ITERATIONS: usize = 1000;

#[test]
fn readers_never_see_torn_writes() {
    shuttle::check_random(
        || {
            let cell = Arc::new(GuardedCell::new((0u32, 0u32)));

            let writers: Vec<_> = (0..2)
                .map(|_| {
                    let cell = cell.clone();
                    thread::spawn(move || {
                        for _ in 0..3 {
                            let mut guard = cell.lock();
                            guard.0 += 1;
                            thread::yield_now();
                            guard.1 += 1;
                        }
                    })
                })
                .collect();

            let reader = {
                let cell = cell.clone();
                thread::spawn(move || {
                    for _ in 0..3 {
                        let guard = cell.peek();
                        assert_eq!(guard.0, guard.1);
                    }
                })
            };

            for writer in writers {
                writer.join().unwrap();
            }
            reader.join().unwrap();

            assert_eq!(*cell.peek(), (6, 6));
        },
        ITERATIONS,
    );
}

#[test]
fn transfer_is_atomic_to_readers() {
    shuttle::check_random(
        || {
            let dest = Arc::new(GuardedCell::new(vec![0u8; 4]));
            let src = Arc::new(GuardedCell::new(vec![1u8; 4]));

            let mover = {
                let dest = dest.clone();
                let src = src.clone();
                thread::spawn(move || dest.transfer_from(&src))
            };

            let observer = {
                let dest = dest.clone();
                thread::spawn(move || {
                    let guard = dest.peek();
                    assert!(*guard == vec![0; 4] || *guard == vec![1; 4]);
                })
            };

            mover.join().unwrap();
            observer.join().unwrap();

            assert_eq!(*dest.peek(), vec![1; 4]);
            assert!(src.peek().is_empty());
        },
        ITERATIONS,
    );
}

#[test]
fn opposite_transfers_do_not_deadlock() {
    shuttle::check_random(
        || {
            let a = Arc::new(GuardedCell::new(1u32));
            let b = Arc::new(GuardedCell::new(2u32));

            let forward = {
                let (a, b) = (a.clone(), b.clone());
                thread::spawn(move || a.swap(&b))
            };
            let backward = {
                let (a, b) = (a.clone(), b.clone());
                thread::spawn(move || b.swap(&a))
            };

            forward.join().unwrap();
            backward.join().unwrap();

            assert_eq!((*a.peek(), *b.peek()), (1, 2));
        },
        ITERATIONS,
    );
}
