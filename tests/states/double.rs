#[cfg(feature = "shuttle")]
mod model {
    use std::sync::Arc;

    use shuttle::thread;
    use stateswap::state::{DoubleState, Snapshot};

    use crate::common::{assert_monotonic, Wide, NUM_ITERATIONS, NUM_PREEMPTIONS};

    const PUBLISHES: u64 = 3;

    #[test]
    fn promoted_payloads_are_untorn_and_ordered() {
        shuttle::check_pct(
            || {
                let state = Arc::new(DoubleState::new(Wide::filled(0)));

                let writer = {
                    let state = Arc::clone(&state);
                    thread::spawn(move || {
                        for generation in 1..=PUBLISHES {
                            state.write(|payload| *payload = Wide::filled(generation));
                        }
                    })
                };

                let promoter = {
                    let state = Arc::clone(&state);
                    thread::spawn(move || {
                        let mut last_seen = 0;
                        let mut switches = 0u16;
                        for _ in 0..4 {
                            let (payload, switched) = state.try_switch_checked();
                            assert_monotonic(&mut last_seen, payload);
                            if switched {
                                switches += 1;
                            }
                        }
                        switches
                    })
                };

                let observer = {
                    let state = Arc::clone(&state);
                    thread::spawn(move || {
                        let mut last_seen = 0;
                        for _ in 0..2 {
                            assert_monotonic(&mut last_seen, state.snapshot());
                        }
                    })
                };

                writer.join().unwrap();
                let mut switches = promoter.join().unwrap();
                observer.join().unwrap();

                // Drain whatever the promoter did not consume. Every
                // successful switch advances the index by exactly one.
                let (payload, switched) = state.try_switch_checked();
                if switched {
                    switches += 1;
                }
                assert!(payload.generation() <= PUBLISHES);
                assert_eq!(state.current_index(), switches);
            },
            NUM_ITERATIONS,
            NUM_PREEMPTIONS,
        );
    }

    #[test]
    fn observer_snapshots_stay_consistent_across_promotions() {
        shuttle::check_random(
            || {
                let state = Arc::new(DoubleState::new(Wide::filled(0)));

                let worker = {
                    let state = Arc::clone(&state);
                    thread::spawn(move || {
                        for generation in 1..=PUBLISHES {
                            state.write(|payload| *payload = Wide::filled(generation));
                            state.try_switch();
                        }
                    })
                };

                let mut last_seen = 0;
                for _ in 0..3 {
                    assert_monotonic(&mut last_seen, state.snapshot());
                }

                worker.join().unwrap();
                assert_eq!(state.read().generation(), PUBLISHES);
            },
            NUM_ITERATIONS,
        );
    }
}

#[cfg(not(feature = "shuttle"))]
mod stress {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use stateswap::state::{DoubleState, Snapshot};

    use crate::common::{assert_monotonic, Wide, NUM_PUBLISHES};

    #[test]
    fn cold_snapshots_never_observe_a_torn_payload() {
        let state = Arc::new(DoubleState::new(Wide::filled(0)));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let state = Arc::clone(&state);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for generation in 1..=NUM_PUBLISHES as u64 {
                    state.write(|payload| *payload = Wide::filled(generation));
                }
                done.store(true, Ordering::Release);
            })
        };

        let promoter = {
            let state = Arc::clone(&state);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last_seen = 0;
                while !done.load(Ordering::Acquire) {
                    assert_monotonic(&mut last_seen, state.try_switch());
                }
            })
        };

        let observers: Vec<_> = (0..2)
            .map(|_| {
                let state = Arc::clone(&state);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut last_seen = 0;
                    while !done.load(Ordering::Acquire) {
                        assert_monotonic(&mut last_seen, state.snapshot());
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        promoter.join().unwrap();
        for observer in observers {
            observer.join().unwrap();
        }

        // The final publish is still pending if the promoter exited first.
        let payload = state.try_switch();
        assert_eq!(payload.generation(), NUM_PUBLISHES as u64);
    }
}
