// tests/dispatch_queue.rs

mod common;
use crate::common::init_tracing;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;

use modhost::engine::{DispatchQueue, EngineRuntime, RuntimeOptions};
use modhost::errors::ModhostError;

/// Context for these tests: every executed task appends `(producer, seq)`.
#[derive(Default)]
struct Trace {
    executed: Vec<(usize, usize)>,
}

fn fast_options() -> RuntimeOptions {
    RuntimeOptions {
        name: "test-engine".to_string(),
        idle_interval: Duration::from_millis(1),
    }
}

/// Each producer's tasks must appear in its own submission order.
fn assert_per_producer_fifo(executed: &[(usize, usize)], producers: usize, per_producer: usize) {
    assert_eq!(executed.len(), producers * per_producer);
    for producer in 0..producers {
        let seqs: Vec<usize> = executed
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(seqs, (0..per_producer).collect::<Vec<_>>(), "producer {producer}");
    }
}

#[test]
fn multi_producer_tasks_run_serially_in_submission_order() {
    init_tracing();

    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 100;

    let runtime = EngineRuntime::spawn(Trace::default(), fast_options()).unwrap();
    let in_task = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = runtime.queue();
            let in_task = Arc::clone(&in_task);
            let overlaps = Arc::clone(&overlaps);
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let in_task = Arc::clone(&in_task);
                    let overlaps = Arc::clone(&overlaps);
                    queue
                        .dispatch(move |trace: &mut Trace| {
                            if in_task.swap(true, Ordering::SeqCst) {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            trace.executed.push((producer, seq));
                            in_task.store(false, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in producers {
        handle.join().unwrap();
    }

    let trace = runtime.shutdown().unwrap();
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_per_producer_fifo(&trace.executed, PRODUCERS, PER_PRODUCER);
}

#[test]
fn failing_and_panicking_tasks_do_not_stop_the_consumer() {
    init_tracing();

    let runtime = EngineRuntime::spawn(Trace::default(), fast_options()).unwrap();

    runtime
        .dispatch(|trace: &mut Trace| {
            trace.executed.push((0, 0));
            Ok(())
        })
        .unwrap();
    runtime
        .dispatch(|_: &mut Trace| Err(anyhow::anyhow!("boom")))
        .unwrap();
    runtime
        .dispatch(|_: &mut Trace| -> anyhow::Result<()> { panic!("task panicked") })
        .unwrap();
    runtime
        .dispatch(|trace: &mut Trace| {
            trace.executed.push((0, 1));
            Ok(())
        })
        .unwrap();

    let trace = runtime.shutdown().unwrap();
    assert_eq!(trace.executed, vec![(0, 0), (0, 1)]);
}

#[test]
fn tasks_dispatched_by_tasks_run_later() {
    init_tracing();

    let runtime = EngineRuntime::spawn(Trace::default(), fast_options()).unwrap();
    let queue = runtime.queue();

    runtime
        .dispatch(move |trace: &mut Trace| {
            trace.executed.push((0, 0));
            queue.dispatch(|trace: &mut Trace| {
                trace.executed.push((0, 2));
                Ok(())
            })?;
            trace.executed.push((0, 1));
            Ok(())
        })
        .unwrap();

    let gate = runtime.gate();
    runtime
        .dispatch(move |_: &mut Trace| {
            gate.signal_ready();
            Ok(())
        })
        .unwrap();
    runtime.wait_until_ready();

    let trace = runtime.shutdown().unwrap();
    assert_eq!(trace.executed, vec![(0, 0), (0, 1), (0, 2)]);
}

#[test]
fn shutdown_drains_pending_tasks_then_rejects_dispatch() {
    init_tracing();

    let runtime = EngineRuntime::spawn(
        Trace::default(),
        RuntimeOptions {
            name: "slow-engine".to_string(),
            idle_interval: Duration::from_millis(50),
        },
    )
    .unwrap();
    let queue = runtime.queue();

    for seq in 0..10 {
        queue
            .dispatch(move |trace: &mut Trace| {
                trace.executed.push((0, seq));
                Ok(())
            })
            .unwrap();
    }

    let trace = runtime.shutdown().unwrap();
    assert_eq!(trace.executed.len(), 10);

    let err = queue.dispatch(|_: &mut Trace| Ok(())).unwrap_err();
    assert!(matches!(err, ModhostError::QueueClosed(name) if name == "slow-engine"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn drain_preserves_per_producer_order(
        counts in proptest::collection::vec(1usize..40, 1..6)
    ) {
        let queue: DispatchQueue<Trace> = DispatchQueue::new("prop");

        let producers: Vec<_> = counts
            .iter()
            .copied()
            .enumerate()
            .map(|(producer, count)| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for seq in 0..count {
                        queue
                            .dispatch(move |trace: &mut Trace| {
                                trace.executed.push((producer, seq));
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        let mut trace = Trace::default();
        let stats = queue.drain_queued(&mut trace);
        prop_assert_eq!(stats.executed, counts.iter().sum::<usize>());
        prop_assert!(queue.is_empty());

        for (producer, count) in counts.iter().enumerate() {
            let seqs: Vec<usize> = trace
                .executed
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, s)| *s)
                .collect();
            prop_assert_eq!(seqs, (0..*count).collect::<Vec<_>>());
        }
    }
}
