// crates/engine-dispatch/tests/dispatcher.rs
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use engine_dispatch::{AffinityDispatcher, DispatchError, DEFAULT_THREAD_NAME};

#[test]
fn invoke_runs_on_the_affinity_thread() {
    let dispatcher = AffinityDispatcher::new().unwrap();
    let caller = thread::current().id();

    let (ran_on, name) = dispatcher
        .invoke(|| {
            let t = thread::current();
            (t.id(), t.name().map(str::to_string))
        })
        .unwrap();

    assert_ne!(ran_on, caller);
    assert_eq!(ran_on, dispatcher.thread_id());
    assert_eq!(name.as_deref(), Some(DEFAULT_THREAD_NAME));
    assert!(!dispatcher.is_affinity_thread());
}

#[test]
fn jobs_from_many_threads_run_in_enqueue_order() {
    const THREADS: usize = 8;
    const JOBS: usize = 50;

    let dispatcher = Arc::new(AffinityDispatcher::new().unwrap());
    // Stamped under this lock together with the enqueue, so stamp order
    // is exactly enqueue order.
    let stamp = Arc::new(Mutex::new(0u64));
    let observed = Arc::new(Mutex::new(Vec::new()));

    let mut workers = Vec::new();
    for _ in 0..THREADS {
        let dispatcher = dispatcher.clone();
        let stamp = stamp.clone();
        let observed = observed.clone();

        workers.push(thread::spawn(move || {
            let mut pending = Vec::new();
            for _ in 0..JOBS {
                let mut counter = stamp.lock().unwrap();
                let my_stamp = *counter;
                *counter += 1;

                let observed = observed.clone();
                let p = dispatcher
                    .submit(move || observed.lock().unwrap().push(my_stamp))
                    .unwrap();
                assert_eq!(p.seq(), my_stamp);
                drop(counter);

                pending.push(p);
            }
            for p in pending {
                p.wait().unwrap();
            }
        }));
    }

    for w in workers {
        w.join().unwrap();
    }

    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), THREADS * JOBS);
    let expected: Vec<u64> = (0..(THREADS * JOBS) as u64).collect();
    assert_eq!(*observed, expected);
}

#[test]
fn blocking_invokes_from_many_threads_never_overlap() {
    let dispatcher = Arc::new(AffinityDispatcher::new().unwrap());
    let in_flight = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let mut workers = Vec::new();
    for i in 0..6 {
        let dispatcher = dispatcher.clone();
        let in_flight = in_flight.clone();
        let overlaps = overlaps.clone();

        workers.push(thread::spawn(move || {
            for j in 0..20 {
                let in_flight = in_flight.clone();
                let overlaps = overlaps.clone();
                let got = dispatcher
                    .invoke(move || {
                        if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_micros(50));
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        i * 100 + j
                    })
                    .unwrap();
                assert_eq!(got, i * 100 + j);
            }
        }));
    }

    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

#[test]
fn reentrant_invoke_runs_inline() {
    let dispatcher = Arc::new(AffinityDispatcher::new().unwrap());
    let inner = dispatcher.clone();

    let (outer_thread, inner_thread, value) = dispatcher
        .invoke(move || {
            assert!(inner.is_affinity_thread());
            let outer_thread = thread::current().id();
            // Would deadlock if this were queued behind the running job.
            let (inner_thread, v) = inner
                .invoke(|| (thread::current().id(), 41))
                .unwrap();
            (outer_thread, inner_thread, v + 1)
        })
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(outer_thread, inner_thread);
    assert_eq!(outer_thread, dispatcher.thread_id());
}

#[test]
fn job_errors_come_back_verbatim() {
    let dispatcher = AffinityDispatcher::new().unwrap();

    let out: Result<(), String> = dispatcher
        .invoke(|| Err("engine said no".to_string()))
        .unwrap();
    assert_eq!(out, Err("engine said no".to_string()));

    // The thread is still serving.
    assert_eq!(dispatcher.invoke(|| 7).unwrap(), 7);
}

#[test]
fn panics_are_resumed_on_the_caller_and_do_not_kill_the_thread() {
    let dispatcher = AffinityDispatcher::new().unwrap();
    let affinity = dispatcher.thread_id();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        dispatcher.invoke(|| -> u32 { panic!("boom") })
    }));
    let payload = result.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));

    let after = dispatcher.invoke(|| thread::current().id()).unwrap();
    assert_eq!(after, affinity);
}

#[test]
fn shutdown_drains_queued_jobs() {
    let dispatcher = AffinityDispatcher::new().unwrap();
    let done = Arc::new(AtomicUsize::new(0));

    let mut pending = Vec::new();
    for _ in 0..20 {
        let done = done.clone();
        pending.push(
            dispatcher
                .submit(move || {
                    thread::sleep(Duration::from_millis(1));
                    done.fetch_add(1, Ordering::SeqCst)
                })
                .unwrap(),
        );
    }

    dispatcher.shutdown();
    assert_eq!(done.load(Ordering::SeqCst), 20);

    for (i, p) in pending.into_iter().enumerate() {
        assert_eq!(p.wait().unwrap(), i);
    }
}

#[test]
fn invoke_after_shutdown_is_disposed_and_shutdown_is_idempotent() {
    let dispatcher = AffinityDispatcher::new().unwrap();
    assert!(!dispatcher.is_disposed());

    dispatcher.shutdown();
    assert!(dispatcher.is_disposed());
    assert!(matches!(dispatcher.invoke(|| 1), Err(DispatchError::Disposed)));
    assert!(matches!(dispatcher.submit(|| 1), Err(DispatchError::Disposed)));

    // Second call is a no-op.
    dispatcher.shutdown();
    assert!(matches!(dispatcher.invoke(|| 1), Err(DispatchError::Disposed)));
}

#[test]
fn shutdown_from_the_affinity_thread_does_not_deadlock() {
    let dispatcher = Arc::new(AffinityDispatcher::new().unwrap());
    let inner = dispatcher.clone();

    dispatcher
        .invoke(move || {
            inner.shutdown();
            assert!(inner.is_disposed());
        })
        .unwrap();

    assert!(matches!(dispatcher.invoke(|| 1), Err(DispatchError::Disposed)));
    // Joins the (now exiting) thread.
    dispatcher.shutdown();
}

#[test]
fn custom_thread_name_is_applied() {
    let dispatcher = AffinityDispatcher::with_thread_name("cad-sta").unwrap();
    let name = dispatcher
        .invoke(|| thread::current().name().map(str::to_string))
        .unwrap();

    assert_eq!(name.as_deref(), Some("cad-sta"));
    assert_eq!(dispatcher.thread_name(), "cad-sta");
}

#[tokio::test]
async fn abandoned_wait_does_not_cancel_the_job() {
    let dispatcher = AffinityDispatcher::new().unwrap();
    let finished = Arc::new(AtomicBool::new(false));

    let slow = {
        let finished = finished.clone();
        dispatcher
            .submit(move || {
                thread::sleep(Duration::from_millis(200));
                finished.store(true, Ordering::SeqCst);
            })
            .unwrap()
    };

    let waited = tokio::time::timeout(Duration::from_millis(20), slow.wait_async()).await;
    assert!(waited.is_err(), "expected the bounded wait to elapse");

    // FIFO: this job only runs after the slow one has completed.
    let seen = {
        let finished = finished.clone();
        dispatcher
            .submit(move || finished.load(Ordering::SeqCst))
            .unwrap()
            .wait_async()
            .await
            .unwrap()
    };
    assert!(seen);
}

#[tokio::test]
async fn blocking_invoke_works_inside_a_runtime() {
    let dispatcher = AffinityDispatcher::new().unwrap();
    let affinity = dispatcher.thread_id();

    // Blocks this runtime thread, but must neither panic nor deadlock.
    let ran_on = dispatcher.invoke(|| thread::current().id()).unwrap();
    assert_eq!(ran_on, affinity);

    let pending = dispatcher.submit(|| 5).unwrap();
    assert_eq!(pending.wait().unwrap(), 5);

    // Shutdown (and the join in it) from async code as well.
    dispatcher.shutdown();
    assert!(matches!(dispatcher.invoke(|| 1), Err(DispatchError::Disposed)));
}

#[tokio::test]
async fn wait_async_sees_a_result_that_is_already_there() {
    let dispatcher = AffinityDispatcher::new().unwrap();

    let first = dispatcher.submit(|| "first").unwrap();
    // Runs after `first`, so `first` is complete before anyone awaits it.
    dispatcher.invoke(|| ()).unwrap();

    assert_eq!(first.wait_async().await.unwrap(), "first");
}
