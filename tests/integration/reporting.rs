//! Reporting pipeline tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_pod::{JobResult, Pod};
use tokio_test::assert_ok;

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_reporter_does_not_stall_workers() {
    let reported = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&reported);
    let pod = Pod::from_config(unthrottled(2).with_report_concurrency(1)).with_reporter(
        move |_task| {
            std::thread::sleep(Duration::from_millis(50));
            seen.fetch_add(1, Ordering::SeqCst);
        },
    );
    assert_ok!(pod.start());

    let probe = Probe::new();
    let started = Instant::now();
    for _ in 0..10 {
        assert_ok!(pod.add_job(probe.job(Duration::ZERO)).await);
    }
    pod.wait().await;
    let worked = started.elapsed();

    // Ten reports at 50ms each, one at a time
    assert!(
        worked < Duration::from_millis(300),
        "workers waited on the reporter: {:?}",
        worked
    );
    assert!(reported.load(Ordering::SeqCst) < 10);

    pod.wait_reported().await;
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(reported.load(Ordering::SeqCst), 10);
    assert_ok!(pod.shutdown().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_report_concurrency_is_capped() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (c, p) = (Arc::clone(&current), Arc::clone(&peak));

    let pod = Pod::from_config(unthrottled(4).with_report_concurrency(2)).with_reporter(
        move |_task| {
            let now = c.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            c.fetch_sub(1, Ordering::SeqCst);
        },
    );
    assert_ok!(pod.start());

    for _ in 0..20 {
        assert_ok!(pod.add_job(|| -> JobResult { Ok(()) }).await);
    }
    pod.wait().await;
    pod.wait_reported().await;

    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(peak.load(Ordering::SeqCst) >= 1);
    assert_ok!(pod.shutdown().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_jobs_are_reported_with_error() {
    let collector = Collector::new();
    let pod = Pod::from_config(unthrottled(2)).with_reporter(collector.sink());
    assert_ok!(pod.start());

    assert_ok!(pod.add_job(|| -> JobResult { Err("disk full".into()) }).await);
    assert_ok!(pod.add_job(|| -> JobResult { panic!("bad input") }).await);
    assert_ok!(pod.add_job(|| -> JobResult { Ok(()) }).await);
    pod.wait_reported().await;

    let tasks = collector.take();
    assert_eq!(tasks.len(), 3);

    let failed: Vec<_> = tasks.iter().filter_map(|t| t.error()).collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().any(|e| e.message == "disk full"));
    assert!(failed.iter().any(|e| e.is_panic()));
    assert_eq!(tasks.iter().filter(|t| t.is_success()).count(), 1);

    assert_ok!(pod.shutdown().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_reporter_keeps_pipeline_alive() {
    let reported = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&reported);
    let pod = Pod::from_config(unthrottled(1)).with_reporter(move |task| {
        seen.fetch_add(1, Ordering::SeqCst);
        if task.id() % 2 == 0 {
            panic!("sink failure");
        }
    });
    assert_ok!(pod.start());

    for _ in 0..6 {
        assert_ok!(pod.add_job(|| -> JobResult { Ok(()) }).await);
    }
    pod.wait().await;
    pod.wait_reported().await;

    assert_eq!(reported.load(Ordering::SeqCst), 6);
    assert_eq!(pod.dispatcher().reports_pending(), 0);
    assert_ok!(pod.shutdown().await);
}
