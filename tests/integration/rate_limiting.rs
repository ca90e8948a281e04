//! Dispatch rate limiting tests

use std::time::{Duration, Instant};

use tokio_pod::{Pod, PoolConfig};
use tokio_test::assert_ok;

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interval_paces_dispatch() {
    let probe = Probe::new();
    let pod = Pod::from_config(PoolConfig::new(4).with_interval(Duration::from_millis(20)));

    let started = Instant::now();
    assert_ok!(pod.start());
    for _ in 0..5 {
        assert_ok!(pod.add_job(probe.job(Duration::ZERO)).await);
    }
    pod.wait().await;

    // Five dispatches, each waiting for its own tick
    assert!(
        started.elapsed() >= Duration::from_millis(95),
        "finished after {:?}",
        started.elapsed()
    );
    assert_eq!(probe.finished(), 5);
    assert_ok!(pod.shutdown().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_priority_burst_skips_limiter() {
    let probe = Probe::new();
    let pod = Pod::from_config(
        PoolConfig::new(4)
            .with_interval(Duration::from_millis(300))
            .with_priority(3),
    );

    let started = Instant::now();
    assert_ok!(pod.start());
    for _ in 0..3 {
        assert_ok!(pod.add_job(probe.job(Duration::ZERO)).await);
    }
    pod.wait().await;
    assert!(
        started.elapsed() < Duration::from_millis(250),
        "burst took {:?}",
        started.elapsed()
    );

    // The fourth dispatch is past the burst and waits for a tick
    assert_ok!(pod.add_job(probe.job(Duration::ZERO)).await);
    pod.wait().await;
    assert!(started.elapsed() >= Duration::from_millis(290));

    assert_eq!(probe.finished(), 4);
    assert_ok!(pod.shutdown().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_set_priority_before_run() {
    let probe = Probe::new();
    let pod = Pod::from_config(PoolConfig::new(2).with_interval(Duration::from_millis(500)));
    pod.dispatcher().set_priority(2);
    assert_eq!(pod.dispatcher().priority(), 2);

    let started = Instant::now();
    assert_ok!(pod.start());
    for _ in 0..2 {
        assert_ok!(pod.add_job(probe.job(Duration::ZERO)).await);
    }
    pod.wait().await;
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_ok!(pod.shutdown().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unthrottled_pool_runs_without_pacing() {
    let probe = Probe::new();
    let pod = Pod::from_config(unthrottled(4));

    let started = Instant::now();
    assert_ok!(pod.start());
    for _ in 0..50 {
        assert_ok!(pod.add_job(probe.job(Duration::ZERO)).await);
    }
    pod.wait().await;

    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(probe.finished(), 50);
    assert_ok!(pod.shutdown().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_set_priority_while_running() {
    let probe = Probe::new();
    let pod = Pod::from_config(PoolConfig::new(2).with_interval(Duration::from_millis(500)));
    assert_ok!(pod.start());

    pod.dispatcher().set_priority(3);
    assert_eq!(pod.dispatcher().priority(), 3);

    let started = Instant::now();
    for _ in 0..3 {
        assert_ok!(pod.add_job(probe.job(Duration::ZERO)).await);
    }
    pod.wait().await;
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "raised priority ignored, took {:?}",
        started.elapsed()
    );
    assert_eq!(probe.finished(), 3);
    assert_ok!(pod.shutdown().await);
}
