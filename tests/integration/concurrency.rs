//! Bounded concurrency tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_pod::{Job, JobResult, Pod};
use tokio_test::assert_ok;

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_never_more_jobs_than_workers() {
    let probe = Probe::new();
    let pod = Pod::from_config(unthrottled(3));
    assert_ok!(pod.start());

    for _ in 0..30 {
        assert_ok!(pod.add_job(probe.job(Duration::from_millis(10))).await);
    }
    pod.wait().await;

    assert_eq!(probe.finished(), 30);
    assert!(probe.peak() <= 3, "peak {} exceeds pool size", probe.peak());
    assert!(probe.peak() >= 1);
    assert_ok!(pod.shutdown().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_every_worker_gets_used() {
    let probe = Probe::new();
    let pod = Pod::from_config(unthrottled(4).with_queue_capacity(16));
    assert_ok!(pod.start());

    for _ in 0..4 {
        assert_ok!(pod.add_job(probe.job(Duration::from_millis(200))).await);
    }

    // Four long jobs on four idle workers must overlap
    assert!(wait_until(Duration::from_secs(2), || probe.running() == 4).await);
    pod.wait().await;
    assert_eq!(probe.peak(), 4);
    assert_ok!(pod.shutdown().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_job_does_not_kill_worker() {
    let pod = Pod::from_config(unthrottled(1));
    assert_ok!(pod.start());

    let counter = Arc::new(AtomicUsize::new(0));
    assert_ok!(pod.add_job(|| -> JobResult { panic!("boom") }).await);
    for _ in 0..3 {
        let counter = Arc::clone(&counter);
        assert_ok!(
            pod.add_job(move || -> JobResult {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
        );
    }
    pod.wait().await;

    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_ok!(pod.shutdown().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_submit_from_many_producers() {
    let probe = Probe::new();
    let pod = Arc::new(Pod::from_config(unthrottled(4)));
    assert_ok!(pod.start());

    let mut producers = Vec::new();
    for _ in 0..8 {
        let pod = Arc::clone(&pod);
        let probe = probe.clone();
        producers.push(tokio::spawn(async move {
            for _ in 0..25 {
                pod.add_job(probe.job(Duration::from_millis(1))).await.unwrap();
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    pod.wait().await;

    assert_eq!(probe.finished(), 200);
    assert!(probe.peak() <= 4);
    assert_ok!(pod.shutdown().await);
}

/// Records which executor thread ran it, from execute start to release end.
struct SpanJob {
    spans: Arc<Mutex<Vec<(String, Instant, Instant)>>>,
    started: Option<(String, Instant)>,
}

impl Job for SpanJob {
    fn execute(&mut self) -> JobResult {
        let name = std::thread::current().name().unwrap_or_default().to_string();
        self.started = Some((name, Instant::now()));
        std::thread::sleep(Duration::from_millis(5));
        Ok(())
    }

    fn release(&mut self) -> JobResult {
        std::thread::sleep(Duration::from_millis(2));
        if let Some((name, start)) = self.started.take() {
            self.spans.lock().unwrap().push((name, start, Instant::now()));
        }
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_runs_one_task_at_a_time() {
    let spans = Arc::new(Mutex::new(Vec::new()));
    let pod = Pod::from_config(unthrottled(4).with_name("solo"));
    assert_ok!(pod.start());

    for _ in 0..60 {
        let job = SpanJob {
            spans: Arc::clone(&spans),
            started: None,
        };
        assert_ok!(pod.add_job(job).await);
    }
    pod.wait().await;
    assert_ok!(pod.shutdown().await);

    let spans = spans.lock().unwrap().clone();
    assert_eq!(spans.len(), 60);

    let mut by_thread: HashMap<String, Vec<(Instant, Instant)>> = HashMap::new();
    for (name, start, end) in spans {
        assert!(name.starts_with("solo-"), "job ran on thread {:?}", name);
        by_thread.entry(name).or_default().push((start, end));
    }
    assert!(by_thread.len() >= 2, "only {} executor used", by_thread.len());

    for (name, mut intervals) in by_thread {
        intervals.sort_by_key(|&(start, _)| start);
        for pair in intervals.windows(2) {
            assert!(
                pair[1].0 >= pair[0].1,
                "{} started a task before releasing the previous one",
                name
            );
        }
    }
}
