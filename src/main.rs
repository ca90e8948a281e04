use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use tokio_pod::config::{env_parse, Config};
use tokio_pod::{logging, JobResult, Pod};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    logging::init(&config.logging)?;

    info!("Starting tokio_pod {}", tokio_pod::VERSION);
    config.log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tokio-pod-rt")
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let jobs: usize = env_parse("DEMO_JOBS", 100)?;
    let job_ms: u64 = env_parse("DEMO_JOB_MS", 100)?;

    let failed = Arc::new(AtomicUsize::new(0));
    let reporter_failed = Arc::clone(&failed);

    let pod = Pod::from_config(config.pool).with_reporter(move |task| {
        if let Some(e) = task.error() {
            reporter_failed.fetch_add(1, Ordering::Relaxed);
            warn!(task = task.id(), error = %e, "job failed");
            return;
        }
        let elapsed_ms = task.elapsed().map(|d| d.as_millis() as u64).unwrap_or(0);
        info!(task = task.id(), elapsed_ms, "job finished");
    });

    let started = Instant::now();
    pod.start()?;

    let submit = async {
        for i in 0..jobs {
            pod.add_job(move || -> JobResult {
                std::thread::sleep(Duration::from_millis(job_ms));
                if i % 97 == 96 {
                    return Err(format!("job {} gave up", i).into());
                }
                Ok(())
            })
            .await?;
        }
        pod.wait().await;
        pod.wait_reported().await;
        Ok::<_, tokio_pod::PodError>(())
    };

    tokio::select! {
        result = submit => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    pod.shutdown().await?;

    info!(
        jobs,
        failed = failed.load(Ordering::Relaxed),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Demo finished"
    );

    Ok(())
}
