//! Bounded worker pool for session application
//!
//! Jobs are fed to scoped worker threads over a bounded channel; results come
//! back over a second channel in completion order. Callers sort the results.

use crossbeam_channel::{bounded, unbounded};

/// Jobs waiting per worker before the feeder blocks
const QUEUE_PER_WORKER: usize = 2;

/// Run `work` over `jobs` on up to `workers` threads.
///
/// With a single worker the jobs run on the calling thread.
pub fn run_pool<J, R, F>(jobs: Vec<J>, workers: usize, work: F) -> Vec<R>
where
    J: Send,
    R: Send,
    F: Fn(J) -> R + Sync,
{
    let workers = workers.max(1).min(jobs.len().max(1));
    if workers == 1 {
        return jobs.into_iter().map(work).collect();
    }

    let expected = jobs.len();
    let (job_tx, job_rx) = bounded::<J>(workers * QUEUE_PER_WORKER);
    let (result_tx, result_rx) = unbounded::<R>();
    let work = &work;

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for job in job_rx.iter() {
                    if result_tx.send(work(job)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for job in jobs {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);
    });

    let results: Vec<R> = result_rx.iter().collect();
    if results.len() != expected {
        tracing::error!(
            "Worker pool returned {} of {} results",
            results.len(),
            expected
        );
    }
    results
}
