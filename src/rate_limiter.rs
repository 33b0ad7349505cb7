//! Process-wide sequential queue with a fixed start cadence.
//!
//! A single worker task drains the queue in submission order. It runs one
//! job at a time and never starts two jobs less than `interval` apart. Every
//! handle cloned from one queue shares the same worker, so all callers across
//! all in-flight requests are serialized together.

use crate::errors::AppError;
use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Clone)]
pub struct RateLimitQueue {
    name: &'static str,
    jobs: mpsc::UnboundedSender<Job>,
}

impl RateLimitQueue {
    /// Spawns the worker. Must be called inside a tokio runtime.
    pub fn new(name: &'static str, interval: Duration) -> Self {
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            let mut next_slot = Instant::now();

            while let Some(job) = rx.recv().await {
                if next_slot > Instant::now() {
                    tracing::debug!(
                        "{} queue: waiting {:?} for next slot",
                        name,
                        next_slot - Instant::now()
                    );
                    sleep_until(next_slot).await;
                }
                next_slot = Instant::now() + interval;

                // A panicking job must not take the worker down with it.
                if let Err(e) = tokio::spawn(job()).await {
                    tracing::error!("{} queue: job failed to complete: {}", name, e);
                }
            }

            tracing::debug!("{} queue: all handles dropped, worker exiting", name);
        });

        Self { name, jobs }
    }

    /// One execution per second, the courtesy limit of public OSM services.
    pub fn per_second(name: &'static str) -> Self {
        Self::new(name, Duration::from_secs(1))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueues `task` and waits for its output.
    ///
    /// Waiting for a slot is never an error; only a vanished worker is.
    pub async fn submit<F, Fut, T>(&self, task: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            Box::pin(async move {
                let output = task().await;
                // The caller may have gone away; its result is simply dropped.
                let _ = done_tx.send(output);
            })
        });

        self.jobs.send(job).map_err(|_| {
            AppError::InternalError(format!("{} rate-limit queue is closed", self.name))
        })?;

        done_rx.await.map_err(|_| {
            AppError::InternalError(format!("{} rate-limit queue dropped a job", self.name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn test_starts_are_spaced_by_interval() {
        let queue = RateLimitQueue::per_second("test");
        let starts = Arc::new(Mutex::new(Vec::new()));
        let origin = Instant::now();

        let recorder = starts.clone();
        let job = move |i: u32| {
            let starts = recorder.clone();
            move || async move {
                starts.lock().unwrap().push((i, Instant::now() - origin));
                i
            }
        };

        // join! polls in order, so submission order is 0, 1, 2.
        let (a, b, c) = tokio::join!(
            queue.submit(job(0)),
            queue.submit(job(1)),
            queue.submit(job(2))
        );
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (0, 1, 2));

        let starts = starts.lock().unwrap().clone();
        assert_eq!(
            starts.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        for pair in starts.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_job_at_a_time() {
        let queue = RateLimitQueue::new("test", Duration::from_millis(10));
        let running = Arc::new(Mutex::new(0u32));
        let peak = Arc::new(Mutex::new(0u32));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .submit(move || async move {
                        {
                            let mut r = running.lock().unwrap();
                            *r += 1;
                            let mut p = peak.lock().unwrap();
                            *p = (*p).max(*r);
                        }
                        tokio::time::sleep(Duration::from_secs(3)).await;
                        *running.lock().unwrap() -= 1;
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(*peak.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_worker() {
        let queue = RateLimitQueue::new("test", Duration::from_millis(1));

        let failed = queue.submit(|| async { panic!("boom") }).await;
        assert!(matches!(failed, Err(AppError::InternalError(_))));

        let ok = queue.submit(|| async { 7 }).await.unwrap();
        assert_eq!(ok, 7);
    }
}
