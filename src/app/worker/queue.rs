//! In-memory job queue shared by fetch workers
//!
//! Workers pull jobs until the queue is empty. Jobs still queued when the batch
//! is cancelled are counted as abandoned by the orchestrator.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::app::models::DownloadJob;

/// FIFO queue of pending jobs
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<DownloadJob>>,
}

impl JobQueue {
    /// Create a queue holding `jobs` in order
    pub fn new(jobs: Vec<DownloadJob>) -> Self {
        Self {
            jobs: Mutex::new(jobs.into()),
        }
    }

    /// Take the next job, `None` once the queue is drained
    pub async fn pop(&self) -> Option<DownloadJob> {
        self.jobs.lock().await.pop_front()
    }

    /// Remove and return every job not yet taken
    pub async fn drain(&self) -> Vec<DownloadJob> {
        self.jobs.lock().await.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::tests::sample_spec;
    use crate::app::models::LevelType;
    use chrono::Utc;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn job(step: u32) -> DownloadJob {
        DownloadJob {
            model: Arc::new(sample_spec()),
            grid: "regular-lat-lon".to_string(),
            field: "t_2m".to_string(),
            level_type: LevelType::SingleLevel,
            step,
            level: 0,
            run: Utc::now(),
            dest_dir: PathBuf::from("/tmp"),
            file_name: None,
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = JobQueue::new(vec![job(0), job(1), job(2)]);
        assert_eq!(queue.pop().await.unwrap().step, 0);
        assert_eq!(queue.pop().await.unwrap().step, 1);

        let rest = queue.drain().await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].step, 2);
        assert!(queue.pop().await.is_none());
        assert!(queue.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_pop_hands_out_each_job_once() {
        let queue = Arc::new(JobQueue::new((0..100).map(job).collect()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let mut taken = Vec::new();
                    while let Some(job) = queue.pop().await {
                        taken.push(job.step);
                    }
                    taken
                })
            })
            .collect();

        let mut all: Vec<u32> = futures::future::join_all(handles)
            .await
            .into_iter()
            .flat_map(|r| r.unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }
}
