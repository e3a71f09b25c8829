use futures::stream::{self, StreamExt};

use crate::models::job::JobResult;
use crate::services::executor::Executor;

/// Fans out jobs over one shared executor and joins them all.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    executor: Executor,
    max_in_flight: Option<usize>,
}

impl Dispatcher {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            max_in_flight: None,
        }
    }

    /// Cap concurrent requests. Results keep job order either way.
    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.max_in_flight = limit.map(|l| l.max(1));
        self
    }

    /// Run jobs `0..jobs` and return their results ordered by job id,
    /// only after every job is terminal.
    pub async fn run(&self, jobs: usize) -> Vec<JobResult> {
        if jobs == 0 {
            return Vec::new();
        }

        tracing::info!(
            jobs,
            max_in_flight = self.max_in_flight,
            mode = %self.executor.policy().mode,
            "Dispatching jobs"
        );

        let results: Vec<JobResult> = match self.max_in_flight {
            Some(limit) if limit < jobs => {
                stream::iter(0..jobs)
                    .map(|job_id| self.executor.execute(job_id))
                    .buffered(limit)
                    .collect()
                    .await
            }
            _ => {
                futures::future::join_all((0..jobs).map(|job_id| self.executor.execute(job_id)))
                    .await
            }
        };

        debug_assert!(results.iter().enumerate().all(|(i, r)| r.job.job_id == i));
        results
    }
}
