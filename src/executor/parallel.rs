//! Parallel attempt scheduling
//!
//! Fans a batch of seeded attempts out over a bounded pool and collects
//! exactly one result per attempt.

use futures::future::join_all;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::AttemptExecutor;
use crate::models::{Attempt, AttemptResult, Framework};
use crate::utils::Timer;

pub const DEFAULT_SEED_MIN: u32 = 1;
pub const DEFAULT_SEED_MAX: u32 = 1_000_000;

/// Bounded-concurrency scheduler for one batch of attempts
pub struct RunScheduler {
    executor: Arc<dyn AttemptExecutor>,
    parallelism: usize,
    seed_min: u32,
    seed_max: u32,
}

impl RunScheduler {
    pub fn new(executor: Arc<dyn AttemptExecutor>, parallelism: usize) -> Self {
        Self {
            executor,
            parallelism: parallelism.max(1),
            seed_min: DEFAULT_SEED_MIN,
            seed_max: DEFAULT_SEED_MAX,
        }
    }

    /// Inclusive range seeds are drawn from
    pub fn with_seed_range(mut self, min: u32, max: u32) -> Self {
        self.seed_min = min.min(max);
        self.seed_max = max.max(min);
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Build `runs` attempts with dense indices and independently drawn seeds
    pub fn plan(&self, runs: u32, command: Vec<String>, framework: Framework) -> Vec<Attempt> {
        self.plan_with_rng(&mut rand::rng(), runs, command, framework)
    }

    /// Seeds are drawn with replacement; duplicates within a batch are allowed
    pub fn plan_with_rng<R: Rng>(
        &self,
        rng: &mut R,
        runs: u32,
        command: Vec<String>,
        framework: Framework,
    ) -> Vec<Attempt> {
        let command = Arc::new(command);
        (0..runs)
            .map(|index| {
                let seed = rng.random_range(self.seed_min..=self.seed_max);
                Attempt::new(index, seed, Arc::clone(&command), framework)
            })
            .collect()
    }

    /// Run every attempt, at most `parallelism` at a time
    ///
    /// All attempts are submitted up front. The returned vector has one entry
    /// per input attempt; a task that faults is replaced by a worker-error
    /// result for its slot.
    pub async fn run(&self, attempts: Vec<Attempt>) -> Vec<AttemptResult> {
        info!(
            "Scheduling {} attempts (max {} concurrent)",
            attempts.len(),
            self.parallelism
        );

        let timer = Timer::start("batch");
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut handles = Vec::with_capacity(attempts.len());

        for attempt in attempts {
            let semaphore = semaphore.clone();
            let executor = self.executor.clone();
            let task_attempt = attempt.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return AttemptResult::worker_failed(&task_attempt, e.to_string());
                    }
                };

                executor.execute(&task_attempt).await
            });

            handles.push((attempt, handle));
        }

        let (attempts, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let results: Vec<AttemptResult> = attempts
            .iter()
            .zip(joined)
            .map(|(attempt, joined)| match joined {
                Ok(result) => {
                    debug!("  {}", result);
                    result
                }
                Err(e) => {
                    warn!("Attempt {} lost its worker: {}", attempt.index, e);
                    AttemptResult::worker_failed(attempt, e.to_string())
                }
            })
            .collect();

        info!(
            "Batch completed in {}ms - {}/{} passed",
            timer.elapsed_ms(),
            results.iter().filter(|r| r.passed()).count(),
            results.len()
        );

        results
    }
}
