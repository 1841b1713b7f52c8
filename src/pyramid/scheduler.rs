//! Parallel tile scheduler.
//!
//! Tiles of a level are enumerated as `rows × cols`. The outer pass over rows
//! runs concurrently (one task per row, bounded by a semaphore); the inner pass
//! over the columns of a row is sequential. Concurrency therefore never exceeds
//! the number of rows, however large the pyramid.
//!
//! Every tile job is isolated: a failing job is recorded and logged, and its
//! siblings carry on. The caller only sees the aggregate [`BatchReport`].

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::error::{BuildError, TileError};

/// One tile that could not be produced or stored.
#[derive(Debug, Clone)]
pub struct TileFailure {
    pub row: u32,
    pub col: u32,
    pub error: TileError,
}

/// Aggregate outcome of one scheduled pass.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<TileFailure>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: BatchReport) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failures.extend(other.failures);
    }
}

/// Runs per-tile jobs over a level, optionally in parallel.
#[derive(Debug, Clone)]
pub struct TileScheduler {
    max_concurrency: usize,
}

impl Default for TileScheduler {
    fn default() -> Self {
        Self::new(
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        )
    }
}

impl TileScheduler {
    /// Create a scheduler running at most `max_concurrency` rows at once.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run `job(row, col)` for every tile of a `rows × cols` grid.
    ///
    /// With `parallel` unset every tile runs in order on the current task.
    /// Returns `BuildError::Join` only if a row task itself panicked; tile
    /// failures are reported in the [`BatchReport`].
    pub async fn run<F, Fut>(
        &self,
        rows: u32,
        cols: u32,
        parallel: bool,
        job: F,
    ) -> Result<BatchReport, BuildError>
    where
        F: Fn(u32, u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TileError>> + Send + 'static,
    {
        let job = Arc::new(job);

        if !parallel {
            let mut report = BatchReport::default();
            for row in 0..rows {
                report.merge(run_row(job.as_ref(), row, cols).await);
            }
            return Ok(report);
        }

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut set = JoinSet::new();

        for row in 0..rows {
            let job = job.clone();
            let permits = permits.clone();
            set.spawn(async move {
                // The semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                run_row(job.as_ref(), row, cols).await
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(row_report) => report.merge(row_report),
                Err(e) => {
                    set.abort_all();
                    return Err(BuildError::Join(e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

async fn run_row<F, Fut>(job: &F, row: u32, cols: u32) -> BatchReport
where
    F: Fn(u32, u32) -> Fut,
    Fut: Future<Output = Result<(), TileError>>,
{
    let mut report = BatchReport::default();
    for col in 0..cols {
        report.total += 1;
        match job(row, col).await {
            Ok(()) => report.succeeded += 1,
            Err(error) => {
                warn!(row, col, error = %error, "tile job failed");
                report.failures.push(TileFailure { row, col, error });
            }
        }
    }
    report
}
