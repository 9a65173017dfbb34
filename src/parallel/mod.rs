//! Worker sizing and execution strategy for plugin batches
//!
//! This module only knows about system resources and user limits. Deciding
//! whether a given hook is worth running in parallel is the caller's job.
//!
//! ```rust
//! use hookgate::parallel::ExecutionStrategy;
//!
//! let workers = ExecutionStrategy::calculate_optimal_workers(0, 75);
//! assert!(workers >= 1);
//!
//! // 3 plugins with a threshold of 2 runs on the pool
//! let strategy = ExecutionStrategy::auto(3, 2, workers);
//! assert!(matches!(strategy, ExecutionStrategy::Parallel { .. }));
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// Parallel once `work_items_count` reaches `min_items_for_parallel`
    ///
    /// A single item, or a single worker, is always sequential.
    pub fn auto(work_items_count: usize, min_items_for_parallel: usize, optimal_workers: usize) -> Self {
        if work_items_count > 1 && optimal_workers > 1 && work_items_count >= min_items_for_parallel {
            ExecutionStrategy::Parallel {
                workers: optimal_workers.min(work_items_count),
            }
        } else {
            ExecutionStrategy::Sequential
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, ExecutionStrategy::Parallel { .. })
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::Parallel { workers } => *workers,
        }
    }

    /// Workers allowed by the CPU count, a percentage of it and a hard limit
    ///
    /// ```text
    /// cores * thread_percentage / 100, at least 1
    /// capped at max_threads_config when it is non-zero
    /// ```
    pub fn calculate_optimal_workers(max_threads_config: usize, thread_percentage: u8) -> usize {
        Self::workers_for_cores(num_cpus::get(), max_threads_config, thread_percentage)
    }

    fn workers_for_cores(available_cores: usize, max_threads_config: usize, thread_percentage: u8) -> usize {
        let workers_by_percentage = std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

        if max_threads_config > 0 {
            std::cmp::min(max_threads_config, workers_by_percentage)
        } else {
            workers_by_percentage
        }
    }
}
