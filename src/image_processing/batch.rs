use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::pipeline::{BatchJob, ProcessingResult, Stage};
use crate::error::{DepixelResult, FailureKind};
use crate::utils::ProcessingStats;

/// Batch processing statistics and progress tracking
pub struct BatchProcessor {
    pub total_files: usize,
    pub processed_count: AtomicUsize,
    pub start_time: Instant,
}

impl BatchProcessor {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            processed_count: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Increment processed count and return current count
    pub fn increment(&self) -> usize {
        self.processed_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_files == 0 {
            1.0
        } else {
            (self.processed_count.load(Ordering::Relaxed) as f64) / (self.total_files as f64)
        }
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Option<Duration> {
        let processed = self.processed_count.load(Ordering::Relaxed);
        if processed == 0 {
            return None;
        }

        let remaining = self.total_files.saturating_sub(processed);
        if remaining == 0 {
            return Some(Duration::ZERO);
        }

        let time_per_item = self.start_time.elapsed() / processed as u32;
        Some(time_per_item * remaining as u32)
    }
}

/// Progress notifications emitted while a batch runs.
///
/// `worker` is the index of the pool thread running the job, in `0..workers`.
#[derive(Debug)]
pub enum JobEvent<'a> {
    Started {
        job: &'a BatchJob,
        worker: usize,
    },
    Stage {
        job: &'a BatchJob,
        worker: usize,
        stage: Stage,
    },
    Finished {
        job: &'a BatchJob,
        worker: usize,
        outcome: &'a DepixelResult<ProcessingResult>,
        completed: usize,
        total: usize,
        eta: Option<Duration>,
    },
}

/// Result of one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: BatchJob,
    pub result: DepixelResult<ProcessingResult>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a whole batch, one per job and in job order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn successful(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn failures_by_kind(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            if let Err(e) = &outcome.result {
                *counts.entry(e.kind()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(JobOutcome::is_success)
    }

    pub fn stats(&self) -> ProcessingStats {
        calculate_final_stats(&self.outcomes, self.elapsed)
    }
}

/// Run `process_fn` for every job on a dedicated pool of `workers` threads.
///
/// A local pool keeps concurrency bounded to `workers` no matter what the
/// global rayon pool is configured to. Job failures never stop the batch;
/// only failing to build the pool is a batch-level error.
pub fn process_jobs_parallel<F, P>(
    jobs: &[BatchJob],
    workers: usize,
    process_fn: F,
    progress_callback: P,
) -> Result<BatchReport>
where
    F: Fn(&BatchJob, &dyn Fn(Stage)) -> DepixelResult<ProcessingResult> + Send + Sync,
    P: Fn(JobEvent<'_>) + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("depixel-worker-{}", i))
        .build()
        .context("Failed to build worker pool")?;

    let processor = BatchProcessor::new(jobs.len());

    let outcomes = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let worker = rayon::current_thread_index().unwrap_or(0);
                progress_callback(JobEvent::Started { job, worker });

                let on_stage = |stage: Stage| {
                    progress_callback(JobEvent::Stage { job, worker, stage });
                };
                let result = process_fn(job, &on_stage);

                let completed = processor.increment();
                progress_callback(JobEvent::Finished {
                    job,
                    worker,
                    outcome: &result,
                    completed,
                    total: processor.total_files,
                    eta: processor.eta(),
                });

                JobOutcome {
                    job: job.clone(),
                    result,
                }
            })
            .collect::<Vec<_>>()
    });

    Ok(BatchReport {
        outcomes,
        elapsed: processor.start_time.elapsed(),
    })
}

/// Calculate comprehensive processing statistics
pub fn calculate_final_stats(outcomes: &[JobOutcome], processing_time: Duration) -> ProcessingStats {
    let mut stats = ProcessingStats::new(outcomes.len());
    for outcome in outcomes {
        match &outcome.result {
            Ok(result) => {
                stats.successful += 1;
                stats.shapes_kept += result.shapes_kept;
                stats.shapes_removed += result.shapes_removed;
            }
            Err(_) => stats.failed += 1,
        }
    }
    stats.total_duration = processing_time;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DepixelError;
    use std::path::Path;
    use std::sync::Mutex;
    use std::thread;

    fn jobs(n: usize) -> Vec<BatchJob> {
        (0..n)
            .map(|i| BatchJob::new(Path::new(&format!("/in/{i:02}.png")), Path::new("/out"), "png"))
            .collect()
    }

    fn ok_result(job: &BatchJob) -> ProcessingResult {
        ProcessingResult {
            input_path: job.input_path.clone(),
            vector_path: job.vector_path.clone(),
            preview_path: job.preview_path.clone(),
            shapes_kept: 2,
            shapes_removed: 1,
            processing_time: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_batch_processor_progress() {
        let processor = BatchProcessor::new(10);

        assert_eq!(processor.progress(), 0.0);

        processor.increment();
        assert!((processor.progress() - 0.1).abs() < 0.01);

        for _ in 0..9 {
            processor.increment();
        }
        assert!((processor.progress() - 1.0).abs() < 0.01);
        assert_eq!(processor.eta(), Some(Duration::ZERO));
    }

    #[test]
    fn test_batch_processor_eta() {
        let processor = BatchProcessor::new(4);

        // No ETA before any processing
        assert!(processor.eta().is_none());

        thread::sleep(Duration::from_millis(10));
        processor.increment();

        let eta = processor.eta();
        assert!(eta.is_some());
        assert!(eta.unwrap() > Duration::ZERO);
    }

    #[test]
    fn test_outcomes_keep_job_order_and_isolate_failures() {
        let jobs = jobs(12);
        let report = process_jobs_parallel(
            &jobs,
            4,
            |job, _| {
                if job.file_name() == "05.png" {
                    Err(DepixelError::malformed("broken"))
                } else {
                    Ok(ok_result(job))
                }
            },
            |_| {},
        )
        .unwrap();

        assert_eq!(report.outcomes.len(), 12);
        for (outcome, job) in report.outcomes.iter().zip(&jobs) {
            assert_eq!(&outcome.job, job);
        }
        assert_eq!(report.successful().count(), 11);
        assert_eq!(report.failed().count(), 1);
        assert!(!report.all_succeeded());
        assert_eq!(
            report.failures_by_kind().get(&FailureKind::MalformedDocument),
            Some(&1)
        );
    }

    #[test]
    fn test_worker_count_bounds_concurrency() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        process_jobs_parallel(
            &jobs(16),
            2,
            |job, _| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(15));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(ok_result(job))
            },
            |_| {},
        )
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_events_per_job() {
        let started = AtomicUsize::new(0);
        let stages = AtomicUsize::new(0);
        let finished = Mutex::new(Vec::new());

        process_jobs_parallel(
            &jobs(3),
            3,
            |job, on_stage| {
                on_stage(Stage::Loading);
                on_stage(Stage::Vectorizing);
                Ok(ok_result(job))
            },
            |event| match event {
                JobEvent::Started { worker, .. } => {
                    assert!(worker < 3);
                    started.fetch_add(1, Ordering::SeqCst);
                }
                JobEvent::Stage { .. } => {
                    stages.fetch_add(1, Ordering::SeqCst);
                }
                JobEvent::Finished {
                    completed, total, ..
                } => finished.lock().unwrap().push((completed, total)),
            },
        )
        .unwrap();

        assert_eq!(started.load(Ordering::SeqCst), 3);
        assert_eq!(stages.load(Ordering::SeqCst), 6);
        let mut finished = finished.into_inner().unwrap();
        finished.sort();
        assert_eq!(finished, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_worker_index_spans_the_pool_not_the_jobs() {
        // A single job may land on any pool thread, so consumers must size
        // per-worker state by the pool
        let workers = 4;
        for _ in 0..8 {
            let seen = Mutex::new(Vec::new());
            process_jobs_parallel(
                &jobs(1),
                workers,
                |job, _| Ok(ok_result(job)),
                |event| {
                    if let JobEvent::Started { worker, .. } = event {
                        seen.lock().unwrap().push(worker);
                    }
                },
            )
            .unwrap();
            let seen = seen.into_inner().unwrap();
            assert_eq!(seen.len(), 1);
            assert!(seen[0] < workers);
        }
    }

    #[test]
    fn test_empty_batch() {
        let report = process_jobs_parallel(&[], 4, |job, _| Ok(ok_result(job)), |_| {}).unwrap();
        assert!(report.outcomes.is_empty());
        assert!(report.all_succeeded());
    }

    #[test]
    fn test_calculate_final_stats() {
        let jobs = jobs(3);
        let outcomes = vec![
            JobOutcome {
                job: jobs[0].clone(),
                result: Ok(ok_result(&jobs[0])),
            },
            JobOutcome {
                job: jobs[1].clone(),
                result: Err(DepixelError::render("boom")),
            },
            JobOutcome {
                job: jobs[2].clone(),
                result: Ok(ok_result(&jobs[2])),
            },
        ];

        let stats = calculate_final_stats(&outcomes, Duration::from_secs(10));

        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.shapes_kept, 4);
        assert_eq!(stats.shapes_removed, 2);
        assert!((stats.success_rate() - 66.67).abs() < 0.1);
    }
}
