//! Raster task graph runners.
//!
//! Tasks are grouped by `NamespaceToken` so the regular tile pipeline and
//! one-off on-demand raster can be scheduled and waited on independently.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

use compositor_protocol::{IntRect, ResourceId};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::tile_manager::TileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceToken(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterTask {
    pub tile: TileId,
    pub content_rect: IntRect,
    pub resource_id: ResourceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOutcome {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedRaster {
    pub task: RasterTask,
    pub outcome: RasterOutcome,
}

/// Paints a task's content rect into its resource. Called from worker threads.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, task: &RasterTask) -> RasterOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskGraphError {
    Disconnected,
    SpawnFailed { reason: String },
}

impl fmt::Display for TaskGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "raster workers are gone"),
            Self::SpawnFailed { reason } => write!(f, "failed to spawn raster worker: {reason}"),
        }
    }
}

impl std::error::Error for TaskGraphError {}

pub trait TaskGraphRunner {
    fn generate_namespace_token(&mut self) -> NamespaceToken;

    /// Queues `tasks` behind whatever `token` already has in flight.
    fn schedule(&mut self, token: NamespaceToken, tasks: Vec<RasterTask>) -> Result<(), TaskGraphError>;

    fn collect_completed(&mut self, token: NamespaceToken) -> Vec<CompletedRaster>;

    fn wait_for_tasks_to_finish_running(&mut self, token: NamespaceToken) -> Result<(), TaskGraphError>;
}

/// Runs tasks on the calling thread when results are collected.
pub struct SynchronousTaskGraphRunner {
    rasterizer: Arc<dyn Rasterizer>,
    next_token: u32,
    pending: HashMap<NamespaceToken, Vec<RasterTask>>,
    completed: HashMap<NamespaceToken, Vec<CompletedRaster>>,
}

impl SynchronousTaskGraphRunner {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            next_token: 1,
            pending: HashMap::new(),
            completed: HashMap::new(),
        }
    }

    pub fn pending_task_count(&self, token: NamespaceToken) -> usize {
        self.pending.get(&token).map_or(0, Vec::len)
    }

    fn run_until_idle(&mut self, token: NamespaceToken) {
        let Some(tasks) = self.pending.remove(&token) else {
            return;
        };
        let completed = self.completed.entry(token).or_default();
        for task in tasks {
            let outcome = self.rasterizer.rasterize(&task);
            completed.push(CompletedRaster { task, outcome });
        }
    }
}

impl TaskGraphRunner for SynchronousTaskGraphRunner {
    fn generate_namespace_token(&mut self) -> NamespaceToken {
        let token = NamespaceToken(self.next_token);
        self.next_token += 1;
        token
    }

    fn schedule(&mut self, token: NamespaceToken, tasks: Vec<RasterTask>) -> Result<(), TaskGraphError> {
        self.pending.entry(token).or_default().extend(tasks);
        Ok(())
    }

    fn collect_completed(&mut self, token: NamespaceToken) -> Vec<CompletedRaster> {
        self.run_until_idle(token);
        self.completed.remove(&token).unwrap_or_default()
    }

    fn wait_for_tasks_to_finish_running(&mut self, token: NamespaceToken) -> Result<(), TaskGraphError> {
        self.run_until_idle(token);
        Ok(())
    }
}

struct RasterJob {
    token: NamespaceToken,
    task: RasterTask,
}

const JOB_QUEUE_CAPACITY: usize = 1024;

/// Fixed pool of raster threads fed through crossbeam channels.
pub struct WorkerPoolTaskGraphRunner {
    job_sender: Option<Sender<RasterJob>>,
    result_receiver: Receiver<(NamespaceToken, CompletedRaster)>,
    workers: Vec<JoinHandle<()>>,
    next_token: u32,
    outstanding: HashMap<NamespaceToken, usize>,
    completed: HashMap<NamespaceToken, Vec<CompletedRaster>>,
}

impl WorkerPoolTaskGraphRunner {
    pub fn new(worker_count: usize, rasterizer: Arc<dyn Rasterizer>) -> Result<Self, TaskGraphError> {
        let (job_sender, job_receiver) = bounded::<RasterJob>(JOB_QUEUE_CAPACITY);
        let (result_sender, result_receiver) = unbounded();
        let mut workers = Vec::with_capacity(worker_count.max(1));
        for index in 0..worker_count.max(1) {
            let jobs = job_receiver.clone();
            let results = result_sender.clone();
            let rasterizer = Arc::clone(&rasterizer);
            let handle = std::thread::Builder::new()
                .name(format!("raster-worker-{index}"))
                .spawn(move || {
                    while let Ok(job) = jobs.recv() {
                        let outcome = rasterizer.rasterize(&job.task);
                        let completed = CompletedRaster {
                            task: job.task,
                            outcome,
                        };
                        if results.send((job.token, completed)).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|error| TaskGraphError::SpawnFailed {
                    reason: error.to_string(),
                })?;
            workers.push(handle);
        }
        log::debug!("[tiles] raster worker pool started: workers={}", workers.len());
        Ok(Self {
            job_sender: Some(job_sender),
            result_receiver,
            workers,
            next_token: 1,
            outstanding: HashMap::new(),
            completed: HashMap::new(),
        })
    }

    fn record_result(&mut self, token: NamespaceToken, completed: CompletedRaster) {
        if let Some(count) = self.outstanding.get_mut(&token) {
            *count = count.saturating_sub(1);
        }
        self.completed.entry(token).or_default().push(completed);
    }

    fn drain_results(&mut self) {
        while let Ok((token, completed)) = self.result_receiver.try_recv() {
            self.record_result(token, completed);
        }
    }
}

impl TaskGraphRunner for WorkerPoolTaskGraphRunner {
    fn generate_namespace_token(&mut self) -> NamespaceToken {
        let token = NamespaceToken(self.next_token);
        self.next_token += 1;
        token
    }

    fn schedule(&mut self, token: NamespaceToken, tasks: Vec<RasterTask>) -> Result<(), TaskGraphError> {
        let Some(sender) = self.job_sender.as_ref() else {
            return Err(TaskGraphError::Disconnected);
        };
        for task in tasks {
            sender
                .send(RasterJob { token, task })
                .map_err(|_| TaskGraphError::Disconnected)?;
            *self.outstanding.entry(token).or_insert(0) += 1;
        }
        Ok(())
    }

    fn collect_completed(&mut self, token: NamespaceToken) -> Vec<CompletedRaster> {
        self.drain_results();
        self.completed.remove(&token).unwrap_or_default()
    }

    fn wait_for_tasks_to_finish_running(&mut self, token: NamespaceToken) -> Result<(), TaskGraphError> {
        while self.outstanding.get(&token).copied().unwrap_or(0) > 0 {
            let (finished_token, completed) = self
                .result_receiver
                .recv()
                .map_err(|_| TaskGraphError::Disconnected)?;
            self.record_result(finished_token, completed);
        }
        Ok(())
    }
}

impl Drop for WorkerPoolTaskGraphRunner {
    fn drop(&mut self) {
        self.job_sender = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("[tiles] raster worker panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use compositor_protocol::{IntPoint, IntRect, IntSize};

    use super::*;

    #[derive(Default)]
    struct CountingRasterizer {
        calls: AtomicUsize,
    }

    impl Rasterizer for CountingRasterizer {
        fn rasterize(&self, _task: &RasterTask) -> RasterOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            RasterOutcome::Completed
        }
    }

    fn task(i: i32) -> RasterTask {
        RasterTask {
            tile: TileId(i as u64),
            content_rect: IntRect::new(IntPoint::new(0, 0), IntSize::new(4, 4)),
            resource_id: ResourceId(i as u32 + 1),
        }
    }

    #[test]
    fn synchronous_runner_rasterizes_only_when_collected() {
        let rasterizer = Arc::new(CountingRasterizer::default());
        let mut runner = SynchronousTaskGraphRunner::new(rasterizer.clone());
        let token = runner.generate_namespace_token();

        runner.schedule(token, vec![task(0), task(1)]).expect("schedule");
        runner.schedule(token, vec![task(2)]).expect("schedule more");
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(runner.pending_task_count(token), 3);

        let completed = runner.collect_completed(token);
        assert_eq!(completed.len(), 3);
        assert!(completed.iter().all(|result| result.outcome == RasterOutcome::Completed));
        assert!(runner.collect_completed(token).is_empty());
    }

    #[test]
    fn namespaces_are_collected_independently() {
        let mut runner = SynchronousTaskGraphRunner::new(Arc::new(CountingRasterizer::default()));
        let tiles = runner.generate_namespace_token();
        let on_demand = runner.generate_namespace_token();

        runner.schedule(tiles, vec![task(0)]).expect("schedule tiles");
        runner.schedule(on_demand, vec![task(1)]).expect("schedule on demand");
        runner
            .wait_for_tasks_to_finish_running(on_demand)
            .expect("wait on demand");

        assert_eq!(runner.pending_task_count(tiles), 1);
        assert_eq!(runner.collect_completed(on_demand).len(), 1);
    }

    #[test]
    fn worker_pool_completes_every_task() {
        let rasterizer = Arc::new(CountingRasterizer::default());
        let mut runner = WorkerPoolTaskGraphRunner::new(2, rasterizer.clone()).expect("spawn workers");
        let token = runner.generate_namespace_token();

        runner
            .schedule(token, (0..8).map(task).collect())
            .expect("schedule");
        runner
            .wait_for_tasks_to_finish_running(token)
            .expect("wait for workers");

        let completed = runner.collect_completed(token);
        assert_eq!(completed.len(), 8);
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 8);
    }
}
