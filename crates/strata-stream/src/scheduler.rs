//! Batched data-parallel job execution behind one interface.
//!
//! A [`Scheduler`] runs a [`Kernel`] over a batch of inputs. `schedule`
//! returns immediately, `poll` reports completion without blocking, and
//! `complete` joins the batch and hands back every `(input, output)` pair in
//! submission order. A scheduler holds at most one batch at a time.
//!
//! Two implementations exist: [`SyncScheduler`] runs the batch inline on the
//! calling thread, [`ThreadPoolScheduler`] fans jobs out to a shared
//! [`WorkerPool`] and collects them in per-index result slots.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use strata_config::{SchedulerKind, StreamingConfig};
use tracing::{debug, error};

use crate::error::SchedulerError;

/// A pure function applied to every input of a batch on worker threads.
pub trait Kernel: Send + Sync + 'static {
    /// Per-job input.
    type Input: Clone + Send + Sync + 'static;
    /// Per-job output.
    type Output: Send + Sync + 'static;

    /// Processes one input. Must not touch state outside its return value.
    fn run(&self, input: &Self::Input) -> Self::Output;
}

/// Single-batch, poll-based job scheduler.
pub trait Scheduler<K: Kernel> {
    /// Starts a batch.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Busy`] if a batch is already in flight, or
    /// [`SchedulerError::WorkerPoolClosed`] if jobs cannot be queued.
    fn schedule(&mut self, kernel: Arc<K>, inputs: Vec<K::Input>) -> Result<(), SchedulerError>;

    /// Whether the in-flight batch has finished. `true` when nothing is in flight.
    fn poll(&self) -> bool;

    /// Whether no batch is in flight.
    fn is_idle(&self) -> bool;

    /// Number of jobs in the in-flight batch.
    fn in_flight(&self) -> usize;

    /// Blocks until the batch finishes and returns its results in input order.
    /// Returns an empty list when nothing is in flight.
    fn complete(&mut self) -> Result<Vec<(K::Input, K::Output)>, SchedulerError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Creates the scheduler selected by configuration.
pub fn build_scheduler<K: Kernel>(kind: SchedulerKind, pool: &Arc<WorkerPool>) -> Box<dyn Scheduler<K>> {
    match kind {
        SchedulerKind::Synchronous => Box::new(SyncScheduler::new()),
        SchedulerKind::ThreadPool => Box::new(ThreadPoolScheduler::new(Arc::clone(pool))),
    }
}

// ---------------------------------------------------------------------------
// Synchronous
// ---------------------------------------------------------------------------

/// Runs each batch to completion inside `schedule`.
pub struct SyncScheduler<K: Kernel> {
    finished: Option<Vec<(K::Input, K::Output)>>,
}

impl<K: Kernel> SyncScheduler<K> {
    /// Creates an idle scheduler.
    pub fn new() -> Self {
        Self { finished: None }
    }
}

impl<K: Kernel> Default for SyncScheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Kernel> Scheduler<K> for SyncScheduler<K> {
    fn schedule(&mut self, kernel: Arc<K>, inputs: Vec<K::Input>) -> Result<(), SchedulerError> {
        if self.finished.is_some() {
            return Err(SchedulerError::Busy);
        }
        let results = inputs
            .into_iter()
            .map(|input| {
                let output = kernel.run(&input);
                (input, output)
            })
            .collect();
        self.finished = Some(results);
        Ok(())
    }

    fn poll(&self) -> bool {
        true
    }

    fn is_idle(&self) -> bool {
        self.finished.is_none()
    }

    fn in_flight(&self) -> usize {
        self.finished.as_ref().map_or(0, Vec::len)
    }

    fn complete(&mut self) -> Result<Vec<(K::Input, K::Output)>, SchedulerError> {
        Ok(self.finished.take().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "synchronous"
    }
}

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named worker threads pulling boxed jobs from a channel.
///
/// Shared by every [`ThreadPoolScheduler`]; dropping the last handle closes
/// the channel and joins the threads.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `threads` workers (at least one).
    pub fn new(threads: usize) -> Result<Self, SchedulerError> {
        let threads = threads.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let mut handles = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("strata-worker-{index}"))
                .spawn(move || worker_loop(receiver))
                .map_err(SchedulerError::WorkerSpawn)?;
            handles.push(handle);
        }
        debug!(threads, "worker pool started");

        Ok(Self {
            sender: Some(sender),
            handles,
        })
    }

    /// Pool sized from the streaming configuration and the machine's CPU count.
    pub fn for_config(config: &StreamingConfig) -> Result<Self, SchedulerError> {
        Self::new(config.effective_worker_threads(num_cpus::get()))
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.handles.len()
    }

    fn execute(&self, job: Job) -> Result<(), SchedulerError> {
        let sender = self.sender.as_ref().ok_or(SchedulerError::WorkerPoolClosed)?;
        sender.send(job).map_err(|_| SchedulerError::WorkerPoolClosed)
    }

    /// Closes the job channel and joins every worker. Queued jobs still run.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("worker job panicked; its result slot stays empty");
        }
    }
}

// ---------------------------------------------------------------------------
// Thread pool
// ---------------------------------------------------------------------------

/// Holds a job's handle on the batch's result slots. On drop, even by
/// panic, it releases the slots, decrements the batch counter, and wakes
/// `complete` after the last job.
struct JobGuard<T> {
    slots: Option<Arc<Vec<OnceLock<T>>>>,
    remaining: Arc<AtomicUsize>,
    done: Sender<()>,
}

impl<T> Drop for JobGuard<T> {
    fn drop(&mut self) {
        // The slots must be released before the counter can reach zero.
        self.slots.take();
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _ = self.done.try_send(());
        }
    }
}

struct InFlight<K: Kernel> {
    inputs: Arc<Vec<K::Input>>,
    slots: Arc<Vec<OnceLock<K::Output>>>,
    remaining: Arc<AtomicUsize>,
    done: Receiver<()>,
}

/// Runs one job per input on a shared [`WorkerPool`].
///
/// Every job writes only its own slot of a result vector pre-sized to the
/// batch, so kernels never contend on shared state.
pub struct ThreadPoolScheduler<K: Kernel> {
    pool: Arc<WorkerPool>,
    batch: Option<InFlight<K>>,
}

impl<K: Kernel> ThreadPoolScheduler<K> {
    /// Creates an idle scheduler on `pool`.
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool, batch: None }
    }
}

impl<K: Kernel> Scheduler<K> for ThreadPoolScheduler<K> {
    fn schedule(&mut self, kernel: Arc<K>, inputs: Vec<K::Input>) -> Result<(), SchedulerError> {
        if self.batch.is_some() {
            return Err(SchedulerError::Busy);
        }
        let len = inputs.len();
        let inputs = Arc::new(inputs);
        let slots: Arc<Vec<OnceLock<K::Output>>> =
            Arc::new((0..len).map(|_| OnceLock::new()).collect());
        let remaining = Arc::new(AtomicUsize::new(len));
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        for index in 0..len {
            let kernel = Arc::clone(&kernel);
            let inputs = Arc::clone(&inputs);
            let guard = JobGuard {
                slots: Some(Arc::clone(&slots)),
                remaining: Arc::clone(&remaining),
                done: done_tx.clone(),
            };
            self.pool.execute(Box::new(move || {
                let guard = guard;
                let output = kernel.run(&inputs[index]);
                if let Some(slots) = &guard.slots {
                    let _ = slots[index].set(output);
                }
            }))?;
        }

        self.batch = Some(InFlight {
            inputs,
            slots,
            remaining,
            done: done_rx,
        });
        Ok(())
    }

    fn poll(&self) -> bool {
        self.batch
            .as_ref()
            .is_none_or(|batch| batch.remaining.load(Ordering::Acquire) == 0)
    }

    fn is_idle(&self) -> bool {
        self.batch.is_none()
    }

    fn in_flight(&self) -> usize {
        self.batch.as_ref().map_or(0, |batch| batch.inputs.len())
    }

    fn complete(&mut self) -> Result<Vec<(K::Input, K::Output)>, SchedulerError> {
        let Some(batch) = self.batch.take() else {
            return Ok(Vec::new());
        };
        while batch.remaining.load(Ordering::Acquire) > 0 {
            if batch.done.recv().is_err() {
                break;
            }
        }

        let slots = Arc::try_unwrap(batch.slots).map_err(|_| SchedulerError::SlotsShared)?;
        let mut finished = Vec::with_capacity(batch.inputs.len());
        for (index, (input, slot)) in batch.inputs.iter().zip(slots).enumerate() {
            let Some(output) = slot.into_inner() else {
                error!(index, "job produced no output");
                return Err(SchedulerError::MissingOutput { index });
            };
            finished.push((input.clone(), output));
        }
        Ok(finished)
    }

    fn name(&self) -> &'static str {
        "thread-pool"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    struct Square;

    impl Kernel for Square {
        type Input = u32;
        type Output = u64;

        fn run(&self, input: &u32) -> u64 {
            u64::from(*input) * u64::from(*input)
        }
    }

    struct ThreadName;

    impl Kernel for ThreadName {
        type Input = usize;
        type Output = Option<String>;

        fn run(&self, _input: &usize) -> Option<String> {
            std::thread::current().name().map(str::to_string)
        }
    }

    struct PanicOnThree;

    impl Kernel for PanicOnThree {
        type Input = u32;
        type Output = u32;

        fn run(&self, input: &u32) -> u32 {
            assert_ne!(*input, 3, "kernel refuses three");
            *input
        }
    }

    /// Earlier inputs sleep longer, so jobs finish in reverse order.
    struct SlowFirst;

    impl Kernel for SlowFirst {
        type Input = u64;
        type Output = Box<[u64]>;

        fn run(&self, input: &u64) -> Box<[u64]> {
            std::thread::sleep(Duration::from_millis(10 * (4 - input)));
            vec![*input; *input as usize + 1].into_boxed_slice()
        }
    }

    fn pool(threads: usize) -> Arc<WorkerPool> {
        Arc::new(WorkerPool::new(threads).expect("spawn workers"))
    }

    fn wait_until_done<K: Kernel>(scheduler: &dyn Scheduler<K>) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !scheduler.poll() {
            assert!(Instant::now() < deadline, "batch did not finish in time");
            std::thread::yield_now();
        }
    }

    #[test]
    fn test_sync_scheduler_runs_inline() {
        let mut scheduler = SyncScheduler::new();
        assert!(scheduler.is_idle());
        scheduler.schedule(Arc::new(Square), vec![1, 2, 3]).expect("schedule");
        assert!(scheduler.poll());
        assert_eq!(scheduler.in_flight(), 3);
        let results = scheduler.complete().expect("complete");
        assert_eq!(results, vec![(1, 1), (2, 4), (3, 9)]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_second_batch_while_in_flight_is_busy() {
        let mut scheduler = SyncScheduler::new();
        scheduler.schedule(Arc::new(Square), vec![1]).expect("schedule");
        let err = scheduler.schedule(Arc::new(Square), vec![2]).unwrap_err();
        assert!(matches!(err, SchedulerError::Busy));

        let mut threaded = ThreadPoolScheduler::new(pool(1));
        threaded.schedule(Arc::new(Square), vec![1]).expect("schedule");
        let err = threaded.schedule(Arc::new(Square), vec![2]).unwrap_err();
        assert!(matches!(err, SchedulerError::Busy));
        threaded.complete().expect("complete");
    }

    #[test]
    fn test_thread_pool_preserves_input_order() {
        let mut scheduler = ThreadPoolScheduler::new(pool(4));
        let inputs: Vec<u32> = (0..200).collect();
        scheduler.schedule(Arc::new(Square), inputs.clone()).expect("schedule");
        wait_until_done::<Square>(&scheduler);
        let results = scheduler.complete().expect("complete");
        assert_eq!(results.len(), 200);
        for ((input, output), expected) in results.into_iter().zip(inputs) {
            assert_eq!(input, expected);
            assert_eq!(output, u64::from(expected) * u64::from(expected));
        }
        assert!(scheduler.poll(), "idle scheduler reports done");
    }

    #[test]
    fn test_out_of_order_jobs_land_in_their_own_slots() {
        let mut scheduler = ThreadPoolScheduler::new(pool(4));
        scheduler.schedule(Arc::new(SlowFirst), vec![0, 1, 2, 3]).expect("schedule");
        let results = scheduler.complete().expect("complete");
        let lengths: Vec<(u64, usize)> = results.iter().map(|(i, o)| (*i, o.len())).collect();
        assert_eq!(lengths, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
        assert!(results.iter().all(|(i, o)| o.iter().all(|v| v == i)));

        // The slots are released, so the next batch starts clean.
        scheduler.schedule(Arc::new(SlowFirst), vec![3]).expect("schedule");
        assert_eq!(scheduler.complete().expect("complete").len(), 1);
    }

    #[test]
    fn test_complete_blocks_until_finished() {
        let mut scheduler = ThreadPoolScheduler::new(pool(2));
        scheduler.schedule(Arc::new(Square), (0..50).collect()).expect("schedule");
        let results = scheduler.complete().expect("complete");
        assert_eq!(results.len(), 50);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_empty_batch_completes_immediately() {
        let mut scheduler = ThreadPoolScheduler::<Square>::new(pool(1));
        scheduler.schedule(Arc::new(Square), Vec::new()).expect("schedule");
        assert!(scheduler.poll());
        assert!(scheduler.complete().expect("complete").is_empty());
    }

    #[test]
    fn test_workers_are_named() {
        let mut scheduler = ThreadPoolScheduler::new(pool(2));
        scheduler.schedule(Arc::new(ThreadName), (0..8).collect()).expect("schedule");
        for (_, name) in scheduler.complete().expect("complete") {
            let name = name.expect("named thread");
            assert!(name.starts_with("strata-worker-"), "unexpected thread {name}");
        }
    }

    #[test]
    fn test_panicking_job_reports_missing_output() {
        let shared = pool(2);
        let mut scheduler = ThreadPoolScheduler::new(Arc::clone(&shared));
        scheduler.schedule(Arc::new(PanicOnThree), vec![1, 2, 3, 4]).expect("schedule");
        let err = scheduler.complete().unwrap_err();
        assert!(matches!(err, SchedulerError::MissingOutput { index: 2 }));

        // The pool survives the panic.
        scheduler.schedule(Arc::new(PanicOnThree), vec![5]).expect("schedule");
        assert_eq!(scheduler.complete().expect("complete"), vec![(5, 5)]);
        assert_eq!(shared.thread_count(), 2);
    }

    #[test]
    fn test_build_scheduler_selects_implementation() {
        let shared = pool(1);
        let sync = build_scheduler::<Square>(SchedulerKind::Synchronous, &shared);
        assert_eq!(sync.name(), "synchronous");
        let threaded = build_scheduler::<Square>(SchedulerKind::ThreadPool, &shared);
        assert_eq!(threaded.name(), "thread-pool");
    }
}
