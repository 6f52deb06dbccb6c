use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};

use crate::detection::domain::face_detector::{DetectorFactory, FaceDetector};
use crate::pipeline::detect_stage::{detect_frame, DetectedFrame};
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_report::PipelineReport;
use crate::pipeline::result_sink::ResultSink;
use crate::pipeline::tracking_stage::TrackingStage;
use crate::shared::frame::Frame;
use crate::shared::settings::FrameDropPolicy;
use crate::tracking::domain::tracker::Tracker;
use crate::video::domain::frame_source::{FrameSource, SourceError};

/// How often blocked threads wake up to look at the stop signal.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

enum Message {
    Detected { ticket: u64, detected: DetectedFrame },
    Dropped { sequence: u64 },
    SourceFailed(String),
    DetectorPanicked,
}

/// Caller cancellation plus an internal halt raised when the main thread
/// gives up on the run.
#[derive(Clone)]
struct StopSignal {
    cancelled: Arc<AtomicBool>,
    halted: Arc<AtomicBool>,
}

impl StopSignal {
    fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            halted: Arc::new(AtomicBool::new(false)),
        }
    }

    fn is_set(&self) -> bool {
        self.is_cancelled() || self.halted.load(Ordering::Relaxed)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::Relaxed);
    }
}

enum Take {
    Job { ticket: u64, frame: Frame },
    Idle,
    Closed,
}

/// The worker side of the job queue.
///
/// Taking a frame and numbering it happen under one lock, so tickets follow
/// queue order whichever worker wins. A worker never takes a ticket more
/// than `window` ahead of the next one the main thread needs, which bounds
/// the reorder buffer.
#[derive(Clone)]
struct TicketedQueue {
    jobs: Receiver<Frame>,
    next_ticket: Arc<Mutex<u64>>,
    released: Arc<AtomicU64>,
    window: u64,
}

impl TicketedQueue {
    fn new(jobs: Receiver<Frame>, window: u64) -> Self {
        Self {
            jobs,
            next_ticket: Arc::new(Mutex::new(0)),
            released: Arc::new(AtomicU64::new(0)),
            window,
        }
    }

    fn take(&self, timeout: Duration) -> Take {
        let mut next = self
            .next_ticket
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *next >= self.released.load(Ordering::Acquire) + self.window {
            drop(next);
            std::thread::sleep(timeout);
            return Take::Idle;
        }
        match self.jobs.recv_timeout(timeout) {
            Ok(frame) => {
                let ticket = *next;
                *next += 1;
                Take::Job { ticket, frame }
            }
            Err(RecvTimeoutError::Timeout) => Take::Idle,
            Err(RecvTimeoutError::Disconnected) => Take::Closed,
        }
    }

    /// Called by the main thread once `ticket` has been handed to the
    /// tracking stage.
    fn release(&self, ticket: u64) {
        self.released.store(ticket + 1, Ordering::Release);
    }
}

/// Executes the tracking pipeline with a reader thread and a detector pool.
///
/// Layout: `reader → [job queue] → detectors (N) → main [reorder/filter/track] → sink`
///
/// A worker stamps every frame it takes with a contiguous dispatch ticket.
/// Workers finish in any order; the main thread buffers results until the
/// next ticket is available, so the tracker and the sink always see frames
/// in sequence order. The job queue is bounded by `queue_capacity`, and what
/// happens when it is full is decided by `frame_drop_policy`. Dropped frames
/// never get a ticket.
#[derive(Default)]
pub struct ThreadedPipelineExecutor;

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn execute(
        &self,
        mut source: Box<dyn FrameSource>,
        detectors: &dyn DetectorFactory,
        tracker: &mut Tracker,
        sink: &mut dyn ResultSink,
        config: &PipelineConfig,
        logger: &mut dyn PipelineLogger,
    ) -> Result<PipelineReport, PipelineError> {
        let worker_count = config.worker_pool_size.max(1);
        let capacity = config.queue_capacity.max(1);

        let pool = match (0..worker_count)
            .map(|_| detectors.create())
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(pool) => pool,
            Err(e) => {
                source.close();
                return Err(PipelineError::Detector(e.to_string()));
            }
        };

        let total = source.metadata().total_frames;
        let stop = StopSignal::new(config.cancelled.clone());
        let (job_tx, job_rx) = crossbeam_channel::bounded::<Frame>(capacity);
        let (result_tx, result_rx) =
            crossbeam_channel::bounded::<Message>(capacity + worker_count);
        let queue = TicketedQueue::new(job_rx.clone(), (capacity + worker_count) as u64);

        let worker_handles = spawn_workers(pool, &queue, &result_tx, &stop);
        let reader_handle = spawn_reader(
            source,
            job_tx,
            job_rx.clone(),
            result_tx,
            config.frame_drop_policy,
            stop.clone(),
        );

        let mut stage = TrackingStage::new(&config.filter, tracker, sink, total);
        let outcome = run_main_loop(result_rx, &queue, &job_rx, &mut stage, logger, &stop);
        stop.halt();
        drop(job_rx);

        let joined = join_threads(reader_handle, worker_handles);
        match outcome.and(joined) {
            Ok(frames_read) => {
                stage.report_mut().frames_read = frames_read;
                stage.finish()
            }
            Err(e) => {
                stage.abort();
                Err(e)
            }
        }
    }
}

fn spawn_reader(
    mut source: Box<dyn FrameSource>,
    job_tx: Sender<Frame>,
    job_rx: Receiver<Frame>,
    result_tx: Sender<Message>,
    policy: FrameDropPolicy,
    stop: StopSignal,
) -> JoinHandle<u64> {
    std::thread::spawn(move || {
        let mut read: u64 = 0;
        while !stop.is_set() {
            let frame = match source.poll_frame(POLL_INTERVAL) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(SourceError::Exhausted) => break,
                Err(SourceError::Unavailable(reason)) => {
                    log::warn!("Frame source unavailable after {read} frames: {reason}");
                    let _ = result_tx.send(Message::SourceFailed(reason));
                    break;
                }
            };
            read += 1;
            if !dispatch(frame, &job_tx, &job_rx, &result_tx, policy, &stop) {
                break;
            }
        }
        source.close();
        read
    })
}

/// Puts one frame on the queue according to the drop policy. Returns
/// `false` when the pipeline is shutting down.
fn dispatch(
    frame: Frame,
    job_tx: &Sender<Frame>,
    job_rx: &Receiver<Frame>,
    result_tx: &Sender<Message>,
    policy: FrameDropPolicy,
    stop: &StopSignal,
) -> bool {
    let mut frame = frame;
    match policy {
        FrameDropPolicy::Block => loop {
            match job_tx.send_timeout(frame, POLL_INTERVAL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) => {
                    if stop.is_set() {
                        return false;
                    }
                    frame = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        },
        FrameDropPolicy::DropNewest => match job_tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(rejected)) => notify_dropped(result_tx, &rejected),
            Err(TrySendError::Disconnected(_)) => false,
        },
        FrameDropPolicy::DropOldest => loop {
            match job_tx.try_send(frame) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    frame = back;
                    // A worker may win the race for the oldest frame; then
                    // the retry finds room.
                    if let Ok(evicted) = job_rx.try_recv() {
                        if !notify_dropped(result_tx, &evicted) {
                            return false;
                        }
                    }
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        },
    }
}

fn notify_dropped(result_tx: &Sender<Message>, frame: &Frame) -> bool {
    result_tx
        .send(Message::Dropped {
            sequence: frame.sequence(),
        })
        .is_ok()
}

fn spawn_workers(
    pool: Vec<Box<dyn FaceDetector>>,
    queue: &TicketedQueue,
    result_tx: &Sender<Message>,
    stop: &StopSignal,
) -> Vec<JoinHandle<()>> {
    pool.into_iter()
        .map(|mut detector| {
            let queue = queue.clone();
            let result_tx = result_tx.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                while !stop.is_set() {
                    let (ticket, frame) = match queue.take(POLL_INTERVAL) {
                        Take::Job { ticket, frame } => (ticket, frame),
                        Take::Idle => continue,
                        Take::Closed => break,
                    };
                    let sequence = frame.sequence();
                    let detected = panic::catch_unwind(AssertUnwindSafe(|| {
                        detect_frame(detector.as_mut(), frame)
                    }));
                    let message = match detected {
                        Ok(detected) => Message::Detected { ticket, detected },
                        Err(_) => {
                            log::error!("Detector panicked on frame {sequence}");
                            let _ = result_tx.send(Message::DetectorPanicked);
                            break;
                        }
                    };
                    if result_tx.send(message).is_err() {
                        break;
                    }
                }
            })
        })
        .collect()
}

/// Receives detected frames in completion order and feeds them to the
/// tracking stage in ticket order.
fn run_main_loop(
    result_rx: Receiver<Message>,
    queue: &TicketedQueue,
    waiting_jobs: &Receiver<Frame>,
    stage: &mut TrackingStage<'_>,
    logger: &mut dyn PipelineLogger,
    stop: &StopSignal,
) -> Result<(), PipelineError> {
    let mut pending: BTreeMap<u64, DetectedFrame> = BTreeMap::new();
    let mut next_ticket: u64 = 0;
    let mut source_failure: Option<String> = None;

    loop {
        if stop.is_cancelled() {
            stage.report_mut().cancelled = true;
            return Ok(());
        }
        let message = match result_rx.recv_timeout(POLL_INTERVAL) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        match message {
            Message::Detected { ticket, detected } => {
                pending.insert(ticket, detected);
                logger.metric("reorder_backlog", pending.len() as f64);
            }
            Message::Dropped { sequence } => {
                stage.record_dropped(sequence, logger);
                continue;
            }
            Message::SourceFailed(reason) => {
                source_failure = Some(reason);
                continue;
            }
            Message::DetectorPanicked => return Err(PipelineError::WorkerPanicked("detector")),
        }

        while let Some(detected) = pending.remove(&next_ticket) {
            if stop.is_cancelled() {
                stage.report_mut().cancelled = true;
                return Ok(());
            }
            queue.release(next_ticket);
            next_ticket += 1;
            logger.metric("queue_depth", waiting_jobs.len() as f64);
            stage.process(detected, logger)?;
        }
    }

    if !pending.is_empty() {
        log::warn!(
            "{} detected frames never became contiguous at ticket {next_ticket}",
            pending.len()
        );
    }
    match source_failure {
        Some(reason) => Err(PipelineError::SourceUnavailable(reason)),
        None => Ok(()),
    }
}

/// Joins all pipeline threads. Returns how many frames the reader pulled.
fn join_threads(
    reader_handle: JoinHandle<u64>,
    worker_handles: Vec<JoinHandle<()>>,
) -> Result<u64, PipelineError> {
    let mut first_error = None;

    let frames_read = match reader_handle.join() {
        Ok(n) => n,
        Err(_) => {
            first_error = Some(PipelineError::WorkerPanicked("reader"));
            0
        }
    };

    for handle in worker_handles {
        if handle.join().is_err() && first_error.is_none() {
            first_error = Some(PipelineError::WorkerPanicked("detector"));
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(frames_read),
    }
}
