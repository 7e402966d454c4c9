//! Ordered task dispatch
//!
//! The [`Dispatcher`] decouples public API calls from core readiness. Before
//! initialization every task is buffered in a bounded queue; once the core is
//! ready the buffer is replayed in order and the dispatcher becomes a
//! pass-through to a single worker task.
//!
//! ## Flow
//!
//! ```text
//! launch() ──→ pre-init VecDeque ──(flush)──→ mpsc channel ──→ worker ──→ TaskHandler
//!                                                  ▲
//! launch() (after flush) ──────────────────────────┘
//! ```
//!
//! Buffering and the switch to pass-through happen under one lock, so a
//! launch racing the flush lands either before the replayed tasks or after
//! them, never in between.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// ============================================================================
// TaskHandler
// ============================================================================

/// Executes dispatched tasks, one at a time, in submission order
#[async_trait::async_trait]
pub trait TaskHandler<T>: Send + Sync + 'static {
    async fn handle(&self, task: T);
}

enum Command<T> {
    Run(T),
    /// Answered once every earlier command has been handled
    Barrier(oneshot::Sender<()>),
}

struct Inner<T> {
    /// True until `flush_queued_initial_tasks`
    queueing: bool,
    preinit: VecDeque<T>,
    /// Tasks dropped because the pre-init queue was full
    overflowed: u32,
    sender: Option<mpsc::UnboundedSender<Command<T>>>,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Single-worker ordered task queue with a pre-init buffer
pub struct Dispatcher<T> {
    inner: Mutex<Inner<T>>,
    max_queue_size: usize,
    worker: Mutex<Option<JoinHandle<()>>>,
    cancel: Mutex<CancellationToken>,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Creates a dispatcher in queueing mode
    ///
    /// # Arguments
    /// * `max_queue_size` - Bound of the pre-init buffer; the oldest task is
    ///   dropped when it is exceeded
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queueing: true,
                preinit: VecDeque::new(),
                overflowed: 0,
                sender: None,
            }),
            max_queue_size: max_queue_size.max(1),
            worker: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Submits a task; never blocks and never runs the task inline
    ///
    /// While queueing, the task is buffered. After the flush it goes straight
    /// to the worker. After shutdown it is dropped.
    pub fn launch(&self, task: T) {
        let mut inner = self.lock_inner();

        if inner.queueing {
            if inner.preinit.len() >= self.max_queue_size {
                inner.preinit.pop_front();
                inner.overflowed = inner.overflowed.saturating_add(1);
                debug!(
                    max = self.max_queue_size,
                    "Pre-init queue full, dropped oldest task"
                );
            }
            inner.preinit.push_back(task);
            return;
        }

        match &inner.sender {
            Some(tx) => {
                if tx.send(Command::Run(task)).is_err() {
                    debug!("Dispatcher worker has stopped, task dropped");
                }
            }
            None => debug!("Dispatcher is shut down, task dropped"),
        }
    }

    /// Whether tasks are still being buffered
    pub fn is_queueing(&self) -> bool {
        self.lock_inner().queueing
    }

    /// Number of buffered pre-init tasks
    pub fn queued_len(&self) -> usize {
        self.lock_inner().preinit.len()
    }

    /// Spawns the worker that feeds tasks to `handler`
    ///
    /// Buffered tasks stay buffered until [`flush_queued_initial_tasks`].
    ///
    /// [`flush_queued_initial_tasks`]: Dispatcher::flush_queued_initial_tasks
    pub fn start<H>(&self, handler: Arc<H>)
    where
        H: TaskHandler<T>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command<T>>();
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Dispatcher worker cancelled");
                        break;
                    }
                    command = rx.recv() => match command {
                        Some(Command::Run(task)) => handler.handle(task).await,
                        Some(Command::Barrier(done)) => {
                            let _ = done.send(());
                        }
                        None => break,
                    },
                }
            }
            debug!("Dispatcher worker stopped");
        });

        self.lock_inner().sender = Some(tx);
        if let Some(previous) = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle)
        {
            warn!("Dispatcher started twice, detaching the previous worker");
            previous.abort();
        }
    }

    /// Replays buffered tasks in FIFO order and switches to pass-through
    ///
    /// Returns the number of tasks dropped by the pre-init bound. Does nothing
    /// when the worker has not been started.
    pub fn flush_queued_initial_tasks(&self) -> u32 {
        let mut inner = self.lock_inner();
        if !inner.queueing {
            return 0;
        }
        let Some(tx) = inner.sender.clone() else {
            warn!("Flush requested before the dispatcher worker was started");
            return 0;
        };

        let replayed = inner.preinit.len();
        for task in inner.preinit.drain(..) {
            let _ = tx.send(Command::Run(task));
        }
        inner.queueing = false;
        let overflowed = std::mem::take(&mut inner.overflowed);

        debug!(replayed, overflowed, "Flushed pre-init tasks");
        overflowed
    }

    /// Waits until every task launched so far has been handled
    ///
    /// Returns immediately while queueing or after shutdown.
    pub async fn block_on_queue(&self) {
        let done = {
            let inner = self.lock_inner();
            if inner.queueing {
                return;
            }
            let Some(tx) = &inner.sender else {
                return;
            };
            let (done_tx, done_rx) = oneshot::channel();
            if tx.send(Command::Barrier(done_tx)).is_err() {
                return;
            }
            done_rx
        };
        let _ = done.await;
    }

    /// Stops accepting tasks, lets the worker drain the queue, and waits for it
    pub async fn shutdown(&self) {
        {
            let mut inner = self.lock_inner();
            inner.queueing = false;
            inner.sender = None;
        }
        self.join_worker().await;
    }

    /// Discards every queued task and returns to queueing mode
    ///
    /// A task already being handled runs to completion.
    pub async fn reset(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
        {
            let mut inner = self.lock_inner();
            inner.sender = None;
            inner.preinit.clear();
            inner.overflowed = 0;
            inner.queueing = true;
        }
        self.join_worker().await;
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = CancellationToken::new();
    }

    async fn join_worker(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Dispatcher worker ended abnormally");
            }
        }
    }
}
