//! Debounced, strictly sequential execution of asynchronous actions.
//!
//! A burst of `push` calls inside the delay window collapses into a single
//! timer firing. Actions never overlap: each one runs to completion on the
//! queue's worker task before the next starts, and pushes that arrive while
//! an action is running are kept in arrival order and run right after it.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

pub type Action = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Receives every error returned (or panic raised) by a queued action.
pub type FailureHandler = Arc<dyn Fn(anyhow::Error) + Send + Sync>;

/// What happens to actions pushed while the debounce timer is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QueuePolicy {
    /// Only the most recent push of the window runs.
    #[default]
    LatestWins,
    /// Every push of the window runs, in push order.
    RunEvery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    /// Debounce timer armed.
    Waiting,
    /// Executing an action, possibly with a backlog.
    Running,
}

pub struct QueueOptions {
    pub delay: Duration,
    pub policy: QueuePolicy,
    pub on_failure: Option<FailureHandler>,
}

impl QueueOptions {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            policy: QueuePolicy::default(),
            on_failure: None,
        }
    }

    pub fn policy(mut self, policy: QueuePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn on_failure(mut self, handler: impl Fn(anyhow::Error) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(handler));
        self
    }
}

enum Command {
    Push(Action),
    Flush(oneshot::Sender<()>),
}

tokio::task_local! {
    static RUNNING_QUEUE: u64;
}

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a queue worker. Dropping the handle runs whatever is still
/// pending and then stops the worker.
pub struct DeferredActionQueue {
    id: u64,
    delay: Duration,
    tx: mpsc::UnboundedSender<Command>,
    state: Arc<Mutex<QueueState>>,
}

impl DeferredActionQueue {
    /// Spawn a queue with the default policy and a logging failure handler.
    /// Must be called from within a Tokio runtime.
    pub fn new(delay: Duration) -> Self {
        Self::spawn(QueueOptions::new(delay))
    }

    pub fn spawn(options: QueueOptions) -> Self {
        let id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(QueueState::Idle));

        let on_failure = options.on_failure.unwrap_or_else(|| {
            Arc::new(|err: anyhow::Error| log::error!("Queued action failed: {:#}", err))
        });

        let worker = Worker {
            id,
            delay: options.delay,
            policy: options.policy,
            on_failure,
            rx,
            window: VecDeque::new(),
            deadline: None,
            backlog: VecDeque::new(),
            waiters: Vec::new(),
            state: state.clone(),
        };
        tokio::spawn(worker.run());

        Self {
            id,
            delay: options.delay,
            tx,
            state,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> QueueState {
        *self.state.lock()
    }

    /// Schedule `action`, (re)starting the debounce timer. Pushes made while
    /// an action is running are queued behind it instead.
    pub fn push<F>(&self, action: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if self.tx.send(Command::Push(Box::pin(action))).is_err() {
            log::error!("Action queue {} is gone, dropping pushed action", self.id);
        }
    }

    /// Run every scheduled and queued action now and wait for all of them.
    ///
    /// Called from inside one of this queue's own actions it returns at once:
    /// the remaining work runs as soon as the calling action finishes.
    pub async fn wait_until_all_done(&self) {
        if RUNNING_QUEUE.try_with(|id| *id == self.id).unwrap_or(false) {
            log::debug!(
                "Flush of queue {} requested from one of its actions, not waiting",
                self.id
            );
            return;
        }

        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

struct Worker {
    id: u64,
    delay: Duration,
    policy: QueuePolicy,
    on_failure: FailureHandler,
    rx: mpsc::UnboundedReceiver<Command>,
    /// Actions pushed during the current debounce window.
    window: VecDeque<Action>,
    deadline: Option<Instant>,
    /// Actions pushed while another one was executing.
    backlog: VecDeque<Action>,
    waiters: Vec<oneshot::Sender<()>>,
    state: Arc<Mutex<QueueState>>,
}

enum Wake {
    Command(Option<Command>),
    Timer,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let wake = match self.deadline {
                Some(deadline) => tokio::select! {
                    command = self.rx.recv() => Wake::Command(command),
                    _ = sleep_until(deadline) => Wake::Timer,
                },
                None => Wake::Command(self.rx.recv().await),
            };

            match wake {
                Wake::Command(Some(Command::Push(action))) => self.schedule(action),
                Wake::Command(Some(Command::Flush(done))) => {
                    self.waiters.push(done);
                    self.drain_all().await;
                }
                Wake::Command(None) => {
                    self.drain_all().await;
                    log::debug!("Action queue {} stopped", self.id);
                    break;
                }
                Wake::Timer => self.fire().await,
            }
        }
    }

    fn schedule(&mut self, action: Action) {
        if self.policy == QueuePolicy::LatestWins && !self.window.is_empty() {
            log::debug!(
                "Queue {}: superseding {} scheduled action(s)",
                self.id,
                self.window.len()
            );
            self.window.clear();
        }
        self.window.push_back(action);
        self.deadline = Some(Instant::now() + self.delay);
        self.set_state(QueueState::Waiting);
    }

    async fn fire(&mut self) {
        // A push racing the timer restarts the window rather than missing it.
        while let Ok(command) = self.rx.try_recv() {
            match command {
                Command::Push(action) => self.schedule(action),
                Command::Flush(done) => self.waiters.push(done),
            }
        }

        let due = self
            .deadline
            .map(|deadline| deadline <= Instant::now())
            .unwrap_or(false);
        if !due && self.waiters.is_empty() {
            return;
        }

        self.drain_all().await;
    }

    /// Run the window, then the backlog, until nothing is left.
    async fn drain_all(&mut self) {
        self.deadline = None;
        let window = std::mem::take(&mut self.window);
        self.backlog.extend(window);

        while let Some(action) = self.backlog.pop_front() {
            self.execute(action).await;
        }

        self.set_state(QueueState::Idle);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    async fn execute(&mut self, action: Action) {
        self.set_state(QueueState::Running);

        // Spawned so a panicking action cannot take the worker down with it.
        let handle = tokio::spawn(RUNNING_QUEUE.scope(self.id, action));
        let outcome = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(anyhow::anyhow!("queued action panicked: {}", join_err)),
        };
        if let Err(err) = outcome {
            (self.on_failure)(err);
        }

        while let Ok(command) = self.rx.try_recv() {
            match command {
                Command::Push(action) => self.backlog.push_back(action),
                Command::Flush(done) => self.waiters.push(done),
            }
        }
    }

    fn set_state(&self, state: QueueState) {
        *self.state.lock() = state;
    }
}
