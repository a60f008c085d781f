/// Poll scheduler: one restartable request loop that pauses while the page is hidden
use crate::error::{NotesError, Result};
use crate::visibility::{Visibility, VisibilitySource, VisibilityState};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// One request the loop keeps repeating
#[async_trait]
pub trait PollTarget: Send + Sync + 'static {
    /// Issue the request; returns the server's `Poll-Interval` in milliseconds
    async fn request(&self) -> Result<Option<i64>>;

    /// Called after a failed request; the loop keeps running
    async fn request_failed(&self, error: &NotesError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay used when the server sends no interval, and after failures
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Never started
    Idle,
    Requesting,
    /// Waiting for the next request
    Scheduled,
    /// Server asked to stop polling; resumes on restart
    Halted,
    Stopped,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollCommand {
    MakeRequest,
    Stop,
    Restart,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Request,
    Scheduled(Instant),
    Halted,
    Stopped,
}

/// Delay before the next request, `None` when the server halts polling
pub fn next_delay(poll_interval: Option<i64>, fallback: Duration) -> Option<Duration> {
    match poll_interval {
        Some(ms) if ms > 0 => Some(Duration::from_millis(ms as u64)),
        Some(_) => None,
        None => Some(fallback),
    }
}

struct PollHandle {
    commands: mpsc::UnboundedSender<PollCommand>,
    task: JoinHandle<()>,
}

/// Owner of the poll loop. At most one loop runs per controller.
pub struct PollController {
    config: PollConfig,
    handle: Mutex<Option<PollHandle>>,
    state: Arc<watch::Sender<PollState>>,
}

impl PollController {
    pub fn new(config: PollConfig) -> Self {
        let (state, _) = watch::channel(PollState::Idle);
        Self {
            config,
            handle: Mutex::new(None),
            state: Arc::new(state),
        }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .map_or(false, |h| !h.task.is_finished())
    }

    /// Start polling `target`, following `visibility` for the loop's lifetime.
    ///
    /// On a hidden page the loop starts `Stopped` and a single request is
    /// spawned next to it. That request goes through `target` like any other,
    /// so its response is reduced into the store and advances the cursor.
    pub async fn start(
        &self,
        target: Arc<dyn PollTarget>,
        visibility: &dyn VisibilitySource,
    ) -> Result<()> {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().map_or(false, |h| !h.task.is_finished()) {
            return Err(NotesError::Poll("poll loop already running".to_string()));
        }

        let mut visibility_rx = visibility.subscribe();
        let initial = *visibility_rx.borrow_and_update();
        let phase = if initial.visibility.is_hidden() {
            // Hidden page: one request outside the loop, loop waits for visibility
            let target = target.clone();
            tokio::spawn(async move {
                if let Err(e) = target.request().await {
                    debug!("Background poll request failed: {}", e);
                }
            });
            Phase::Stopped
        } else {
            Phase::Request
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let poll_loop = PollLoop {
            target,
            config: self.config,
            commands: rx,
            visibility: visibility_rx,
            last_visibility: initial,
            visibility_open: true,
            active: !initial.visibility.is_hidden(),
            state: self.state.clone(),
        };
        let task = tokio::spawn(poll_loop.run(phase));
        info!("Polling started ({:?})", initial.visibility);

        *handle = Some(PollHandle { commands: tx, task });
        Ok(())
    }

    async fn send(&self, command: PollCommand) -> bool {
        match self.handle.lock().await.as_ref() {
            Some(h) => h.commands.send(command).is_ok(),
            None => false,
        }
    }

    /// Request right away; periodic scheduling is unaffected.
    /// Returns false when no loop is running.
    pub async fn make_request(&self) -> bool {
        self.send(PollCommand::MakeRequest).await
    }

    /// Stop scheduling. An in-flight request still completes.
    pub async fn stop(&self) -> bool {
        self.send(PollCommand::Stop).await
    }

    /// Cancel any pending delay, request immediately and resume scheduling
    pub async fn restart(&self) -> bool {
        self.send(PollCommand::Restart).await
    }

    /// End the loop and wait for it; the controller can be started again
    pub async fn shutdown(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(h) = handle {
            let _ = h.commands.send(PollCommand::Shutdown);
            if let Err(e) = h.task.await {
                warn!("Poll loop ended abnormally: {}", e);
            }
        }
        self.state.send_replace(PollState::Finished);
    }
}

impl Drop for PollController {
    fn drop(&mut self) {
        if let Some(h) = self.handle.get_mut().take() {
            h.task.abort();
        }
    }
}

struct PollLoop {
    target: Arc<dyn PollTarget>,
    config: PollConfig,
    commands: mpsc::UnboundedReceiver<PollCommand>,
    visibility: watch::Receiver<VisibilityState>,
    last_visibility: VisibilityState,
    visibility_open: bool,
    /// Whether requests schedule a follow-up
    active: bool,
    state: Arc<watch::Sender<PollState>>,
}

impl PollLoop {
    async fn run(mut self, mut phase: Phase) {
        loop {
            let next = match phase {
                Phase::Request => self.request().await,
                Phase::Scheduled(deadline) => {
                    self.state.send_replace(PollState::Scheduled);
                    self.wait(phase, Some(deadline)).await
                }
                Phase::Halted => {
                    self.state.send_replace(PollState::Halted);
                    self.wait(phase, None).await
                }
                Phase::Stopped => {
                    self.state.send_replace(PollState::Stopped);
                    self.wait(phase, None).await
                }
            };
            match next {
                Some(p) => phase = p,
                None => break,
            }
        }
        self.state.send_replace(PollState::Finished);
        debug!("Poll loop finished");
    }

    /// Run one request, then decide what follows it. `None` ends the loop.
    async fn request(&mut self) -> Option<Phase> {
        self.state.send_replace(PollState::Requesting);
        let delay = match self.target.request().await {
            Ok(interval) => next_delay(interval, self.config.interval),
            Err(e) => {
                warn!("Poll request failed: {}", e);
                self.target.request_failed(&e).await;
                Some(self.config.interval)
            }
        };

        let mut next = if !self.active {
            Phase::Stopped
        } else {
            match delay {
                Some(d) => Phase::Scheduled(Instant::now() + d),
                None => Phase::Halted,
            }
        };

        // Commands and visibility changes that arrived while the request was in flight
        while let Ok(command) = self.commands.try_recv() {
            next = self.apply(command)?;
        }
        if self.visibility_open {
            match self.visibility.has_changed() {
                Ok(true) => {
                    let v = *self.visibility.borrow_and_update();
                    next = self.on_visibility(v, next);
                }
                Ok(false) => {}
                Err(_) => self.visibility_open = false,
            }
        }
        Some(next)
    }

    async fn wait(&mut self, current: Phase, deadline: Option<Instant>) -> Option<Phase> {
        let timer = async {
            match deadline {
                Some(d) => sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = timer => Some(Phase::Request),
            command = self.commands.recv() => match command {
                Some(c) => self.apply(c),
                None => None,
            },
            changed = self.visibility.changed(), if self.visibility_open => match changed {
                Ok(()) => {
                    let v = *self.visibility.borrow_and_update();
                    Some(self.on_visibility(v, current))
                }
                Err(_) => {
                    debug!("Visibility source closed");
                    self.visibility_open = false;
                    Some(current)
                }
            },
        }
    }

    fn apply(&mut self, command: PollCommand) -> Option<Phase> {
        debug!("Poll command {:?}", command);
        match command {
            PollCommand::MakeRequest => Some(Phase::Request),
            PollCommand::Stop => {
                self.active = false;
                Some(Phase::Stopped)
            }
            PollCommand::Restart => {
                self.active = true;
                Some(Phase::Request)
            }
            PollCommand::Shutdown => None,
        }
    }

    /// React to the latest visibility. An unchanged transition count is a
    /// repeated notification; a changed count with the same value is a round
    /// trip (hidden then visible) and is handled like the final transition.
    fn on_visibility(&mut self, visibility: VisibilityState, current: Phase) -> Phase {
        if visibility.transitions == self.last_visibility.transitions {
            return current;
        }
        self.last_visibility = visibility;
        match visibility.visibility {
            Visibility::Hidden => {
                debug!("Page hidden, polling stopped");
                self.active = false;
                Phase::Stopped
            }
            Visibility::Visible => {
                debug!("Page visible, polling restarted");
                self.active = true;
                Phase::Request
            }
        }
    }
}
