//! Agent runtime: backend session lifecycle, heartbeat loop and event delivery.
//!
//! [`Agent::start`] spawns the lifecycle task on the current tokio runtime and
//! returns immediately. The task logs in, starts the [`EventManager`] and then
//! beats until [`Agent::graceful_stop`] cancels it, at which point it logs out.
//! Nothing here ever reports an error to the caller: startup failures end the
//! background task, every other failure is logged and absorbed.

mod session;
mod state;

pub use session::{Session, SessionDefaults, MAX_PERIOD};
pub use state::AgentState;

use crate::backend::api::{AppBeatRequest, AppLoginRequest};
use crate::backend::{BackendClient, SessionTransport};
use crate::config::{AgentConfig, BackendConfig};
use crate::error::{AgentError, BackendError};
use crate::events::{EventIntake, EventManager, EventRecord, RequestParts, RequestRecord};
use crate::metrics::{MetricsSource, MetricsStore};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

const MIN_HEARTBEAT: Duration = Duration::from_secs(1);

/// Builds the transport at the start of every lifecycle run.
pub type Connector =
    dyn Fn(&BackendConfig) -> Result<Arc<dyn SessionTransport>, BackendError> + Send + Sync;

/// State shared between the agent handle and its lifecycle task.
struct Shared {
    state: watch::Sender<AgentState>,
    intake: RwLock<Option<EventIntake>>,
    session: RwLock<Option<Session>>,
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct Agent {
    config: Arc<AgentConfig>,
    connector: Arc<Connector>,
    metrics: Arc<MetricsStore>,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl Agent {
    /// Agent talking to the HTTP backend described by `config.backend`.
    pub fn new(config: AgentConfig) -> Self {
        Self::with_connector(config, |backend: &BackendConfig| {
            Ok(Arc::new(BackendClient::new(backend)?) as Arc<dyn SessionTransport>)
        })
    }

    /// Agent using an already built transport.
    pub fn with_transport(config: AgentConfig, transport: Arc<dyn SessionTransport>) -> Self {
        Self::with_connector(config, move |_: &BackendConfig| Ok(Arc::clone(&transport)))
    }

    pub fn with_connector<F>(config: AgentConfig, connector: F) -> Self
    where
        F: Fn(&BackendConfig) -> Result<Arc<dyn SessionTransport>, BackendError>
            + Send
            + Sync
            + 'static,
    {
        let (state, _) = watch::channel(AgentState::Idle);
        Self {
            config: Arc::new(config),
            connector: Arc::new(connector),
            metrics: Arc::new(MetricsStore::new()),
            shared: Arc::new(Shared {
                state,
                intake: RwLock::new(None),
                session: RwLock::new(None),
            }),
            running: Mutex::new(None),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.config.disable
    }

    /// Launch the session lifecycle in the background. No-op when disabled or
    /// when a lifecycle task is still alive. Must be called within a tokio runtime.
    pub fn start(&self) {
        if self.config.disable {
            debug!("agent disabled, not starting");
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            error!("agent start requires a tokio runtime");
            return;
        };

        let mut running = lock(&self.running);
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            warn!("agent already started");
            return;
        }

        let cancel = CancellationToken::new();
        let lifecycle = Lifecycle {
            config: Arc::clone(&self.config),
            defaults: SessionDefaults::from(&self.config.defaults),
            connector: Arc::clone(&self.connector),
            metrics: Arc::clone(&self.metrics),
            shared: Arc::clone(&self.shared),
        };
        let task = runtime.spawn(
            lifecycle
                .run(cancel.clone())
                .instrument(info_span!("appsec_agent")),
        );
        *running = Some(Running { cancel, task });
    }

    /// Cancel the lifecycle task and wait until it has logged out and every
    /// sub-task has stopped. No-op when disabled or not started.
    pub async fn graceful_stop(&self) {
        if self.config.disable {
            return;
        }
        let running = lock(&self.running).take();
        let Some(Running { cancel, task }) = running else {
            debug!("agent not started, nothing to stop");
            return;
        };

        cancel.cancel();
        if let Err(e) = task.await {
            error!(error = %e, "agent task failed");
            self.shared.state.send_replace(AgentState::Stopped);
        }
    }

    /// Entry point for framework adapters building a record per request.
    pub fn new_request_record(&self, request: RequestParts) -> RequestRecord {
        RequestRecord::new(request)
    }

    /// Hand a record to the event manager without blocking. Returns `false` when
    /// the record was dropped: agent disabled, no running session or full queue.
    pub fn add_event(&self, record: impl Into<EventRecord>) -> bool {
        if self.config.disable {
            return false;
        }
        match read(&self.shared.intake).as_ref() {
            Some(intake) => intake.add(record.into()),
            None => {
                debug!("agent not running, dropping the event");
                false
            }
        }
    }

    pub fn state(&self) -> AgentState {
        *self.shared.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.shared.state.subscribe()
    }

    /// The active session, if logged in.
    pub fn session(&self) -> Option<Session> {
        read(&self.shared.session).clone()
    }

    /// Store whose observations are sent with each heartbeat.
    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            running.cancel.cancel();
        }
    }
}

/// Everything the background task needs, detached from the `Agent` handle.
struct Lifecycle {
    config: Arc<AgentConfig>,
    defaults: SessionDefaults,
    connector: Arc<Connector>,
    metrics: Arc<MetricsStore>,
    shared: Arc<Shared>,
}

impl Lifecycle {
    async fn run(self, cancel: CancellationToken) {
        match self.session(&cancel).await {
            Ok(()) => {
                self.set_state(AgentState::Stopped);
                info!("agent successfully stopped");
            }
            Err(e) if e.is_cancelled() => {
                self.set_state(AgentState::Stopped);
                info!("agent stopped before login completed");
            }
            Err(e) => {
                self.set_state(AgentState::FailedStartup);
                error!(error = %e, "agent stopped");
            }
        }
    }

    async fn session(&self, cancel: &CancellationToken) -> Result<(), AgentError> {
        self.set_state(AgentState::Initializing);
        let client = (self.connector)(&self.config.backend)?;
        let token = self
            .config
            .backend
            .token
            .as_deref()
            .ok_or(BackendError::MissingCredential("token"))?;
        let app_name = self.config.backend.app_name.as_deref().unwrap_or_default();

        let request = AppLoginRequest::from_host();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            response = client.login(&request, token, app_name) => response?,
        };

        let session = Session::from_login(response, &self.defaults);
        self.set_state(AgentState::LoggedIn);
        info!(
            heartbeat = ?session.heartbeat,
            batch_size = session.batch_size,
            max_staleness = ?session.max_staleness,
            "up and running"
        );

        let (manager, intake) = EventManager::new(
            session.rulespack_id.clone(),
            session.batch_size,
            session.max_staleness,
        );
        let events = tokio::spawn(
            manager
                .run(cancel.clone(), Arc::clone(&client), session.id.clone())
                .in_current_span(),
        );
        self.metrics.start();
        *write(&self.shared.intake) = Some(intake);
        *write(&self.shared.session) = Some(session.clone());
        self.set_state(AgentState::Running);

        self.heartbeat_loop(cancel, client.as_ref(), &session).await;

        self.set_state(AgentState::ShuttingDown);
        *write(&self.shared.intake) = None;
        // Already cancelled: this only waits out an in-flight batch send.
        if let Err(e) = events.await {
            error!(error = %e, "event manager failed");
        }
        match client.logout(&session.id).await {
            Ok(()) => debug!("successfully logged out"),
            Err(e) => error!(error = %e, "logout failed"),
        }
        *write(&self.shared.session) = None;
        Ok(())
    }

    /// Beat on every tick until cancelled. Failed beats are not retried before the next tick.
    async fn heartbeat_loop(
        &self,
        cancel: &CancellationToken,
        client: &dyn SessionTransport,
        session: &Session,
    ) {
        let period = session.heartbeat.max(MIN_HEARTBEAT);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    debug!("heartbeat");
                    let request = AppBeatRequest {
                        metrics: self.metrics.take_observations(),
                    };
                    if let Err(e) = client.heartbeat(&session.id, &request).await {
                        error!(error = %e, "heartbeat failed");
                    }
                }
            }
        }
    }

    fn set_state(&self, state: AgentState) {
        debug!(%state, "agent state");
        self.shared.state.send_replace(state);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
