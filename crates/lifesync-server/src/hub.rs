//! The session hub: single owner of all simulation state.
//!
//! [`SessionHub`] runs as one actor task. It owns the [`GridStore`], the
//! [`SimulationEngine`], the randomization RNG, and the set of connected
//! sessions. Everything that reads or mutates that state arrives as a
//! [`HubCommand`] on one mpsc channel, so commands from different clients
//! and ticks from the ticker are applied in a single total order, and
//! every session observes the resulting broadcasts in that same order.
//!
//! Delivery to a session never blocks the hub. Each session has a bounded
//! outbox fed with `try_send`; a session whose outbox is full or closed is
//! dropped. Pattern I/O is handed to a single worker that runs jobs one at
//! a time on the blocking pool, in the order the hub dispatched them, and
//! reports each outcome back through the command channel.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use lifesync_archive::{ArchiveError, PatternStore};
use lifesync_core::config::MIN_CLIENT_BUFFER;
use lifesync_core::control::TickControl;
use lifesync_core::ticker::{TickDelivery, TickSink};
use lifesync_core::{GridError, GridStore, SimulationEngine};
use lifesync_types::{
    ClientCommand, ErrorKind, ErrorPayload, Grid, Inbound, NamePayload, PatternSummary,
    ServerMessage, SessionId, SimulationStatus, decode_client_message,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::HubError;

/// Capacity of the hub's command channel.
const COMMAND_CAPACITY: usize = 1024;

/// Pattern jobs that may wait for the worker before saves and loads are
/// refused.
const PATTERN_QUEUE_CAPACITY: usize = 64;

/// Tunables for a [`SessionHub`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HubSettings {
    /// Frames each session may have queued before it is dropped. Values
    /// below [`MIN_CLIENT_BUFFER`] are raised to it.
    pub client_buffer: usize,
    /// Density used by `random` commands that do not carry one.
    pub random_density: f64,
    /// RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            client_buffer: 64,
            random_density: 0.5,
            seed: None,
        }
    }
}

/// Messages processed by the hub actor, in arrival order.
#[derive(Debug)]
pub enum HubCommand {
    /// Register a session and send it the current state.
    Connect {
        /// New session id.
        id: SessionId,
        /// Sending half of the session's outbox.
        outbox: mpsc::Sender<Utf8Bytes>,
    },
    /// Forget a session.
    Disconnect {
        /// Session to remove.
        id: SessionId,
    },
    /// A text frame received from a session.
    Client {
        /// Originating session.
        id: SessionId,
        /// Raw frame contents.
        text: Utf8Bytes,
    },
    /// Advance one generation if running.
    Tick,
    /// The tick interval was changed out of band.
    IntervalChanged,
    /// A save requested by `id` finished.
    PatternSaved {
        /// Requesting session.
        id: SessionId,
        /// Pattern name as requested.
        name: String,
        /// Outcome of the write.
        result: Result<PatternSummary, ArchiveError>,
    },
    /// A load requested by `id` finished.
    PatternLoaded {
        /// Requesting session.
        id: SessionId,
        /// Pattern name as requested.
        name: String,
        /// Outcome of the read.
        result: Result<Grid, ArchiveError>,
    },
    /// Close every session and stop the actor.
    Shutdown,
}

/// Latest hub state, published for readers outside the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubView {
    /// Current grid.
    pub grid: Grid,
    /// Current engine status.
    pub status: SimulationStatus,
    /// Connected sessions.
    pub sessions: usize,
}

/// Cloneable handle for sending commands to the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
    client_buffer: usize,
}

impl HubHandle {
    /// Register a new session.
    ///
    /// Returns the session id and the receiving half of its outbox. The
    /// first frame in the outbox is always the current `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn connect(&self) -> Result<(SessionId, mpsc::Receiver<Utf8Bytes>), HubError> {
        let id = SessionId::new();
        let (outbox, inbox) = mpsc::channel(self.client_buffer);
        self.send(HubCommand::Connect { id, outbox }).await?;
        Ok((id, inbox))
    }

    /// Forward a text frame from session `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn client_message(&self, id: SessionId, text: Utf8Bytes) -> Result<(), HubError> {
        self.send(HubCommand::Client { id, text }).await
    }

    /// Remove session `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn disconnect(&self, id: SessionId) -> Result<(), HubError> {
        self.send(HubCommand::Disconnect { id }).await
    }

    /// Tell the hub the tick interval changed so it can push a `status`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn interval_changed(&self) -> Result<(), HubError> {
        self.send(HubCommand::IntervalChanged).await
    }

    /// Ask the hub to close all sessions and exit.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has already stopped.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        self.send(HubCommand::Shutdown).await
    }

    /// A [`TickSink`] that feeds this hub.
    pub fn ticks(&self) -> HubTicks {
        HubTicks {
            tx: self.tx.clone(),
        }
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        match self.tx.send(command).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(_)) => Err(HubError::Closed),
        }
    }
}

/// Pattern store work, run by the worker in dispatch order.
#[derive(Debug)]
enum PatternJob {
    Save {
        id: SessionId,
        name: String,
        grid: Grid,
    },
    Load {
        id: SessionId,
        name: String,
    },
}

/// Tick sink that enqueues [`HubCommand::Tick`] without waiting.
#[derive(Debug, Clone)]
pub struct HubTicks {
    tx: mpsc::Sender<HubCommand>,
}

impl TickSink for HubTicks {
    fn deliver_tick(&mut self) -> TickDelivery {
        match self.tx.try_send(HubCommand::Tick) {
            Ok(()) => TickDelivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => TickDelivery::Skipped,
            Err(mpsc::error::TrySendError::Closed(_)) => TickDelivery::Closed,
        }
    }
}

/// The hub actor. Create with [`SessionHub::new`], then drive with
/// [`SessionHub::run`] (or use [`spawn_hub`]).
pub struct SessionHub {
    store: GridStore,
    engine: SimulationEngine,
    rng: StdRng,
    archive: Arc<dyn PatternStore>,
    control: Arc<TickControl>,
    settings: HubSettings,
    sessions: BTreeMap<SessionId, mpsc::Sender<Utf8Bytes>>,
    commands: mpsc::Receiver<HubCommand>,
    loopback: mpsc::WeakSender<HubCommand>,
    pattern_jobs: mpsc::Sender<PatternJob>,
    pattern_queue: Option<mpsc::Receiver<PatternJob>>,
    view: watch::Sender<HubView>,
}

impl SessionHub {
    /// Build a hub around an initial grid and engine.
    ///
    /// The engine's run state is mirrored into `control` immediately.
    pub fn new(
        store: GridStore,
        engine: SimulationEngine,
        archive: Arc<dyn PatternStore>,
        control: Arc<TickControl>,
        settings: HubSettings,
    ) -> (Self, HubHandle, watch::Receiver<HubView>) {
        let (tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (pattern_jobs, pattern_queue) = mpsc::channel(PATTERN_QUEUE_CAPACITY);
        let rng = settings
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        control.set_running(engine.is_running());

        let initial = HubView {
            grid: store.snapshot(),
            status: status_of(&store, &engine, &control),
            sessions: 0,
        };
        let (view, view_rx) = watch::channel(initial);

        let hub = Self {
            store,
            engine,
            rng,
            archive,
            control,
            settings,
            sessions: BTreeMap::new(),
            commands,
            loopback: tx.downgrade(),
            pattern_jobs,
            pattern_queue: Some(pattern_queue),
            view,
        };
        let handle = HubHandle {
            tx,
            client_buffer: settings.client_buffer.max(MIN_CLIENT_BUFFER),
        };
        (hub, handle, view_rx)
    }

    /// Process commands until [`HubCommand::Shutdown`] arrives or every
    /// [`HubHandle`] is dropped.
    ///
    /// Also starts the pattern worker, which exits once the hub is gone.
    pub async fn run(mut self) {
        if let Some(queue) = self.pattern_queue.take() {
            tokio::spawn(run_pattern_worker(
                Arc::clone(&self.archive),
                queue,
                self.loopback.clone(),
            ));
        }

        info!(
            rows = self.store.rows(),
            cols = self.store.cols(),
            boundary = ?self.engine.boundary(),
            "Session hub started"
        );

        while let Some(command) = self.commands.recv().await {
            if matches!(command, HubCommand::Shutdown) {
                break;
            }
            self.dispatch(command);
        }

        let closed = self.sessions.len();
        self.sessions.clear();
        self.control.set_running(false);
        self.publish();
        info!(
            generation = self.engine.generation(),
            sessions_closed = closed,
            "Session hub stopped"
        );
    }

    fn dispatch(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { id, outbox } => self.on_connect(id, outbox),
            HubCommand::Disconnect { id } => {
                if self.sessions.remove(&id).is_some() {
                    info!(session = %id, sessions = self.sessions.len(), "Session disconnected");
                    self.publish();
                }
            }
            HubCommand::Client { id, text } => self.on_client(id, &text),
            HubCommand::Tick => self.on_tick(),
            HubCommand::IntervalChanged => self.broadcast_status(),
            HubCommand::PatternSaved { id, name, result } => self.on_saved(id, name, result),
            HubCommand::PatternLoaded { id, name, result } => self.on_loaded(id, &name, result),
            // Handled by `run`.
            HubCommand::Shutdown => {}
        }
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    fn on_connect(&mut self, id: SessionId, outbox: mpsc::Sender<Utf8Bytes>) {
        let grid = encode(&ServerMessage::Grid(self.store.grid()));
        let status = encode(&ServerMessage::Status(self.status()));
        let (Some(grid), Some(status)) = (grid, status) else {
            return;
        };

        // Outboxes hold at least MIN_CLIENT_BUFFER frames, so both fit.
        for frame in [grid, status] {
            if let Err(e) = outbox.try_send(frame) {
                log_transport_failure(id, &e);
                return;
            }
        }

        self.sessions.insert(id, outbox);
        info!(session = %id, sessions = self.sessions.len(), "Session connected");
        self.publish();
    }

    fn on_client(&mut self, id: SessionId, text: &Utf8Bytes) {
        if !self.sessions.contains_key(&id) {
            trace!(session = %id, "Frame from dropped session ignored");
            return;
        }

        let command = match decode_client_message(text.as_str()) {
            Ok(Inbound::Command(command)) => command,
            Ok(Inbound::Unknown(kind)) => {
                debug!(session = %id, kind = %kind, "Ignoring unknown message type");
                return;
            }
            Err(e) => {
                debug!(session = %id, error = %e, "Rejecting malformed message");
                self.send_error(id, ErrorKind::MalformedMessage, e.to_string());
                return;
            }
        };

        debug!(session = %id, command = command.kind(), "Command received");
        match command {
            ClientCommand::Toggle(at) => match self.store.toggle(at.x, at.y) {
                Ok(_) => self.broadcast_grid(),
                Err(e) => self.send_grid_error(id, &e),
            },
            ClientCommand::Start => {
                if self.engine.start() {
                    info!(session = %id, "Simulation started");
                }
                self.control.set_running(true);
                self.broadcast_status();
            }
            ClientCommand::Stop => {
                if self.engine.stop() {
                    info!(session = %id, generation = self.engine.generation(), "Simulation stopped");
                }
                self.control.set_running(false);
                self.broadcast_status();
            }
            ClientCommand::Clear => {
                self.store.clear();
                self.broadcast_grid();
            }
            ClientCommand::Random(payload) => {
                let density = payload.density.unwrap_or(self.settings.random_density);
                match self.store.randomize(density, &mut self.rng) {
                    Ok(()) => self.broadcast_grid(),
                    Err(e) => self.send_grid_error(id, &e),
                }
            }
            ClientCommand::Save(NamePayload { name }) => self.start_save(id, name),
            ClientCommand::Load(NamePayload { name }) => self.start_load(id, name),
        }
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    fn on_tick(&mut self) {
        match self.engine.tick(&mut self.store) {
            Ok(Some(summary)) => {
                trace!(
                    generation = summary.generation,
                    population = summary.population,
                    changed = summary.changed,
                    "Generation computed"
                );
                self.broadcast_grid();
            }
            // Ticks queued before a stop are discarded.
            Ok(None) => {}
            Err(e) => error!(error = %e, "Step failed"),
        }
    }

    // -----------------------------------------------------------------------
    // Patterns
    // -----------------------------------------------------------------------

    fn start_save(&mut self, id: SessionId, name: String) {
        let grid = self.store.snapshot();
        self.queue_pattern_job(id, PatternJob::Save { id, name, grid });
    }

    fn start_load(&mut self, id: SessionId, name: String) {
        self.queue_pattern_job(id, PatternJob::Load { id, name });
    }

    fn queue_pattern_job(&mut self, id: SessionId, job: PatternJob) {
        match self.pattern_jobs.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session = %id, "Pattern queue full");
                self.send_error(id, ErrorKind::Storage, String::from("pattern store is busy"));
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(session = %id, "Pattern worker stopped");
                self.send_error(id, ErrorKind::Storage, String::from("pattern store is unavailable"));
            }
        }
    }

    fn on_saved(&mut self, id: SessionId, name: String, result: Result<PatternSummary, ArchiveError>) {
        match result {
            Ok(summary) => {
                info!(
                    session = %id,
                    pattern = %summary.name,
                    population = summary.population,
                    "Pattern saved"
                );
                if let Some(frame) = encode(&ServerMessage::Saved(NamePayload { name })) {
                    self.send_to(id, frame);
                }
            }
            Err(e) => {
                warn!(session = %id, pattern = %name, error = %e, "Pattern save failed");
                self.send_error(id, archive_error_kind(&e), e.to_string());
            }
        }
    }

    fn on_loaded(&mut self, id: SessionId, name: &str, result: Result<Grid, ArchiveError>) {
        let grid = match result {
            Ok(grid) => grid,
            Err(e) => {
                debug!(session = %id, pattern = name, error = %e, "Pattern load failed");
                self.send_error(id, archive_error_kind(&e), e.to_string());
                return;
            }
        };
        match self.store.set_grid(grid) {
            Ok(()) => {
                info!(session = %id, pattern = name, "Pattern loaded");
                self.broadcast_grid();
            }
            Err(e) => self.send_grid_error(id, &e),
        }
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    fn status(&self) -> SimulationStatus {
        status_of(&self.store, &self.engine, &self.control)
    }

    fn broadcast_grid(&mut self) {
        if let Some(frame) = encode(&ServerMessage::Grid(self.store.grid())) {
            self.broadcast(&frame);
        }
        self.publish();
    }

    fn broadcast_status(&mut self) {
        if let Some(frame) = encode(&ServerMessage::Status(self.status())) {
            self.broadcast(&frame);
        }
        self.publish();
    }

    /// Queue `frame` on every session; drop the ones that cannot take it.
    fn broadcast(&mut self, frame: &Utf8Bytes) {
        let mut failed = Vec::new();
        for (id, outbox) in &self.sessions {
            if let Err(e) = outbox.try_send(frame.clone()) {
                log_transport_failure(*id, &e);
                failed.push(*id);
            }
        }
        for id in failed {
            self.sessions.remove(&id);
        }
    }

    fn send_to(&mut self, id: SessionId, frame: Utf8Bytes) {
        let Some(outbox) = self.sessions.get(&id) else {
            return;
        };
        if let Err(e) = outbox.try_send(frame) {
            log_transport_failure(id, &e);
            self.sessions.remove(&id);
            self.publish();
        }
    }

    fn send_error(&mut self, id: SessionId, kind: ErrorKind, message: String) {
        if let Some(frame) = encode(&ServerMessage::Error(ErrorPayload { kind, message })) {
            self.send_to(id, frame);
        }
    }

    fn send_grid_error(&mut self, id: SessionId, e: &GridError) {
        let kind = match e {
            GridError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            GridError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            GridError::InvalidDensity(_) => ErrorKind::InvalidDensity,
        };
        debug!(session = %id, error = %e, "Command rejected");
        self.send_error(id, kind, e.to_string());
    }

    fn publish(&self) {
        let view = HubView {
            grid: self.store.snapshot(),
            status: self.status(),
            sessions: self.sessions.len(),
        };
        self.view.send_replace(view);
    }
}

/// Spawn a hub on the current runtime.
pub fn spawn_hub(
    store: GridStore,
    engine: SimulationEngine,
    archive: Arc<dyn PatternStore>,
    control: Arc<TickControl>,
    settings: HubSettings,
) -> (HubHandle, watch::Receiver<HubView>, JoinHandle<()>) {
    let (hub, handle, view) = SessionHub::new(store, engine, archive, control, settings);
    let task = tokio::spawn(hub.run());
    (handle, view, task)
}

fn status_of(store: &GridStore, engine: &SimulationEngine, control: &TickControl) -> SimulationStatus {
    SimulationStatus {
        running: engine.is_running(),
        generation: engine.generation(),
        population: u64::try_from(store.population()).unwrap_or(u64::MAX),
        tick_interval_ms: control.tick_interval_ms(),
    }
}

fn encode(message: &ServerMessage<'_>) -> Option<Utf8Bytes> {
    match message.encode() {
        Ok(json) => Some(Utf8Bytes::from(json)),
        Err(e) => {
            error!(error = %e, "Failed to serialize server message");
            None
        }
    }
}

const fn archive_error_kind(e: &ArchiveError) -> ErrorKind {
    match e {
        ArchiveError::InvalidName { .. } => ErrorKind::InvalidName,
        ArchiveError::NotFound(_) => ErrorKind::NotFound,
        ArchiveError::Io(_) | ArchiveError::Serialization(_) | ArchiveError::Corrupt { .. } => {
            ErrorKind::Storage
        }
    }
}

fn log_transport_failure<T>(id: SessionId, e: &mpsc::error::TrySendError<T>) {
    let reason = match e {
        mpsc::error::TrySendError::Full(_) => "outbox full",
        mpsc::error::TrySendError::Closed(_) => "outbox closed",
    };
    let failure = HubError::TransportFailure { id, reason };
    warn!(session = %id, error = %failure, "Dropping session");
}

/// Run pattern jobs one at a time, in the order the hub queued them.
///
/// Each result is delivered to the hub before the next job starts, so a
/// `load` queued after a `save` of the same name always sees that save.
async fn run_pattern_worker(
    archive: Arc<dyn PatternStore>,
    mut jobs: mpsc::Receiver<PatternJob>,
    loopback: mpsc::WeakSender<HubCommand>,
) {
    while let Some(job) = jobs.recv().await {
        let archive = Arc::clone(&archive);
        let command = match job {
            PatternJob::Save { id, name, grid } => {
                let job_name = name.clone();
                let result = run_blocking(move || archive.save(&job_name, &grid)).await;
                HubCommand::PatternSaved { id, name, result }
            }
            PatternJob::Load { id, name } => {
                let job_name = name.clone();
                let result = run_blocking(move || archive.load(&job_name)).await;
                HubCommand::PatternLoaded { id, name, result }
            }
        };
        report(&loopback, command).await;
    }
    debug!("Pattern worker stopped");
}

async fn run_blocking<T, F>(job: F) -> Result<T, ArchiveError>
where
    F: FnOnce() -> Result<T, ArchiveError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .unwrap_or_else(|e| Err(ArchiveError::Io(std::io::Error::other(e))))
}

async fn report(loopback: &mpsc::WeakSender<HubCommand>, command: HubCommand) {
    let Some(tx) = loopback.upgrade() else {
        return;
    };
    if tx.send(command).await.is_err() {
        debug!("Hub stopped before pattern result was delivered");
    }
}
