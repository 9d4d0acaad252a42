//! Acquisition session
//!
//! One owned instance ties the connection manager, the acquisition
//! controller, the frame scheduler and the render pipeline to a single
//! surface. Everything runs on one task: link events, the reconnect timer,
//! frame ticks and operator commands are processed strictly one at a time,
//! so no state is shared and nothing is locked.
//!
//! [`SessionHandle`] drives a spawned session from other tasks or threads.

use crate::acquisition::controller::{AcquisitionController, AcquisitionMode, Applied};
use crate::acquisition::scheduler::FrameScheduler;
use crate::config::SessionConfig;
use crate::events::{Notification, Notifier};
use crate::link::connection::{ConnectionManager, ConnectionState};
use crate::link::transport::{Connector, LinkEvent};
use crate::render::pipeline::{RenderPipeline, Surface};
use crate::stats::store::{Counters, DiagnosticsStore};
use crate::synth::SignalSynthesizer;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub connection: ConnectionState,
    pub mode: AcquisitionMode,
    /// Displayed status indicator
    pub indicator: ConnectionState,
    pub sampling_rate: u32,
    pub reconnect_attempts: u32,
    pub retries_exhausted: bool,
    /// Ticks since the frame loop last started
    pub ticks: u64,
    pub fps: f64,
    pub counters: Counters,
}

/// What woke the session loop
enum Wake {
    Command(Option<SessionCommand>),
    Link(LinkEvent),
    Reconnect,
    Tick,
}

/// Connection facts compared before and after each link operation
#[derive(Clone, Copy)]
struct LinkSnapshot {
    state: ConnectionState,
    exhausted: bool,
}

/// A single-surface acquisition session
pub struct AcquisitionSession<S: Surface> {
    connection: ConnectionManager,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    controller: AcquisitionController,
    scheduler: FrameScheduler,
    pipeline: RenderPipeline,
    surface: S,
    diagnostics: DiagnosticsStore,
    notifier: Notifier,
    simulate_status_led: bool,
}

impl<S: Surface> AcquisitionSession<S> {
    pub fn new(config: &SessionConfig, connector: Box<dyn Connector>, surface: S) -> Self {
        Self::with_synthesizer(config, connector, surface, SignalSynthesizer::new())
    }

    /// Build a session around a specific synthesizer (e.g. a seeded one)
    pub fn with_synthesizer(
        config: &SessionConfig,
        connector: Box<dyn Connector>,
        surface: S,
        synth: SignalSynthesizer,
    ) -> Self {
        let notifier = Notifier::new();
        let (events_tx, link_events) = mpsc::unbounded_channel();

        let connection = ConnectionManager::new(
            config.endpoint.clone(),
            config.reconnect_policy(),
            connector,
            events_tx,
            notifier.clone(),
        );
        let controller = AcquisitionController::new(config, synth, notifier.clone());
        let scheduler = FrameScheduler::new(config.frame_interval(), config.status_led_every);

        tracing::debug!(endpoint = %config.endpoint, "Acquisition session created");

        Self {
            connection,
            link_events,
            controller,
            scheduler,
            pipeline: RenderPipeline::new(),
            surface,
            diagnostics: DiagnosticsStore::new(),
            notifier,
            simulate_status_led: config.simulate_status_led,
        }
    }

    /// Operator connect. Once retries are exhausted this starts a fresh
    /// reconnect budget; otherwise it opens a link now (cancelling any pending
    /// reconnect) without touching the attempt count, or is a no-op.
    pub fn connect(&mut self) -> ConnectionState {
        let before = self.link_snapshot();
        if self.connection.is_exhausted() {
            self.diagnostics.log("Operator connect after exhausted retries");
            self.connection.restart();
        } else {
            self.connection.connect();
        }
        self.sync_link(before);
        self.connection.state()
    }

    /// Enter `mode` with a cleared buffer and a fresh frame loop.
    /// Starting `Idle` is the same as [`stop`](Self::stop).
    pub fn start(&mut self, mode: AcquisitionMode) {
        if mode == AcquisitionMode::Idle {
            self.stop();
            return;
        }

        self.controller.start(mode);
        self.scheduler.stop();
        self.scheduler.start();
        self.diagnostics.log(format!("Acquisition started: {}", mode));
    }

    /// Halt the frame loop, clear the buffer and present the grid-only view.
    ///
    /// Once this returns no further tick runs until the next `start`.
    pub fn stop(&mut self) {
        let was_running = self.scheduler.stop();
        let was_active = self.controller.mode() != AcquisitionMode::Idle;
        self.controller.stop();

        if was_running || was_active {
            let frame = self.pipeline.render_idle(self.surface.viewport());
            self.surface.present(frame);
            self.diagnostics.log("Acquisition stopped");
        }
    }

    /// Set the sampling-rate control; returns the applied value (Hz)
    pub fn set_sampling_rate(&mut self, hz: f64) -> u32 {
        self.controller.set_sampling_rate(hz)
    }

    /// Apply one transport event and any message it carries
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        let before = self.link_snapshot();
        let result = self.connection.handle_event(event);
        self.sync_link(before);

        match result {
            Ok(Some(message)) => match self.controller.apply(message) {
                Applied::Buffer | Applied::Indicator | Applied::SamplingRate => {
                    self.diagnostics.record_applied()
                }
                Applied::Discarded => self.diagnostics.record_discarded(),
                Applied::Ignored => tracing::debug!("Ignoring message of unknown type"),
            },
            Ok(None) => {}
            Err(e) => self.diagnostics.record_malformed(&e.to_string()),
        }
    }

    fn on_reconnect_due(&mut self) {
        let before = self.link_snapshot();
        self.connection.connect();
        self.sync_link(before);
    }

    /// One frame: refresh data and request live data, run the side activity,
    /// then render the buffer snapshot taken for this tick.
    fn on_tick(&mut self) {
        let Some(tick) = self.scheduler.begin_tick() else {
            return;
        };

        if self.controller.mode() == AcquisitionMode::Idle {
            self.scheduler.stop();
            return;
        }

        if let Some(request) = self.controller.refresh() {
            let sent = self.connection.send(request.kind, &request.payload).is_ok();
            self.diagnostics.record_request(sent);
        }

        if tick.side_activity && self.simulate_status_led {
            let indicator = self.controller.cycle_indicator();
            tracing::debug!(tick = tick.index, %indicator, "Status indicator cycled");
        }

        let buffer = self.controller.snapshot();
        let frame = self.pipeline.render(
            self.controller.mode(),
            buffer.as_deref(),
            self.surface.viewport(),
        );
        if !frame.has_data() {
            tracing::debug!(tick = tick.index, "Grid-only frame");
        }
        self.diagnostics
            .record_frame(frame.has_data(), tick.delta.as_secs_f64());
        self.surface.present(frame);

        self.scheduler.end_tick();
    }

    /// Wait for and process the next internal event (link, reconnect, tick)
    pub async fn step(&mut self) {
        let wake = self.next_wake(None).await;
        self.dispatch(wake);
    }

    /// Process operator commands and internal events until shut down.
    /// Returns the torn-down session.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> Self {
        tracing::info!("Acquisition session running");
        loop {
            let wake = self.next_wake(Some(&mut commands)).await;
            if !self.dispatch(wake) {
                break;
            }
        }
        tracing::info!("Acquisition session finished");
        self
    }

    async fn next_wake(&mut self, commands: Option<&mut mpsc::Receiver<SessionCommand>>) -> Wake {
        let command = async move {
            match commands {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            command = command => Wake::Command(command),
            Some(event) = self.link_events.recv() => Wake::Link(event),
            _ = self.connection.reconnect_due() => Wake::Reconnect,
            _ = self.scheduler.wait() => Wake::Tick,
        }
    }

    /// Returns false once the session should exit
    fn dispatch(&mut self, wake: Wake) -> bool {
        match wake {
            Wake::Link(event) => self.handle_link_event(event),
            Wake::Reconnect => self.on_reconnect_due(),
            Wake::Tick => self.on_tick(),
            Wake::Command(None) => {
                tracing::info!("All session handles dropped, shutting down");
                self.teardown();
                return false;
            }
            Wake::Command(Some(command)) => return self.execute(command),
        }
        true
    }

    fn execute(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Connect { reply } => {
                let _ = reply.send(self.connect());
            }
            SessionCommand::Start { mode, reply } => {
                self.start(mode);
                let _ = reply.send(());
            }
            SessionCommand::Stop { reply } => {
                self.stop();
                let _ = reply.send(());
            }
            SessionCommand::SetSamplingRate { hz, reply } => {
                let _ = reply.send(self.set_sampling_rate(hz));
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            SessionCommand::Shutdown { reply } => {
                self.teardown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// Stop all timers and close the link without scheduling a reconnect.
    /// Safe from any state.
    pub fn teardown(&mut self) {
        let before = self.link_snapshot();
        self.scheduler.stop();
        self.controller.stop();
        self.connection.teardown();
        self.sync_link(before);
        self.diagnostics.log("Session torn down");
    }

    fn link_snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            state: self.connection.state(),
            exhausted: self.connection.is_exhausted(),
        }
    }

    /// Mirror connection changes into the indicator and the diagnostics
    fn sync_link(&mut self, before: LinkSnapshot) {
        let state = self.connection.state();
        if state != before.state {
            self.controller.set_indicator(state);
            self.diagnostics.log(format!("Connection: {}", state));

            if state == ConnectionState::Disconnected {
                let delay_ms = self
                    .connection
                    .pending_reconnect()
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0);
                let attempt = if delay_ms > 0 {
                    self.connection.attempts()
                } else {
                    0
                };
                self.diagnostics.record_disconnection(attempt, delay_ms);
            }
        }

        let exhausted = self.connection.is_exhausted();
        if exhausted && !before.exhausted {
            self.diagnostics.record_exhausted(self.connection.attempts());
        } else if !exhausted && before.exhausted {
            self.diagnostics.clear_exhausted();
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            connection: self.connection.state(),
            mode: self.controller.mode(),
            indicator: self.controller.indicator(),
            sampling_rate: self.controller.sampling_rate(),
            reconnect_attempts: self.connection.attempts(),
            retries_exhausted: self.connection.is_exhausted(),
            ticks: self.scheduler.clock().ticks(),
            fps: self.diagnostics.fps(),
            counters: self.diagnostics.counters().clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn controller(&self) -> &AcquisitionController {
        &self.controller
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn diagnostics(&self) -> &DiagnosticsStore {
        &self.diagnostics
    }
}

/// Commands sent to a spawned session
pub enum SessionCommand {
    Connect {
        reply: oneshot::Sender<ConnectionState>,
    },
    Start {
        mode: AcquisitionMode,
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    SetSamplingRate {
        hz: f64,
        reply: oneshot::Sender<u32>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a session running on its own task
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    notifier: Notifier,
}

impl SessionHandle {
    /// Spawn the session on the current tokio runtime and return a handle.
    /// The join handle yields the session after shutdown.
    pub fn spawn<S>(session: AcquisitionSession<S>) -> (Self, JoinHandle<AcquisitionSession<S>>)
    where
        S: Surface + 'static,
    {
        let (tx, rx) = mpsc::channel::<SessionCommand>(32);
        let notifier = session.notifier().clone();
        let task = tokio::spawn(session.run(rx));
        (Self { tx, notifier }, task)
    }

    async fn request<T>(&self, command: SessionCommand, rx: oneshot::Receiver<T>) -> anyhow::Result<T> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("Session task stopped"))?;
        rx.await.map_err(|_| anyhow::anyhow!("Session task stopped"))
    }

    pub async fn connect(&self) -> anyhow::Result<ConnectionState> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Connect { reply }, rx).await
    }

    pub async fn start(&self, mode: AcquisitionMode) -> anyhow::Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Start { mode, reply }, rx).await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Stop { reply }, rx).await
    }

    pub async fn set_sampling_rate(&self, hz: f64) -> anyhow::Result<u32> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::SetSamplingRate { hz, reply }, rx)
            .await
    }

    pub async fn status(&self) -> anyhow::Result<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Status { reply }, rx).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// Tear the session down and wait until it has stopped
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Shutdown { reply }, rx).await
    }

    /// Blocking shutdown for signal handlers and other non-async threads.
    /// Must not be called from inside the runtime.
    pub fn shutdown_blocking(&self) -> anyhow::Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .blocking_send(SessionCommand::Shutdown { reply })
            .map_err(|_| anyhow::anyhow!("Session task stopped"))?;
        rx.blocking_recv()
            .map_err(|_| anyhow::anyhow!("Session task stopped"))
    }
}
