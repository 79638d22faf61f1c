//! Session state machine.
//!
//! `Idle → Starting → Recording → Stopping → Idle`, with failures in Starting or
//! Recording passing through `Failed` back to `Idle`.
//!
//! One driver task owns the session exclusively. Triggers arrive on a command
//! channel and engine events on the session's event channel; both are handled
//! on the same task, so no lock guards the session. A second start while a
//! session exists is rejected by the phase check, not queued.

use anyhow::{anyhow, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::engine::RecorderEvent;
use super::session::Session;
use super::status::{SessionPhase, SessionStatusHandle};
use crate::error::{CaptureError, CaptureResult};
use crate::host::MediaHost;
use crate::media::CaptureMode;
use crate::save::RecordingSink;

/// How a trigger was received. The session's own success or failure is
/// reported through the status handle, never here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Accepted,
    /// `start` while a session exists.
    AlreadyActive(SessionPhase),
    /// `stop` with nothing in `Recording`.
    NothingToStop(SessionPhase),
}

enum SessionCommand {
    Start {
        mode: CaptureMode,
        reply: oneshot::Sender<TriggerOutcome>,
    },
    Stop {
        reply: oneshot::Sender<TriggerOutcome>,
    },
}

/// Cloneable trigger handle for the trigger surface.
#[derive(Clone)]
pub struct SessionController {
    tx: mpsc::Sender<SessionCommand>,
    status: SessionStatusHandle,
}

impl SessionController {
    pub async fn start(&self, mode: CaptureMode) -> Result<TriggerOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Start { mode, reply })
            .await
            .map_err(|_| anyhow!("Recording machine is not running"))?;
        rx.await
            .map_err(|_| anyhow!("Recording machine dropped the start request"))
    }

    pub async fn stop(&self) -> Result<TriggerOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Stop { reply })
            .await
            .map_err(|_| anyhow!("Recording machine is not running"))?;
        rx.await
            .map_err(|_| anyhow!("Recording machine dropped the stop request"))
    }

    pub fn status(&self) -> &SessionStatusHandle {
        &self.status
    }
}

type PendingOpen = Pin<Box<dyn Future<Output = CaptureResult<Session>> + Send>>;

enum MachineState {
    Idle,
    Starting(PendingOpen),
    Recording(Session),
    Stopping(Session),
}

impl MachineState {
    fn phase(&self) -> SessionPhase {
        match self {
            Self::Idle => SessionPhase::Idle,
            Self::Starting(_) => SessionPhase::Starting,
            Self::Recording(_) => SessionPhase::Recording,
            Self::Stopping(_) => SessionPhase::Stopping,
        }
    }
}

enum Wakeup {
    Command(Option<SessionCommand>),
    Opened(CaptureResult<Session>),
    Engine(Option<RecorderEvent>),
}

pub struct RecordingMachine {
    host: MediaHost,
    sink: Arc<dyn RecordingSink>,
    status: SessionStatusHandle,
    commands: mpsc::Receiver<SessionCommand>,
    commands_closed: bool,
    state: MachineState,
}

impl RecordingMachine {
    pub fn new(host: MediaHost, sink: Arc<dyn RecordingSink>) -> (Self, SessionController) {
        let (tx, commands) = mpsc::channel(16);
        let status = SessionStatusHandle::default();
        let machine = Self {
            host,
            sink,
            status: status.clone(),
            commands,
            commands_closed: false,
            state: MachineState::Idle,
        };
        (machine, SessionController { tx, status })
    }

    /// Spawn the driver task and hand back its trigger handle.
    pub fn spawn(host: MediaHost, sink: Arc<dyn RecordingSink>) -> (SessionController, JoinHandle<()>) {
        let (machine, controller) = Self::new(host, sink);
        let task = tokio::spawn(machine.run());
        (controller, task)
    }

    /// Drive the machine until every controller is dropped and no session is left.
    pub async fn run(mut self) {
        loop {
            let commands_open = !self.commands_closed;
            let wakeup = match &mut self.state {
                MachineState::Idle => {
                    if !commands_open {
                        break;
                    }
                    Wakeup::Command(self.commands.recv().await)
                }
                MachineState::Starting(pending) => tokio::select! {
                    cmd = self.commands.recv(), if commands_open => Wakeup::Command(cmd),
                    opened = pending.as_mut() => Wakeup::Opened(opened),
                },
                MachineState::Recording(session) | MachineState::Stopping(session) => {
                    tokio::select! {
                        cmd = self.commands.recv(), if commands_open => Wakeup::Command(cmd),
                        event = session.next_event() => Wakeup::Engine(event),
                    }
                }
            };

            match wakeup {
                Wakeup::Command(Some(cmd)) => self.handle_command(cmd).await,
                Wakeup::Command(None) => self.on_commands_closed().await,
                Wakeup::Opened(opened) => self.on_opened(opened).await,
                Wakeup::Engine(event) => self.on_engine_event(event).await,
            }
        }

        info!("Recording machine stopped");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Start { mode, reply } => {
                let outcome = self.start(mode).await;
                let _ = reply.send(outcome);
            }
            SessionCommand::Stop { reply } => {
                let outcome = self.stop().await;
                let _ = reply.send(outcome);
            }
        }
    }

    async fn start(&mut self, mode: CaptureMode) -> TriggerOutcome {
        let phase = self.state.phase();
        if phase.is_active() {
            warn!("Already recording (session is {})", phase.as_str());
            return TriggerOutcome::AlreadyActive(phase);
        }

        self.status.starting(mode).await;
        self.state = MachineState::Starting(Box::pin(Session::open(self.host.clone(), mode)));
        TriggerOutcome::Accepted
    }

    async fn stop(&mut self) -> TriggerOutcome {
        info!("=== STOP REQUESTED ===");

        match std::mem::replace(&mut self.state, MachineState::Idle) {
            MachineState::Recording(mut session) => {
                session.request_stop();
                self.state = MachineState::Stopping(session);
                self.status.stopping().await;
                TriggerOutcome::Accepted
            }
            other => {
                let phase = other.phase();
                self.state = other;
                if phase == SessionPhase::Idle {
                    warn!("Nothing recording");
                } else {
                    info!("Stop ignored while session is {}", phase.as_str());
                }
                TriggerOutcome::NothingToStop(phase)
            }
        }
    }

    async fn on_opened(&mut self, opened: CaptureResult<Session>) {
        match opened {
            Ok(session) => {
                info!(
                    "Session recording in {} mode ({})",
                    session.mode(),
                    session.mime_type()
                );
                self.status.recording(session.mime_type()).await;
                if self.commands_closed {
                    // Nobody is left to stop it.
                    info!("Trigger surface closed while starting, stopping at once");
                    let mut session = session;
                    session.request_stop();
                    self.state = MachineState::Stopping(session);
                    self.status.stopping().await;
                } else {
                    self.state = MachineState::Recording(session);
                }
            }
            Err(e) => {
                // Session::open already released what it acquired.
                error!("Start failed: {}", e);
                self.state = MachineState::Idle;
                self.status.failed(&e).await;
                self.status.idle().await;
            }
        }
    }

    async fn on_engine_event(&mut self, event: Option<RecorderEvent>) {
        match event {
            Some(RecorderEvent::Start) => info!("Recording started successfully"),
            Some(RecorderEvent::DataAvailable(data)) => {
                let size = data.len();
                let appended = match &mut self.state {
                    MachineState::Recording(session) | MachineState::Stopping(session) => {
                        session.append_chunk(data)
                    }
                    _ => false,
                };
                if appended {
                    self.status.chunk(size).await;
                }
            }
            Some(RecorderEvent::Stop) => self.finish().await,
            Some(RecorderEvent::Error(message)) => {
                error!("Recorder error: {}", message);
                self.abort(CaptureError::Engine(message)).await;
            }
            None => {
                self.abort(CaptureError::Engine(
                    "recording engine closed its event stream".to_string(),
                ))
                .await;
            }
        }
    }

    /// Engine signalled completion: deliver the blob, then tear down.
    async fn finish(&mut self) {
        let mut session = match std::mem::replace(&mut self.state, MachineState::Idle) {
            MachineState::Recording(session) | MachineState::Stopping(session) => session,
            other => {
                self.state = other;
                return;
            }
        };

        info!("=== RECORDING STOPPED ===");
        let recording = session.take_recording();
        info!(
            "Finalized {} ({} bytes, {})",
            recording.suggested_name,
            recording.blob.len(),
            recording.blob.mime_type
        );

        match self.sink.deliver(&recording).await {
            Ok(()) => self.status.delivered(&recording.suggested_name).await,
            Err(e) => error!("Failed to deliver recording {}: {:#}", recording.suggested_name, e),
        }

        session.teardown();
        self.status.idle().await;
    }

    /// Hard stop: tear down without delivering anything.
    async fn abort(&mut self, err: CaptureError) {
        let session = match std::mem::replace(&mut self.state, MachineState::Idle) {
            MachineState::Recording(session) | MachineState::Stopping(session) => session,
            other => {
                self.state = other;
                return;
            }
        };

        warn!(
            "Aborting {} session after {} chunk(s), {} byte(s) discarded: {}",
            session.mode(),
            session.chunk_count(),
            session.byte_len(),
            err
        );
        self.status.failed(&err).await;
        session.teardown();
        self.status.idle().await;
    }

    async fn on_commands_closed(&mut self) {
        self.commands_closed = true;
        if let MachineState::Recording(_) = self.state {
            info!("Trigger surface closed, stopping active session");
            self.stop().await;
        }
    }
}
