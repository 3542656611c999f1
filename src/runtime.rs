//! Real-time driver: one task owns the engine and is the sole writer.
//!
//! External requests are sent as commands over an `mpsc` channel and answered
//! through `oneshot` replies. They are interleaved with ticks but never run
//! concurrently with one. After every tick the task publishes a
//! [`SystemStatus`] on a `broadcast` channel.

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::request::{ControlRequest, RequestError};
use crate::room::directory::RoomDirectory;
use crate::room::ledger::Bill;
use crate::room::types::RoomId;
use crate::sim::engine::Engine;
use crate::sim::types::{Ack, RoomSnapshot, SystemStatus};

/// Pending commands the driver buffers before senders wait.
const COMMAND_BUFFER: usize = 64;
/// Status payloads kept for slow subscribers before they lag.
const STATUS_BUFFER: usize = 16;

/// The driver task is no longer reachable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("simulation driver has stopped")]
    Stopped,
    #[error("simulation driver dropped the reply")]
    NoReply,
}

enum Command {
    Control {
        room: String,
        request: ControlRequest,
        reply: oneshot::Sender<Result<Ack, RequestError>>,
    },
    PowerOff {
        room: RoomId,
        reply: oneshot::Sender<bool>,
    },
    RequestService {
        room: RoomId,
        reply: oneshot::Sender<bool>,
    },
    RoomStatus {
        room: RoomId,
        reply: oneshot::Sender<Option<RoomSnapshot>>,
    },
    Bill {
        room: RoomId,
        reply: oneshot::Sender<Option<Bill>>,
    },
    Checkout {
        room: RoomId,
        reply: oneshot::Sender<Option<Bill>>,
    },
    Status {
        reply: oneshot::Sender<SystemStatus>,
    },
}

/// Cloneable handle for talking to a running driver.
#[derive(Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
    status: broadcast::Sender<SystemStatus>,
}

impl DriverHandle {
    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| DriverError::Stopped)?;
        rx.await.map_err(|_| DriverError::NoReply)
    }

    /// Validates and applies a control request.
    ///
    /// # Arguments
    ///
    /// * `room` - Raw room id, validated by the engine
    /// * `request` - Setpoint, fan speed, and mode as received
    ///
    /// # Returns
    ///
    /// The engine's answer: an `Ack`, or the `RequestError` naming the
    /// rejected field. The outer error means the driver is gone.
    pub async fn control(
        &self,
        room: &str,
        request: ControlRequest,
    ) -> Result<Result<Ack, RequestError>, DriverError> {
        let room = room.to_string();
        self.call(|reply| Command::Control {
            room,
            request,
            reply,
        })
        .await
    }

    /// Powers a room off; `false` if the room is unknown.
    pub async fn power_off(&self, room: RoomId) -> Result<bool, DriverError> {
        self.call(|reply| Command::PowerOff { room, reply }).await
    }

    /// Re-queues a room with its stored parameters; `false` if unknown.
    pub async fn request_service(&self, room: RoomId) -> Result<bool, DriverError> {
        self.call(|reply| Command::RequestService { room, reply }).await
    }

    pub async fn room_status(&self, room: RoomId) -> Result<Option<RoomSnapshot>, DriverError> {
        self.call(|reply| Command::RoomStatus { room, reply }).await
    }

    pub async fn bill(&self, room: RoomId) -> Result<Option<Bill>, DriverError> {
        self.call(|reply| Command::Bill { room, reply }).await
    }

    pub async fn checkout(&self, room: RoomId) -> Result<Option<Bill>, DriverError> {
        self.call(|reply| Command::Checkout { room, reply }).await
    }

    pub async fn status(&self) -> Result<SystemStatus, DriverError> {
        self.call(|reply| Command::Status { reply }).await
    }

    /// Subscribes to the per-tick status broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<SystemStatus> {
        self.status.subscribe()
    }
}

/// Starts the driver task on the current tokio runtime.
///
/// The task ticks the engine once per clock period, skipping missed ticks so
/// steps never pile up or overlap, and exits once every handle is dropped.
///
/// # Arguments
///
/// * `engine` - Fully built engine; its `SimClock` sets the tick period
///
/// # Returns
///
/// A cloneable `DriverHandle` and the task's `JoinHandle`, which yields the
/// engine back after the driver stops.
pub fn spawn<D>(engine: Engine<D>) -> (DriverHandle, JoinHandle<Engine<D>>)
where
    D: RoomDirectory + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (status_tx, _) = broadcast::channel(STATUS_BUFFER);
    let handle = DriverHandle {
        commands: command_tx,
        status: status_tx.clone(),
    };
    let task = tokio::spawn(drive(engine, command_rx, status_tx));
    (handle, task)
}

async fn drive<D: RoomDirectory>(
    mut engine: Engine<D>,
    mut commands: mpsc::Receiver<Command>,
    status: broadcast::Sender<SystemStatus>,
) -> Engine<D> {
    let period = engine.clock().period();
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(period_ms = period.as_millis() as u64, "driver started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let record = engine.tick();
                debug!(tick = record.tick, "driver tick");
                // No subscribers is not an error.
                let _ = status.send(engine.system_status());
            }
            command = commands.recv() => match command {
                Some(command) => handle(&mut engine, command),
                None => break,
            },
        }
    }

    info!(tick = engine.clock().tick(), "driver stopped");
    engine
}

fn handle<D: RoomDirectory>(engine: &mut Engine<D>, command: Command) {
    // A dropped reply receiver only means the caller gave up waiting.
    match command {
        Command::Control {
            room,
            request,
            reply,
        } => {
            let _ = reply.send(engine.submit_control(&room, &request));
        }
        Command::PowerOff { room, reply } => {
            let _ = reply.send(engine.power_off(&room));
        }
        Command::RequestService { room, reply } => {
            let _ = reply.send(engine.request_service(&room));
        }
        Command::RoomStatus { room, reply } => {
            let _ = reply.send(engine.room_status(&room));
        }
        Command::Bill { room, reply } => {
            let _ = reply.send(engine.bill(&room));
        }
        Command::Checkout { room, reply } => {
            let _ = reply.send(engine.checkout(&room));
        }
        Command::Status { reply } => {
            let _ = reply.send(engine.system_status());
        }
    }
}
