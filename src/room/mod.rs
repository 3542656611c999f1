//! Room units: identity, lifecycle state machine, physics, and metering.

pub mod directory;
/// Per-room usage ledger and bills.
pub mod ledger;
pub mod types;
/// Room unit state machine and linear temperature model.
pub mod unit;

pub use directory::{RoomDirectory, RoomRecord, StaticDirectory};
pub use ledger::{Bill, Ledger, Segment};
pub use types::{FanSpeed, Mode, RoomId, RoomState, Stamp};
pub use unit::{RoomUnit, Transition};
