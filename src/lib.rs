//! Shared-capacity HVAC scheduler and simulation engine.
//!
//! A fixed number of service slots is shared between many room units. The
//! [`sim::engine::Engine`] advances room temperatures on a simulated clock,
//! admits waiting rooms by fan-speed priority, preempts lower priorities,
//! rotates equal priorities on a time slice, and bills every service segment.
//!
//! With the `api` feature the engine can be driven in real time by
//! [`runtime::spawn`] and exposed over HTTP by [`api::router`].

#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod io;
pub mod request;
pub mod room;
#[cfg(feature = "api")]
pub mod runtime;
pub mod sim;
