//! `homelink-device` is a library crate for building the firmware of
//! `homelink` devices running on operating systems.
//!
//! It provides APIs to:
//!
//! - Model a device as a power state machine whose behavior depends on the
//!   device kind, exposing optional capabilities such as speed or climate
//!   control
//! - Account device usage over calendar periods together with its
//!   energy consumption
//! - Issue, validate and expire authentication tokens bound to a client
//! - Schedule delayed power transitions
//! - Route requests coming from a controller to the device
//! - Announce the device on a multicast group and serve requests over `TCP`
//!
//! The crate relies on `tokio` as asynchronous executor: network tasks,
//! client connections and timers run as independent tasks, while shared
//! device state is guarded by locks.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Token issuance and validation.
pub mod auth;
/// Request routing.
pub mod command;
/// General device definition along with its capabilities.
pub mod device;
/// All supported device kinds.
pub mod devices;
/// Error management.
pub mod error;
/// The discovery beacon and the command server.
pub mod network;
/// Usage and energy accounting.
pub mod runtime;
/// Delayed actions scheduler.
pub mod timer;
