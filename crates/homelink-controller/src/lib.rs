//! The `homelink-controller` library crate provides the client side of the
//! homelink protocol.
//!
//! Core functionalities of this crate include:
//!
//! - Discovering the devices announcing themselves on the local network
//! - Authenticating with a device and sending it commands through a proxy
//!   typed after the device kind
//! - Organizing devices into homes and rooms persisted on disk
//!
//! Discovery and requests run on `tokio`, so every proxy and the scanner
//! proceed independently of each other.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// A controller for discovering and interacting with homelink devices.
pub mod controller;
/// Error management.
pub mod error;
/// Homes and rooms which devices are assigned to.
pub mod home;
/// Proxies for sending commands to a single device.
pub mod proxy;
/// A scanner collecting the beacons devices announce themselves with.
pub mod scanner;
