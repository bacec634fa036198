//! The communication interface among a `homelink` device and its controller.
//!
//! This crate provides the data exchanged on the network:
//!
//! - Request envelopes, which carry an action, the identifier of the
//!   client issuing it, an optional authentication token, and the fields
//!   required by the action.
//! - Response envelopes, which carry a status code, a human-readable message,
//!   and optional data or tokens produced by the device.
//! - Discovery beacons, periodically announced by each device on a
//!   multicast group so that a controller can find it on the local network.
//! - Device descriptions, such as device kinds, air conditioner modes and
//!   the information payloads returned by status requests.
//!
//! Every structure is serializable and deserializable, since a device
//! decodes requests and encodes responses while a controller does the
//! opposite.
//!
//! This crate can be compiled for both `std` and `no_std` environments.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![no_std]

extern crate alloc;

/// Device kinds and their attributes.
pub mod device;
/// Discovery beacons and multicast parameters.
pub mod discovery;
/// Information payloads returned by a device.
pub mod info;
/// Request envelopes and actions.
pub mod request;
/// Response envelopes and status codes.
pub mod response;

#[cfg(test)]
pub(crate) fn serialize<T: serde::Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

#[cfg(test)]
pub(crate) fn deserialize<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}
