use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::device::AcMode;

/// Actions that do not require a valid token.
pub const AUTHENTICATION_ACTIONS: &[&str] = &["authenticate", "validate_token", "change_password"];

/// Actions that every device kind supports once a client is authenticated.
pub const GENERIC_ACTIONS: &[&str] = &[
    "status",
    "details",
    "turn_on",
    "turn_off",
    "set_timer",
    "cancel_timers",
];

/// Actions tied to a specific device kind.
pub const KIND_ACTIONS: &[&str] = &["set_speed", "set_mode", "set_temperature"];

/// An action scheduled by a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerAction {
    /// Turn the device on.
    TurnOn,
    /// Turn the device off.
    TurnOff,
}

impl TimerAction {
    /// Returns the wire name of a [`TimerAction`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
        }
    }
}

impl core::fmt::Display for TimerAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// An action requested to a device, together with its fields.
///
/// On the wire, the action name is stored in the `action` field of the
/// request envelope, while its fields sit next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Obtains a token through the device password.
    Authenticate {
        /// Device password.
        password: String,
    },
    /// Checks whether the token of the request is still valid.
    ValidateToken,
    /// Replaces the device password.
    ChangePassword {
        /// Current device password.
        #[serde(rename = "currentPassword")]
        current_password: String,
        /// New device password.
        #[serde(rename = "newPassword")]
        new_password: String,
    },
    /// Retrieves summary information.
    Status,
    /// Retrieves detailed information.
    Details,
    /// Turns the device on.
    TurnOn,
    /// Turns the device off.
    TurnOff,
    /// Schedules an action after a delay.
    SetTimer {
        /// Delay, in seconds.
        duration: u64,
        /// Scheduled action.
        timer_action: TimerAction,
    },
    /// Discards every scheduled action.
    CancelTimers,
    /// Changes the speed level of a fan.
    SetSpeed {
        /// Speed level.
        speed: i64,
    },
    /// Changes the mode of an air conditioner.
    SetMode {
        /// Air conditioner mode.
        mode: AcMode,
    },
    /// Changes the temperature of an air conditioner.
    SetTemperature {
        /// Temperature, in Celsius degrees.
        temperature: i64,
    },
}

impl Command {
    /// Returns the wire name of the action.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::ValidateToken => "validate_token",
            Self::ChangePassword { .. } => "change_password",
            Self::Status => "status",
            Self::Details => "details",
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::SetTimer { .. } => "set_timer",
            Self::CancelTimers => "cancel_timers",
            Self::SetSpeed { .. } => "set_speed",
            Self::SetMode { .. } => "set_mode",
            Self::SetTemperature { .. } => "set_temperature",
        }
    }

    /// Returns whether the action can be performed without a token.
    #[must_use]
    #[inline]
    pub fn is_authentication(&self) -> bool {
        is_authentication_action(self.action())
    }
}

/// Returns whether an action name bypasses token validation.
#[must_use]
#[inline]
pub fn is_authentication_action(action: &str) -> bool {
    AUTHENTICATION_ACTIONS.contains(&action)
}

/// Returns whether an action name belongs to the protocol.
#[must_use]
#[inline]
pub fn is_known_action(action: &str) -> bool {
    AUTHENTICATION_ACTIONS.contains(&action)
        || GENERIC_ACTIONS.contains(&action)
        || KIND_ACTIONS.contains(&action)
}

/// A request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Identifier of the client issuing the request.
    #[serde(rename = "clientId")]
    pub client_id: String,
    /// Token obtained through authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Requested action.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a [`Request`] without a token.
    #[must_use]
    #[inline]
    pub fn new(client_id: impl Into<String>, command: Command) -> Self {
        Self {
            client_id: client_id.into(),
            token: None,
            command,
        }
    }

    /// Attaches a token to a [`Request`].
    #[must_use]
    #[inline]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
