use homelink::request::{Command, Request, is_authentication_action, is_known_action};
use homelink::response::Response;

use serde::Deserialize;

use serde_json::Value;

use tracing::{debug, warn};

use crate::device::{Device, unsupported};
use crate::error::{Error, ErrorKind, Result};

// Accepted in place of a missing token, it never matches an issued one.
const NO_TOKEN: &str = "";

fn error_response(error: &Error) -> Response {
    Response::bad_request(format!("Error: {}", error.description()))
}

fn malformed(description: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::MalformedRequest, description.to_string())
}

/// Routes requests to the authentication manager or to the device.
///
/// Authentication actions are served without a token. Every other action
/// requires a valid token: on failure, the validation response is returned
/// unchanged.
///
/// Every error is turned into a response, so a request never breaks the
/// command loop.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    device: Device,
}

impl CommandHandler {
    /// Creates a [`CommandHandler`] for a [`Device`].
    #[must_use]
    #[inline]
    pub const fn new(device: Device) -> Self {
        Self { device }
    }

    /// Returns the [`Device`] served by the handler.
    #[must_use]
    #[inline]
    pub const fn device(&self) -> &Device {
        &self.device
    }

    /// Handles a request decoded from the network.
    ///
    /// Token validation happens before the action is decoded, so an
    /// unauthenticated client learns nothing about the supported actions.
    pub fn handle(&self, request: &Value) -> Response {
        let Some(action) = request.get("action").and_then(Value::as_str) else {
            return error_response(&malformed("Missing or invalid `action` field"));
        };

        if is_authentication_action(action) {
            return match Self::decode(request) {
                Ok(request) => self.authentication(request),
                Err(e) => error_response(&e),
            };
        }

        let Some(client_id) = request.get("clientId").and_then(Value::as_str) else {
            return error_response(&malformed("Missing or invalid `clientId` field"));
        };
        let token = request
            .get("token")
            .and_then(Value::as_str)
            .unwrap_or(NO_TOKEN);

        let validation = self.device.auth().validate_token(client_id, token);
        if !validation.status.is_ok() {
            warn!(
                "Device `{}`: refused `{action}` from client `{client_id}`",
                self.device.id()
            );
            return validation;
        }

        if !is_known_action(action) {
            return error_response(&unsupported(self.device.kind(), action));
        }

        debug!(
            "Device `{}`: `{action}` from client `{client_id}`",
            self.device.id()
        );

        Self::decode(request)
            .and_then(|request| self.execute(request.command))
            .unwrap_or_else(|e| error_response(&e))
    }

    /// Handles an already decoded [`Request`].
    pub fn handle_request(&self, request: Request) -> Response {
        if request.command.is_authentication() {
            return self.authentication(request);
        }

        let token = request.token.as_deref().unwrap_or(NO_TOKEN);
        let validation = self.device.auth().validate_token(&request.client_id, token);
        if !validation.status.is_ok() {
            return validation;
        }

        self.execute(request.command)
            .unwrap_or_else(|e| error_response(&e))
    }

    fn decode(request: &Value) -> Result<Request> {
        Request::deserialize(request).map_err(malformed)
    }

    fn authentication(&self, request: Request) -> Response {
        let auth = self.device.auth();
        match request.command {
            Command::Authenticate { password } => auth.authenticate(&request.client_id, &password),
            Command::ValidateToken => auth.validate_token(
                &request.client_id,
                request.token.as_deref().unwrap_or(NO_TOKEN),
            ),
            Command::ChangePassword {
                current_password,
                new_password,
            } => auth.change_password(&current_password, &new_password),
            command => error_response(&unsupported(self.device.kind(), command.action())),
        }
    }

    fn execute(&self, command: Command) -> Result<Response> {
        let device = &self.device;
        let response = match command {
            Command::Status => Response::ok("Status retrieved successfully")
                .data(serde_json::to_value(device.info())?),
            Command::Details => Response::ok("Detailed info retrieved successfully")
                .data(serde_json::to_value(device.detailed_info())?),
            Command::TurnOn => {
                device.turn_on()?;
                Response::ok("Device turned on")
            }
            Command::TurnOff => {
                device.turn_off()?;
                Response::ok("Device turned off")
            }
            Command::SetTimer {
                duration,
                timer_action,
            } => {
                device.set_timer(duration, timer_action)?;
                Response::ok("Timer set successfully")
            }
            Command::CancelTimers => {
                device.cancel_all_timers();
                Response::ok("All timers canceled")
            }
            Command::SetSpeed { speed } => {
                device.set_speed(speed)?;
                Response::ok("Fan speed set successfully")
            }
            Command::SetMode { mode } => {
                device.set_mode(mode)?;
                Response::ok("AC mode set successfully")
            }
            Command::SetTemperature { temperature } => {
                device.set_temperature(temperature)?;
                Response::ok("AC temperature set successfully")
            }
            command => return Err(unsupported(device.kind(), command.action())),
        };

        Ok(response)
    }
}
