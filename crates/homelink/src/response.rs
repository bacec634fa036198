use alloc::string::String;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Status {
    /// The request completed successfully.
    Ok,
    /// The request is malformed, contains invalid values, or names an
    /// unsupported action.
    BadRequest,
    /// The password is wrong.
    Unauthorized,
    /// The token is invalid or expired.
    Forbidden,
}

impl Status {
    /// Returns the numeric code of a [`Status`].
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
        }
    }

    /// Returns whether the status denotes a success.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<Status> for u16 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

/// Error returned when a numeric code does not name a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownStatus(pub u16);

impl core::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown status code {}", self.0)
    }
}

impl core::error::Error for UnknownStatus {}

impl TryFrom<u16> for Status {
    type Error = UnknownStatus;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(Self::Ok),
            400 => Ok(Self::BadRequest),
            401 => Ok(Self::Unauthorized),
            403 => Ok(Self::Forbidden),
            code => Err(UnknownStatus(code)),
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Status code.
    pub status: Status,
    /// Human-readable outcome description.
    pub message: String,
    /// Data produced by the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Token issued by a successful authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Response {
    /// Creates a [`Response`] with the given [`Status`] and message.
    #[must_use]
    #[inline]
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
            token: None,
        }
    }

    /// Creates a successful [`Response`].
    #[must_use]
    #[inline]
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Status::Ok, message)
    }

    /// Creates a [`Response`] for a malformed or invalid request.
    #[must_use]
    #[inline]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(Status::BadRequest, message)
    }

    /// Creates a [`Response`] for a wrong password.
    #[must_use]
    #[inline]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(Status::Unauthorized, message)
    }

    /// Creates a [`Response`] for an invalid or expired token.
    #[must_use]
    #[inline]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(Status::Forbidden, message)
    }

    /// Attaches data to a [`Response`].
    #[must_use]
    #[inline]
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attaches a token to a [`Response`].
    #[must_use]
    #[inline]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the response message.
    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{deserialize, serialize};

    use super::{Response, Status};

    #[test]
    fn test_status_codes() {
        assert_eq!(serialize(Status::Forbidden), json!(403));
        assert_eq!(deserialize::<Status>(json!(401)), Status::Unauthorized);
        assert!(serde_json::from_value::<Status>(json!(500)).is_err());
        assert!(Status::Ok.is_ok());
        assert!(!Status::BadRequest.is_ok());
    }

    #[test]
    fn test_plain_response() {
        assert_eq!(
            serialize(Response::ok("Device turned on")),
            json!({
                "status": 200,
                "message": "Device turned on",
            })
        );

        assert_eq!(
            serialize(Response::bad_request("Error: Light is already on.")),
            json!({
                "status": 400,
                "message": "Error: Light is already on.",
            })
        );
    }

    #[test]
    fn test_response_with_fields() {
        let response = Response::ok("Authentication successful").token("ABCDEFGH12345678");
        assert_eq!(
            serialize(response),
            json!({
                "status": 200,
                "message": "Authentication successful",
                "token": "ABCDEFGH12345678",
            })
        );

        let response = deserialize::<Response>(json!({
            "status": 200,
            "message": "Status retrieved successfully",
            "data": {
                "id": "light-1",
                "state": "off",
                "power": 0,
            },
        }));
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.message(), "Status retrieved successfully");
        assert_eq!(
            response.data,
            Some(json!({
                "id": "light-1",
                "state": "off",
                "power": 0,
            }))
        );
        assert_eq!(response.token, None);
    }
}
