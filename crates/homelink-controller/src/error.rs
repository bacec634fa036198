use std::borrow::Cow;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A connection to a device could not be established.
    ConnectionFailed,
    /// A request could not be sent or its response could not be read.
    TransportFailure,
    /// The device refused the provided password.
    AuthenticationFailed,
    /// The device refused the cached token.
    TokenInvalidOrExpired,
    /// A value is outside the range accepted by the device.
    OutOfRange,
    /// The device answered with data which cannot be interpreted.
    MalformedResponse,
    /// The device rejected a request.
    Rejected,
    /// The discovery scanner failed.
    Scanner,
    /// Home records could not be loaded, saved or edited.
    Home,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::ConnectionFailed => "Connection Failed",
            Self::TransportFailure => "Transport Failure",
            Self::AuthenticationFailed => "Authentication Failed",
            Self::TokenInvalidOrExpired => "Token Invalid Or Expired",
            Self::OutOfRange => "Out Of Range",
            Self::MalformedResponse => "Malformed Response",
            Self::Rejected => "Rejected",
            Self::Scanner => "Scanner",
            Self::Home => "Home",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A controller error.
#[derive(PartialEq)]
pub struct Error {
    kind: ErrorKind,
    description: Cow<'static, str>,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error(f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error(f)
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    #[inline]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error description.
    #[must_use]
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    fn error(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::TransportFailure, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::MalformedResponse, e.to_string())
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn test_error_format() {
        let error = Error::new(ErrorKind::Rejected, "Light is already on.");

        assert_eq!(error.kind(), ErrorKind::Rejected);
        assert_eq!(error.description(), "Light is already on.");
        assert_eq!(error.to_string(), "Rejected: Light is already on.");
        assert_eq!(format!("{error:?}"), "Rejected: Light is already on.");
    }

    #[test]
    fn test_error_conversions() {
        let error: Error = std::io::Error::other("connection reset").into();

        assert_eq!(error.kind(), ErrorKind::TransportFailure);
        assert_eq!(error.description(), "connection reset");

        let error: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(error.kind(), ErrorKind::MalformedResponse);
    }
}
