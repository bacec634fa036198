use std::borrow::Cow;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A device has been turned on while on, or turned off while off.
    InvalidStateTransition,
    /// A device attribute is outside its accepted range.
    OutOfRange,
    /// The action is unknown or not supported by the device kind.
    UnsupportedAction,
    /// A request lacks some fields or contains wrongly typed values.
    MalformedRequest,
    /// The runtime tracker has been started twice or stopped while idle.
    TimerState,
    /// A socket could not be bound or a network operation failed.
    Network,
    /// Data could not be serialized or deserialized.
    Serialization,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::InvalidStateTransition => "Invalid State Transition",
            Self::OutOfRange => "Out Of Range",
            Self::UnsupportedAction => "Unsupported Action",
            Self::MalformedRequest => "Malformed Request",
            Self::TimerState => "Timer State",
            Self::Network => "Network",
            Self::Serialization => "Serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A device error.
///
/// The description is the message reported to clients, so it must be
/// meaningful on its own.
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
        f.write_str(&self.description)
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
        Self::new(ErrorKind::Network, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, e.to_string())
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn test_error_display() {
        let error = Error::new(ErrorKind::OutOfRange, "Temperature out of range.");

        assert_eq!(error.kind(), ErrorKind::OutOfRange);
        assert_eq!(error.to_string(), "Temperature out of range.");
        assert_eq!(
            format!("{error:?}"),
            "Out Of Range: Temperature out of range."
        );
    }

    #[test]
    fn test_error_conversions() {
        let error: Error = std::io::Error::other("address in use").into();
        assert_eq!(error.kind(), ErrorKind::Network);

        let error: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(error.kind(), ErrorKind::Serialization);
    }
}
