//! Error types for hlbus operations.

/// Alias for `Result<T, hlbus::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by bus operations.
///
/// Device absence is not an error: discovery reports it through
/// [`Discovery::NotFound`](crate::Discovery::NotFound).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The bus endpoint could not be opened.
    #[error("cannot open bus at {address}: {source}")]
    Connection {
        /// Transport address that was tried.
        address: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The bus handle has been closed.
    #[error("bus handle is closed")]
    InvalidState,

    /// The call's preconditions do not hold (absent or stale device).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The exchange failed at the I/O level.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The response does not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The device reported a failure.
    #[error("device error: {0}")]
    Device(String),
}

impl Error {
    /// Builds a [`Error::Protocol`] from anything printable.
    pub(crate) fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Maps a framing-level I/O error to the bus taxonomy.
    ///
    /// Frames that arrive but fail to decode are protocol errors; everything
    /// else is a transport failure.
    pub(crate) fn from_exchange(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::InvalidData {
            Self::Protocol(err.to_string())
        } else {
            Self::Transport(err)
        }
    }

    /// Whether repeating the call on a freshly opened bus could succeed.
    ///
    /// Only transport failures qualify. A transport failure closes the bus it
    /// happened on, so a retry must reopen it first; the retry policy belongs
    /// to the caller.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn invalid_data_maps_to_protocol() {
        let err = Error::from_exchange(io::Error::new(io::ErrorKind::InvalidData, "bad json"));
        assert!(matches!(err, Error::Protocol(m) if m.contains("bad json")));
    }

    #[test]
    fn eof_maps_to_transport() {
        let err = Error::from_exchange(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn device_errors_are_not_retryable() {
        assert!(!Error::Device("no such method".into()).is_retryable());
        assert!(!Error::InvalidState.is_retryable());
    }
}
