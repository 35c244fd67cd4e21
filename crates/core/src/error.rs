//! Error types for the RTSP relay library.

use std::fmt;

/// Errors that can occur anywhere in the relay.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Protocol**: [`Parse`](Self::Parse) — malformed RTSP messages;
///   [`UnsupportedTransport`](Self::UnsupportedTransport) — transport the
///   peer requested cannot be negotiated.
/// - **Registry**: [`ResourceBusy`](Self::ResourceBusy) (path already
///   published), [`NotFound`](Self::NotFound) (no publisher at path).
/// - **Transport**: [`Io`](Self::Io) — socket/network failures.
/// - **Session**: [`SessionNotFound`](Self::SessionNotFound),
///   [`SessionNotPlaying`](Self::SessionNotPlaying),
///   [`TransportNotConfigured`](Self::TransportNotConfigured).
/// - **Server**: [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning).
/// - **Config**: [`ConfigError`](Self::ConfigError).
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No session with the given ID exists in the session set.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// SETUP has not been completed for this session (no transport negotiated).
    #[error("transport not configured for session: {0}")]
    TransportNotConfigured(String),

    /// A request referenced a session that is not in the state it needs to be.
    #[error("session not in playing state: {0}")]
    SessionNotPlaying(String),

    /// [`Server::start`](crate::Server::start) has not been called yet.
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// Failed to parse an RTSP request message (RFC 2326 §6).
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// Server-side UDP port allocation exhausted the configured range.
    #[error("port range exhausted (tried to allocate beyond u16 range)")]
    PortRangeExhausted,

    /// No publisher registered at the requested mount path.
    #[error("no publisher at path: {0}")]
    MountNotFound(String),

    /// Requested transport cannot be satisfied (RFC 2326 §11.3.7, 461).
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// The requested mount path already has a live publisher.
    #[error("path already published: {0}")]
    ResourceBusy(String),

    /// Startup-time configuration failure (port parity, bad credentials, …).
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no request line).
    EmptyRequest,
    /// Request line did not have the expected `Method URI Version` format.
    InvalidRequestLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// `CSeq` header was missing or given more than once.
    MissingOrDuplicateCSeq,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::MissingOrDuplicateCSeq => write!(f, "missing or duplicate CSeq"),
        }
    }
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
