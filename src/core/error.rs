use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Coarse failure class a caller can route on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Argument,
    Connect,
    Auth,
    Timeout,
    Protocol,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Argument => "argument",
            ErrorKind::Connect => "connect",
            ErrorKind::Auth => "auth",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Protocol => "protocol",
        };
        write!(f, "{label}")
    }
}

/// Step of a probe's session a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Handshake,
    Greeting,
    Auth,
    Quit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Connect => "connect",
            Stage::Handshake => "tls handshake",
            Stage::Greeting => "greeting",
            Stage::Auth => "authentication",
            Stage::Quit => "quit",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid argument {name}={value:?}: {reason}")]
    InvalidArgument {
        name: String,
        value: String,
        reason: String,
    },

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup for {address} failed: {message}")]
    Tls { address: String, message: String },

    #[error("server at {address} refused the session: {reply}")]
    Greeting { address: String, reply: String },

    #[error("authentication as {username} rejected: {reply}")]
    Auth { username: String, reply: String },

    #[error("{stage} timed out after {}ms", .after.as_millis())]
    Timeout { stage: Stage, after: Duration },

    #[error("I/O error during {stage}: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected reply during {stage}: {reply:?}")]
    UnexpectedReply { stage: Stage, reply: String },
}

impl ProbeError {
    pub fn invalid_argument(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ProbeError::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::InvalidArgument { .. } => ErrorKind::Argument,
            ProbeError::Connect { .. } | ProbeError::Tls { .. } | ProbeError::Greeting { .. } => {
                ErrorKind::Connect
            }
            ProbeError::Auth { .. } => ErrorKind::Auth,
            ProbeError::Timeout { .. } => ErrorKind::Timeout,
            ProbeError::Io { .. } | ProbeError::UnexpectedReply { .. } => ErrorKind::Protocol,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}
