use crate::codec::raw::dump_raw;
use crate::protocol::DecodedMessage;
use crate::screen::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timeout: {context}")]
    Timeout {
        context: String,
        snapshot: Option<Snapshot>,
    },

    #[error("presentation `{presentation}` not detected")]
    PresentationNotDetected {
        presentation: &'static str,
        snapshot: Snapshot,
    },

    #[error("presentation `{presentation}` is stale")]
    StalePresentation { presentation: &'static str },

    #[error("inconsistent message: {detail}{}", describe_message(.message))]
    InconsistentMessage {
        detail: String,
        message: Option<Box<DecodedMessage>>,
        snapshot: Option<Snapshot>,
    },

    #[error("invalid operation: {reason}")]
    InvalidOperation {
        reason: String,
        snapshot: Option<Snapshot>,
    },

    #[error("reboot requested: {detail}")]
    RebootRequest { detail: String },

    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("invalid frame type: {0}")]
    InvalidFrameType(u8),

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("unknown message `{name}` ({}):\n{}", side(.is_response), dump_raw(.raw))]
    UnknownMessage {
        name: String,
        raw: bytes::Bytes,
        is_response: bool,
    },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("message channel closed")]
    ChannelClosed,

    #[error("json error: {0}")]
    Json(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),
}

fn side(is_response: &bool) -> &'static str {
    if *is_response { "response" } else { "request" }
}

fn describe_message(message: &Option<Box<DecodedMessage>>) -> String {
    match message {
        Some(m) => format!(" [{} {}]", m.direction, m.name),
        None => String::new(),
    }
}

impl Error {
    pub fn timeout(context: impl Into<String>) -> Self {
        Self::Timeout { context: context.into(), snapshot: None }
    }

    pub fn inconsistent(detail: impl Into<String>) -> Self {
        Self::InconsistentMessage {
            detail: detail.into(),
            message: None,
            snapshot: None,
        }
    }

    pub fn inconsistent_message(detail: impl Into<String>, message: DecodedMessage) -> Self {
        Self::InconsistentMessage {
            detail: detail.into(),
            message: Some(Box::new(message)),
            snapshot: None,
        }
    }

    /// Attach the offending message to an inconsistency raised without one
    pub fn with_message(mut self, offending: DecodedMessage) -> Self {
        if let Self::InconsistentMessage { message, .. } = &mut self {
            if message.is_none() {
                *message = Some(Box::new(offending));
            }
        }
        self
    }

    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation { reason: reason.into(), snapshot: None }
    }

    /// Timeouts and failed detections are meant to be caught by probing code.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::PresentationNotDetected { .. })
    }

    pub fn is_not_detected(&self) -> bool {
        matches!(self, Self::PresentationNotDetected { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Timeout { snapshot, .. }
            | Self::InconsistentMessage { snapshot, .. }
            | Self::InvalidOperation { snapshot, .. } => snapshot.as_ref(),
            Self::PresentationNotDetected { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }

    /// Fill in a missing snapshot; errors that already carry one are kept as is.
    pub fn with_snapshot(mut self, shot: Snapshot) -> Self {
        match &mut self {
            Self::Timeout { snapshot, .. }
            | Self::InconsistentMessage { snapshot, .. }
            | Self::InvalidOperation { snapshot, .. } => {
                if snapshot.is_none() {
                    *snapshot = Some(shot);
                }
            }
            _ => {}
        }
        self
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
