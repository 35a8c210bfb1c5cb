use std::fmt;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::action::ActionEvent;

/// Direction of a WebSocket frame relative to the game client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Server to client
    Inbound,
    /// Client to server
    Outbound,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Inbound => Self::Outbound,
            Self::Outbound => Self::Inbound,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        })
    }
}

/// One captured WebSocket binary message
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub direction: Direction,
    pub payload: Bytes,
    pub timestamp: SystemTime,
}

impl RawFrame {
    pub fn new(direction: Direction, payload: impl Into<Bytes>) -> Self {
        Self {
            direction,
            payload: payload.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A request (and its response, if any) decoded into structured values
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Direction of the request
    pub direction: Direction,
    pub name: String,
    pub request: Value,
    pub response: Option<Value>,
    pub timestamp: SystemTime,
    /// Unmasked inner action for `.lq.ActionPrototype`
    pub action: Option<ActionEvent>,
}

impl DecodedMessage {
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn action(&self) -> Option<&ActionEvent> {
        self.action.as_ref()
    }

    pub fn step(&self) -> Option<u32> {
        self.action.as_ref().map(|a| a.step)
    }

    /// Response object, or an inconsistency if the exchange had none
    pub fn require_response(&self) -> Result<&Value> {
        self.response
            .as_ref()
            .ok_or_else(|| Error::inconsistent_message("missing response", self.clone()))
    }
}

/// One record written by the capture process.
///
/// Correlated requests are stored together with their response; the
/// frame bytes are base64 so the record stays JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedExchange {
    pub request_direction: Direction,
    pub request: String,
    pub response: Option<String>,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl CapturedExchange {
    pub fn from_frames(request: &RawFrame, response: Option<&RawFrame>) -> Self {
        let at = response.unwrap_or(request).timestamp;
        Self {
            request_direction: request.direction,
            request: STANDARD.encode(&request.payload),
            response: response.map(|r| STANDARD.encode(&r.payload)),
            timestamp: at.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64(),
        }
    }

    /// Split back into the raw frames, response travelling the other way
    pub fn into_frames(self) -> Result<Vec<RawFrame>> {
        let timestamp = UNIX_EPOCH + Duration::from_secs_f64(self.timestamp.max(0.0));
        let decode = |s: &str| {
            STANDARD
                .decode(s)
                .map_err(|e| Error::InvalidPacket(format!("bad base64 in capture: {e}")))
        };

        let mut frames = vec![RawFrame::new(self.request_direction, decode(&self.request)?)
            .with_timestamp(timestamp)];
        if let Some(response) = &self.response {
            frames.push(
                RawFrame::new(self.request_direction.opposite(), decode(response)?)
                    .with_timestamp(timestamp),
            );
        }
        Ok(frames)
    }

    pub fn parse_jsonl(text: &str) -> Result<Vec<Self>> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }

    pub async fn load_jsonl(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::parse_jsonl(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_frame, FrameKind};

    #[test]
    fn test_direction_serde() {
        assert_eq!(serde_json::to_string(&Direction::Outbound).unwrap(), "\"outbound\"");
        assert_eq!(Direction::Inbound.opposite(), Direction::Outbound);
        assert_eq!(Direction::Inbound.to_string(), "inbound");
    }

    #[test]
    fn test_exchange_into_frames() {
        let req = encode_frame(FrameKind::Request, 9, ".lq.Lobby.fetchRoom", b"");
        let resp = encode_frame(FrameKind::Response, 9, "", b"");
        let line = format!(
            r#"{{"request_direction":"outbound","request":"{}","response":"{}","timestamp":1700000000.5}}"#,
            STANDARD.encode(&req),
            STANDARD.encode(&resp),
        );

        let exchanges = CapturedExchange::parse_jsonl(&format!("{line}\n\n")).unwrap();
        assert_eq!(exchanges.len(), 1);
        let frames = exchanges[0].clone().into_frames().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].direction, Direction::Outbound);
        assert_eq!(frames[1].direction, Direction::Inbound);
        assert_eq!(&frames[0].payload[..], &req[..]);
        assert_eq!(
            frames[1].timestamp.duration_since(UNIX_EPOCH).unwrap(),
            Duration::from_millis(1_700_000_000_500)
        );

        let back = CapturedExchange::from_frames(&frames[0], Some(&frames[1]));
        assert_eq!(back, exchanges[0]);
    }

    #[test]
    fn test_bad_base64_is_rejected() {
        let exchange = CapturedExchange {
            request_direction: Direction::Inbound,
            request: "***".into(),
            response: None,
            timestamp: 0.0,
        };
        assert!(matches!(exchange.into_frames(), Err(Error::InvalidPacket(_))));
    }
}
