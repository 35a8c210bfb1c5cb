use bytes::Bytes;
use prost::Message;

use crate::codec::{BinaryReader, BinaryWriter};
use crate::error::{Error, Result};

/// Frame type tag (first byte of every WebSocket payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Fire-and-forget request, no correlation number
    Notify = 1,
    /// Request expecting a response, 2-byte correlation number follows
    Request = 2,
    /// Response to a correlated request
    Response = 3,
}

impl FrameKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Notify),
            2 => Some(Self::Request),
            3 => Some(Self::Response),
            _ => None,
        }
    }

    pub fn has_correlation(self) -> bool {
        !matches!(self, Self::Notify)
    }
}

/// Name/data wrapper carried after the frame header
#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

/// Parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: FrameKind,
    pub correlation: Option<u16>,
}

impl FrameHeader {
    /// Parse header from a raw payload, returns header and envelope start position
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let mut reader = BinaryReader::new(data);
        let tag = reader.read_u8()?;
        let kind = FrameKind::from_u8(tag).ok_or(Error::InvalidFrameType(tag))?;
        let correlation = if kind.has_correlation() {
            Some(reader.read_u16_le()?)
        } else {
            None
        };
        Ok((Self { kind, correlation }, reader.position()))
    }

    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.write_u8(self.kind as u8);
        if let Some(correlation) = self.correlation {
            writer.write_u16_le(correlation);
        }
    }
}

/// A frame with its envelope unwrapped but its data still schema-encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub name: String,
    pub data: Bytes,
}

impl Frame {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (header, start) = FrameHeader::parse(payload)?;
        let envelope = Envelope::decode(&payload[start..])
            .map_err(|e| Error::InvalidPacket(format!("bad envelope: {e}")))?;
        if header.kind == FrameKind::Response && !envelope.name.is_empty() {
            return Err(Error::InvalidPacket(format!(
                "response frame carries a name: {}",
                envelope.name
            )));
        }
        Ok(Self {
            header,
            name: envelope.name,
            data: Bytes::from(envelope.data),
        })
    }

    pub fn kind(&self) -> FrameKind {
        self.header.kind
    }

    pub fn correlation(&self) -> Option<u16> {
        self.header.correlation
    }
}

/// Encode a frame: type tag, optional little-endian correlation, envelope
pub fn encode_frame(kind: FrameKind, correlation: u16, name: &str, data: &[u8]) -> Vec<u8> {
    let header = FrameHeader {
        kind,
        correlation: kind.has_correlation().then_some(correlation),
    };
    let envelope = Envelope {
        name: name.to_string(),
        data: data.to_vec(),
    };
    let mut writer = BinaryWriter::with_capacity(3 + envelope.encoded_len());
    header.write(&mut writer);
    writer.write_bytes(&envelope.encode_to_vec());
    writer.into_vec()
}
