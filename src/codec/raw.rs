//! Schema-less protobuf field decoding for diagnostics.
//!
//! Used when a message name is missing from the schema registry, and by the
//! `frame-dump` tool. Output follows the layout of `protoc --decode_raw`.

use std::fmt::Write;

use crate::codec::BinaryReader;
use crate::error::{Error, Result};

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// Nesting limit for the length-delimited heuristic
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    String(String),
    Message(Vec<RawField>),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub number: u32,
    pub value: RawValue,
}

/// Decode a buffer into its top-level fields
pub fn decode_raw(data: &[u8]) -> Result<Vec<RawField>> {
    decode_at_depth(data, 0)
}

fn decode_at_depth(data: &[u8], depth: usize) -> Result<Vec<RawField>> {
    let mut reader = BinaryReader::new(data);
    let mut fields = Vec::new();

    while !reader.is_empty() {
        let key = reader.read_varint()?;
        let number = (key >> 3) as u32;
        if number == 0 {
            return Err(Error::InvalidPacket("field number 0".into()));
        }
        let value = match (key & 0x07) as u8 {
            WIRE_VARINT => RawValue::Varint(reader.read_varint()?),
            WIRE_FIXED64 => RawValue::Fixed64(reader.read_u64_le()?),
            WIRE_FIXED32 => RawValue::Fixed32(reader.read_u32_le()?),
            WIRE_LEN => classify(reader.read_length_delimited()?, depth),
            other => {
                return Err(Error::InvalidPacket(format!("unsupported wire type {other}")));
            }
        };
        fields.push(RawField { number, value });
    }

    Ok(fields)
}

fn classify(bytes: &[u8], depth: usize) -> RawValue {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if !text.chars().any(|c| c.is_control() && c != '\n' && c != '\t') {
            return RawValue::String(text.to_string());
        }
    }
    if depth < MAX_DEPTH && !bytes.is_empty() {
        if let Ok(fields) = decode_at_depth(bytes, depth + 1) {
            return RawValue::Message(fields);
        }
    }
    RawValue::Bytes(bytes.to_vec())
}

/// Render a buffer as an indented field tree, or as hex when it does not parse
pub fn dump_raw(data: &[u8]) -> String {
    match decode_raw(data) {
        Ok(fields) => {
            let mut out = String::new();
            write_fields(&mut out, &fields, 0);
            out
        }
        Err(e) => format!("<{e}> {}", hex(data)),
    }
}

fn write_fields(out: &mut String, fields: &[RawField], indent: usize) {
    let pad = "  ".repeat(indent);
    for field in fields {
        let _ = match &field.value {
            RawValue::Varint(v) => writeln!(out, "{pad}{}: {v}", field.number),
            RawValue::Fixed64(v) => writeln!(out, "{pad}{}: 0x{v:016x}", field.number),
            RawValue::Fixed32(v) => writeln!(out, "{pad}{}: 0x{v:08x}", field.number),
            RawValue::String(s) => writeln!(out, "{pad}{}: {s:?}", field.number),
            RawValue::Bytes(b) => writeln!(out, "{pad}{}: <{}>", field.number, hex(b)),
            RawValue::Message(inner) => {
                let _ = writeln!(out, "{pad}{} {{", field.number);
                write_fields(out, inner, indent + 1);
                writeln!(out, "{pad}}}")
            }
        };
    }
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}
