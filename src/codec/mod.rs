pub mod reader;
pub mod writer;
pub mod frame;
pub mod obfuscation;
pub mod raw;
pub mod schema;

pub use reader::BinaryReader;
pub use writer::BinaryWriter;
pub use frame::{encode_frame, Envelope, Frame, FrameHeader, FrameKind};
pub use obfuscation::{apply_mask, unmask, Obfuscation};
pub use raw::{decode_raw, dump_raw, RawField, RawValue};
pub use schema::{prost_decoder, DecodeFn, SchemaRegistry, SchemaTable};
