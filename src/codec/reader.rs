use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Binary reader for WebSocket frame data
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(Error::UnexpectedEof);
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    /// Read a base-128 varint (protobuf wire format, at most 10 bytes)
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for i in 0..10 {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::InvalidPacket("varint longer than 10 bytes".into()))
    }

    /// Read a varint-length-prefixed byte slice
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.read_bytes(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16_le().unwrap(), 0x0302);
        assert_eq!(reader.read_u32_le().unwrap(), 0x07060504);
        assert!(reader.is_empty());
        assert!(matches!(reader.read_u8(), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn test_read_varint() {
        let data = [0x96, 0x01, 0x05];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_varint().unwrap(), 150);
        assert_eq!(reader.read_varint().unwrap(), 5);

        let truncated = [0x80];
        let mut reader = BinaryReader::new(&truncated);
        assert!(reader.read_varint().is_err());
    }

    #[test]
    fn test_read_length_delimited() {
        let data = [0x03, b'a', b'b', b'c', 0xFF];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_length_delimited().unwrap(), b"abc");
        assert_eq!(reader.remaining(), 1);
    }
}
