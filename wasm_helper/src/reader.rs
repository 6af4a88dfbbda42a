use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("unexpected end of input at offset {offset}, needed {needed} more byte(s)")]
    UnexpectedEnd { offset: usize, needed: usize },
    #[error("LEB128 value starting at offset {offset} does not fit in {bits} bits")]
    Leb128Overflow { offset: usize, bits: u32 },
}

impl ReadError {
    pub fn offset(&self) -> usize {
        match self {
            Self::UnexpectedEnd { offset, .. } | Self::Leb128Overflow { offset, .. } => *offset,
        }
    }
}

pub type ReadResult<T> = Result<T, ReadError>;

/// Cursor over a borrowed byte buffer. The cursor only moves forward, and
/// a read that fails leaves it where it was.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    buffer: &'a [u8],
    order: ByteOrder,
    offset: usize,
}

macro_rules! fixed_width_reader {
    ($fn_name:ident, $ty:ty) => {
        pub fn $fn_name(&mut self) -> ReadResult<$ty> {
            const N: usize = std::mem::size_of::<$ty>();
            let bytes = self.read_array::<N>()?;
            Ok(match self.order {
                ByteOrder::LittleEndian => <$ty>::from_le_bytes(bytes),
                ByteOrder::BigEndian => <$ty>::from_be_bytes(bytes),
            })
        }
    };
}

impl<'a> BinaryReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self::with_order(buffer, ByteOrder::LittleEndian)
    }

    pub fn with_order(buffer: &'a [u8], order: ByteOrder) -> Self {
        Self {
            buffer,
            order,
            offset: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    fn ensure(&self, needed: usize) -> ReadResult<()> {
        if self.remaining() < needed {
            Err(ReadError::UnexpectedEnd {
                offset: self.offset,
                needed: needed - self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    fn read_array<const N: usize>(&mut self) -> ReadResult<[u8; N]> {
        self.ensure(N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.buffer[self.offset..self.offset + N]);
        self.offset += N;
        Ok(bytes)
    }

    pub fn peek_u8(&self) -> ReadResult<u8> {
        self.ensure(1)?;
        Ok(self.buffer[self.offset])
    }

    pub fn read_u8(&mut self) -> ReadResult<u8> {
        let byte = self.peek_u8()?;
        self.offset += 1;
        Ok(byte)
    }

    pub fn read_i8(&mut self) -> ReadResult<i8> {
        self.read_u8().map(|byte| byte as i8)
    }

    fixed_width_reader!(read_u16, u16);
    fixed_width_reader!(read_i16, i16);
    fixed_width_reader!(read_u32, u32);
    fixed_width_reader!(read_i32, i32);
    fixed_width_reader!(read_u64, u64);
    fixed_width_reader!(read_i64, i64);
    fixed_width_reader!(read_f32, f32);
    fixed_width_reader!(read_f64, f64);

    /// Borrows the next `len` bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> ReadResult<&'a [u8]> {
        self.ensure(len)?;
        let bytes = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> ReadResult<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Advances past the first occurrence of `value`, the match included.
    pub fn skip_until_byte(&mut self, value: u8) -> ReadResult<()> {
        match self.buffer[self.offset..]
            .iter()
            .position(|byte| *byte == value)
        {
            Some(pos) => {
                self.offset += pos + 1;
                Ok(())
            }
            None => Err(ReadError::UnexpectedEnd {
                offset: self.buffer.len(),
                needed: 1,
            }),
        }
    }

    pub fn read_unsigned_leb128(&mut self) -> ReadResult<u64> {
        let start = self.offset;
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(err) => {
                    self.offset = start;
                    return Err(err);
                }
            };
            let payload = (byte & 0x7f) as u64;
            if shift >= 64 || (shift == 63 && payload > 1) {
                self.offset = start;
                return Err(ReadError::Leb128Overflow {
                    offset: start,
                    bits: 64,
                });
            }
            result |= payload << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
    }

    pub fn read_signed_leb128(&mut self) -> ReadResult<i64> {
        let start = self.offset;
        let mut result = 0i64;
        let mut shift = 0u32;
        loop {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(err) => {
                    self.offset = start;
                    return Err(err);
                }
            };
            if shift >= 64 {
                self.offset = start;
                return Err(ReadError::Leb128Overflow {
                    offset: start,
                    bits: 64,
                });
            }
            result |= ((byte & 0x7f) as i64) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
        }
    }

    /// Unsigned LEB128 that must fit in 32 bits, the width of every count
    /// and index in the binary format.
    pub fn read_leb128_u32(&mut self) -> ReadResult<u32> {
        let start = self.offset;
        let value = self.read_unsigned_leb128()?;
        u32::try_from(value).map_err(|_| {
            self.offset = start;
            ReadError::Leb128Overflow {
                offset: start,
                bits: 32,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_leb128_stops_at_terminator() {
        let mut reader = BinaryReader::new(&[0xe5, 0x8e, 0x26]);
        assert_eq!(reader.read_unsigned_leb128().unwrap(), 624485);
        assert_eq!(reader.offset(), 3);
        assert!(reader.is_empty());

        let mut reader = BinaryReader::new(&[0xe5, 0x8e, 0x26, 0x00, 0x01]);
        assert_eq!(reader.read_unsigned_leb128().unwrap(), 624485);
        assert_eq!(reader.offset(), 3);
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn signed_leb128_sign_extends() {
        let mut reader = BinaryReader::new(&[0x9b, 0xf1, 0x59]);
        assert_eq!(reader.read_signed_leb128().unwrap(), -624485);
        assert_eq!(reader.offset(), 3);

        let mut reader = BinaryReader::new(&[0x7f]);
        assert_eq!(reader.read_signed_leb128().unwrap(), -1);

        let mut reader = BinaryReader::new(&[0x3f]);
        assert_eq!(reader.read_signed_leb128().unwrap(), 63);
    }

    #[test]
    fn byte_order_changes_interpretation() {
        let bytes = [1, 0, 0, 0];
        assert_eq!(BinaryReader::new(&bytes).read_u32().unwrap(), 1);
        assert_eq!(
            BinaryReader::with_order(&bytes, ByteOrder::BigEndian)
                .read_u32()
                .unwrap(),
            16777216
        );
    }

    #[test]
    fn fixed_width_reads_advance_cursor() {
        let bytes = [0xff, 0x34, 0x12, 0x00, 0x00, 0x80, 0x3f];
        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_i8().unwrap(), -1);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_f32().unwrap(), 1.0);
        assert_eq!(reader.offset(), 7);
    }

    #[test]
    fn reading_past_end_is_an_error() {
        let mut reader = BinaryReader::new(&[0x01, 0x02]);
        assert_eq!(
            reader.read_u32(),
            Err(ReadError::UnexpectedEnd {
                offset: 0,
                needed: 2
            })
        );
        assert_eq!(reader.offset(), 0);

        let mut reader = BinaryReader::new(&[0x80, 0x80]);
        assert!(matches!(
            reader.read_unsigned_leb128(),
            Err(ReadError::UnexpectedEnd { .. })
        ));
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn leb128_u32_rejects_wide_values() {
        let mut reader = BinaryReader::new(&[0x80, 0x80, 0x80, 0x80, 0x10]);
        assert_eq!(
            reader.read_leb128_u32(),
            Err(ReadError::Leb128Overflow {
                offset: 0,
                bits: 32
            })
        );
    }

    #[test]
    fn skip_until_byte_consumes_match() {
        let mut reader = BinaryReader::new(&[0x41, 0x01, 0x0b, 0x7f]);
        reader.skip_until_byte(0x0b).unwrap();
        assert_eq!(reader.offset(), 3);
        assert_eq!(reader.read_u8().unwrap(), 0x7f);
        assert!(reader.skip_until_byte(0x0b).is_err());
    }

    #[test]
    fn read_bytes_borrows_from_buffer() {
        let bytes = [1, 2, 3, 4];
        let mut reader = BinaryReader::new(&bytes);
        reader.skip(1).unwrap();
        assert_eq!(reader.read_bytes(2).unwrap(), &[2, 3]);
        assert_eq!(reader.peek_u8().unwrap(), 4);
        assert_eq!(reader.offset(), 3);
    }
}
