use crate::reader::ByteOrder;

/// Growable counterpart of [`crate::BinaryReader`].
#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
    order: ByteOrder,
}

macro_rules! fixed_width_writer {
    ($fn_name:ident, $ty:ty) => {
        pub fn $fn_name(&mut self, value: $ty) -> &mut Self {
            match self.order {
                ByteOrder::LittleEndian => self.buffer.extend_from_slice(&value.to_le_bytes()),
                ByteOrder::BigEndian => self.buffer.extend_from_slice(&value.to_be_bytes()),
            }
            self
        }
    };
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(order: ByteOrder) -> Self {
        Self {
            buffer: Vec::default(),
            order,
        }
    }

    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_i8(&mut self, value: i8) -> &mut Self {
        self.write_u8(value as u8)
    }

    fixed_width_writer!(write_u16, u16);
    fixed_width_writer!(write_i16, i16);
    fixed_width_writer!(write_u32, u32);
    fixed_width_writer!(write_i32, i32);
    fixed_width_writer!(write_u64, u64);
    fixed_width_writer!(write_i64, i64);
    fixed_width_writer!(write_f32, f32);
    fixed_width_writer!(write_f64, f64);

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    pub fn write_unsigned_leb128(&mut self, mut value: u64) -> &mut Self {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buffer.push(byte);
                return self;
            }
            self.buffer.push(byte | 0x80);
        }
    }

    pub fn write_signed_leb128(&mut self, mut value: i64) -> &mut Self {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            // stop once the sign bit of `byte` matches what is left
            let sign_bit = byte & 0x40 != 0;
            if (value == 0 && !sign_bit) || (value == -1 && sign_bit) {
                self.buffer.push(byte);
                return self;
            }
            self.buffer.push(byte | 0x80);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinaryReader;

    #[test]
    fn writes_respect_byte_order() {
        let mut writer = BinaryWriter::with_order(ByteOrder::BigEndian);
        writer.write_u32(1).write_u16(0x0102);
        assert_eq!(writer.as_slice(), &[0, 0, 0, 1, 1, 2]);

        let mut writer = BinaryWriter::new();
        writer.write_u32(1).write_u16(0x0102);
        assert_eq!(writer.as_slice(), &[1, 0, 0, 0, 2, 1]);
    }

    #[test]
    fn leb128_values_read_back() {
        let mut writer = BinaryWriter::new();
        writer
            .write_unsigned_leb128(624485)
            .write_signed_leb128(-624485)
            .write_f64(2.5);
        assert_eq!(writer.offset(), 14);

        let bytes = writer.into_bytes();
        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_unsigned_leb128().unwrap(), 624485);
        assert_eq!(reader.read_signed_leb128().unwrap(), -624485);
        assert_eq!(reader.read_f64().unwrap(), 2.5);
        assert!(reader.is_empty());
    }
}
