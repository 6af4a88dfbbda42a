use crate::error::{DecodeErrorKind, DecodeResult};
use wasm_helper::{
    BinaryReader, FuncType, GlobalType, Limits, Mut, RefType, TableType, ValType,
};

const FUNC_TYPE_MARKER: u8 = 0x60;
const EXPR_END: u8 = 0x0b;

/// Readers for the type encodings shared by several sections.
pub trait TypeReader<'a> {
    fn read_val_type(&mut self) -> DecodeResult<ValType>;
    fn read_ref_type(&mut self) -> DecodeResult<RefType>;
    fn read_func_type(&mut self) -> DecodeResult<FuncType>;
    fn read_limits(&mut self) -> DecodeResult<Limits>;
    fn read_table_type(&mut self) -> DecodeResult<TableType>;
    fn read_global_type(&mut self) -> DecodeResult<GlobalType>;
    fn read_name(&mut self) -> DecodeResult<&'a str>;
    fn skip_const_expr(&mut self) -> DecodeResult<()>;

    fn read_vec<T, F>(&mut self, read_item: F) -> DecodeResult<Vec<T>>
    where
        F: FnMut(&mut Self) -> DecodeResult<T>;
}

impl<'a> TypeReader<'a> for BinaryReader<'a> {
    fn read_val_type(&mut self) -> DecodeResult<ValType> {
        let offset = self.offset();
        let byte = self.read_u8()?;
        ValType::from_byte(byte).ok_or_else(|| {
            DecodeErrorKind::UnexpectedByte {
                what: "value type",
                found: byte,
            }
            .at(offset)
        })
    }

    fn read_ref_type(&mut self) -> DecodeResult<RefType> {
        let offset = self.offset();
        let byte = self.read_u8()?;
        RefType::from_byte(byte).ok_or_else(|| {
            DecodeErrorKind::UnexpectedByte {
                what: "reference type",
                found: byte,
            }
            .at(offset)
        })
    }

    fn read_func_type(&mut self) -> DecodeResult<FuncType> {
        let offset = self.offset();
        let marker = self.read_u8()?;
        if marker != FUNC_TYPE_MARKER {
            return Err(DecodeErrorKind::UnexpectedByte {
                what: "function type",
                found: marker,
            }
            .at(offset));
        }
        let parameters = self.read_vec(|reader| reader.read_val_type())?;
        let returns = self.read_vec(|reader| reader.read_val_type())?;
        Ok(FuncType {
            parameters,
            returns,
        })
    }

    fn read_limits(&mut self) -> DecodeResult<Limits> {
        let offset = self.offset();
        match self.read_u8()? {
            0x00 => Ok(Limits {
                min: self.read_leb128_u32()?,
                max: None,
            }),
            0x01 => Ok(Limits {
                min: self.read_leb128_u32()?,
                max: Some(self.read_leb128_u32()?),
            }),
            found => Err(DecodeErrorKind::UnexpectedByte {
                what: "limits",
                found,
            }
            .at(offset)),
        }
    }

    fn read_table_type(&mut self) -> DecodeResult<TableType> {
        let ref_type = self.read_ref_type()?;
        let limits = self.read_limits()?;
        Ok(TableType { limits, ref_type })
    }

    fn read_global_type(&mut self) -> DecodeResult<GlobalType> {
        let ty = self.read_val_type()?;
        let offset = self.offset();
        let mutability = match self.read_u8()? {
            0x00 => Mut::Const,
            0x01 => Mut::Var,
            found => {
                return Err(DecodeErrorKind::UnexpectedByte {
                    what: "global mutability",
                    found,
                }
                .at(offset))
            }
        };
        Ok(GlobalType { mutability, ty })
    }

    fn read_name(&mut self) -> DecodeResult<&'a str> {
        let len = self.read_leb128_u32()? as usize;
        let offset = self.offset();
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| DecodeErrorKind::InvalidUtf8.at(offset))
    }

    // Initializer expressions are not interpreted.
    fn skip_const_expr(&mut self) -> DecodeResult<()> {
        self.skip_until_byte(EXPR_END)?;
        Ok(())
    }

    fn read_vec<T, F>(&mut self, mut read_item: F) -> DecodeResult<Vec<T>>
    where
        F: FnMut(&mut Self) -> DecodeResult<T>,
    {
        let len = self.read_leb128_u32()?;
        // the count is untrusted, so don't reserve from it
        let mut items = Vec::new();
        for _ in 0..len {
            items.push(read_item(self)?);
        }
        Ok(items)
    }
}
