use crate::structure::*;
use crate::writer::BinaryWriter;
use crate::{MAGIC_NUMBER, VERSION};

/// Encodes a value in the WebAssembly binary format.
pub trait Serializer {
    fn serialize(&self, writer: &mut BinaryWriter);

    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        self.serialize(&mut writer);
        writer.into_bytes()
    }
}

impl Serializer for Module {
    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(&MAGIC_NUMBER).write_u32(VERSION);

        section(writer, SectionId::Type, &self.types);
        section(writer, SectionId::Import, &self.imports);
        let func_types: Vec<TypeIdx> = self.funcs.iter().map(|func| func.ty).collect();
        section(writer, SectionId::Function, &func_types);
        section(writer, SectionId::Table, &self.tables);
        section(writer, SectionId::Memory, &self.mems);
        section(writer, SectionId::Global, &self.globals);
        section(writer, SectionId::Export, &self.exports);
        if let Some(start) = self.start {
            framed(writer, SectionId::Start, |content| {
                content.write_unsigned_leb128(start as u64);
            });
        }
        section(writer, SectionId::Code, &self.funcs);

        for custom in &self.customs {
            custom.serialize(writer);
        }
    }
}

/// Writes `id`, the size of what `content` produces, then the content itself.
fn framed(writer: &mut BinaryWriter, id: SectionId, content: impl FnOnce(&mut BinaryWriter)) {
    let mut buffer = BinaryWriter::new();
    content(&mut buffer);
    writer
        .write_u8(id.byte())
        .write_unsigned_leb128(buffer.offset() as u64)
        .write_bytes(buffer.as_slice());
}

// empty vectors produce no section at all
fn section<T: Serializer>(writer: &mut BinaryWriter, id: SectionId, items: &[T]) {
    if !items.is_empty() {
        framed(writer, id, |content| items.serialize(content));
    }
}

macro_rules! leb128_serializer {
    ($method:ident, $as:ty, $($ty:ty),+) => {
        $(
            impl Serializer for $ty {
                fn serialize(&self, writer: &mut BinaryWriter) {
                    writer.$method(*self as $as);
                }
            }
        )+
    };
}

leb128_serializer!(write_unsigned_leb128, u64, u8, u16, u32, u64, usize);
leb128_serializer!(write_signed_leb128, i64, i8, i16, i32, i64, isize);

impl Serializer for f32 {
    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_f32(*self);
    }
}

impl Serializer for f64 {
    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_f64(*self);
    }
}

impl<T: Serializer> Serializer for [T] {
    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_unsigned_leb128(self.len() as u64);
        for item in self {
            item.serialize(writer);
        }
    }
}

impl Serializer for str {
    fn serialize(&self, writer: &mut BinaryWriter) {
        writer
            .write_unsigned_leb128(self.len() as u64)
            .write_bytes(self.as_bytes());
    }
}

impl Serializer for String {
    fn serialize(&self, writer: &mut BinaryWriter) {
        self.as_str().serialize(writer);
    }
}

impl Serializer for CustomSection {
    fn serialize(&self, writer: &mut BinaryWriter) {
        framed(writer, SectionId::Custom, |content| {
            self.name.serialize(content);
            content.write_bytes(&self.data);
        });
    }
}

impl Serializer for ValType {
    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_u8(match self {
            Self::Num(NumType::I32) => 0x7f,
            Self::Num(NumType::I64) => 0x7e,
            Self::Num(NumType::F32) => 0x7d,
            Self::Num(NumType::F64) => 0x7c,
            Self::Vec(VecType::V128) => 0x7b,
            Self::Ref(RefType::FuncRef) => 0x70,
            Self::Ref(RefType::ExternRef) => 0x6f,
        });
    }
}

impl Serializer for RefType {
    fn serialize(&self, writer: &mut BinaryWriter) {
        ValType::Ref(*self).serialize(writer);
    }
}

impl Serializer for FuncType {
    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_u8(0x60);
        self.parameters.serialize(writer);
        self.returns.serialize(writer);
    }
}

impl Serializer for Limits {
    fn serialize(&self, writer: &mut BinaryWriter) {
        match self.max {
            Some(max) => {
                writer
                    .write_u8(0x01)
                    .write_unsigned_leb128(self.min as u64)
                    .write_unsigned_leb128(max as u64);
            }
            None => {
                writer.write_u8(0x00).write_unsigned_leb128(self.min as u64);
            }
        }
    }
}

impl Serializer for TableType {
    fn serialize(&self, writer: &mut BinaryWriter) {
        self.ref_type.serialize(writer);
        self.limits.serialize(writer);
    }
}

impl Serializer for GlobalType {
    fn serialize(&self, writer: &mut BinaryWriter) {
        self.ty.serialize(writer);
        writer.write_u8(match self.mutability {
            Mut::Const => 0x00,
            Mut::Var => 0x01,
        });
    }
}

impl Serializer for Import {
    fn serialize(&self, writer: &mut BinaryWriter) {
        self.module.serialize(writer);
        self.name.serialize(writer);
        match &self.desc {
            ImportDesc::Func(ty) => {
                writer.write_u8(0x00).write_unsigned_leb128(*ty as u64);
            }
            ImportDesc::Table(ty) => {
                writer.write_u8(0x01);
                ty.serialize(writer);
            }
            ImportDesc::Mem(limits) => {
                writer.write_u8(0x02);
                limits.serialize(writer);
            }
            ImportDesc::Global(ty) => {
                writer.write_u8(0x03);
                ty.serialize(writer);
            }
        }
    }
}

impl Serializer for Global {
    fn serialize(&self, writer: &mut BinaryWriter) {
        self.ty.serialize(writer);
        self.init.serialize(writer);
    }
}

impl Serializer for Export {
    fn serialize(&self, writer: &mut BinaryWriter) {
        self.name.serialize(writer);
        let (kind, index) = match self.desc {
            ExportDesc::Func(index) => (0x00, index),
            ExportDesc::Table(index) => (0x01, index),
            ExportDesc::Mem(index) => (0x02, index),
            ExportDesc::Global(index) => (0x03, index),
        };
        writer.write_u8(kind).write_unsigned_leb128(index as u64);
    }
}

impl Serializer for Func {
    fn serialize(&self, writer: &mut BinaryWriter) {
        // consecutive locals of one type are declared as a single (count, type) entry
        let mut groups: Vec<(u32, ValType)> = Vec::new();
        for ty in &self.locals {
            match groups.last_mut() {
                Some((count, last)) if last == ty => *count += 1,
                _ => groups.push((1, *ty)),
            }
        }

        let mut body = BinaryWriter::new();
        body.write_unsigned_leb128(groups.len() as u64);
        for (count, ty) in groups {
            body.write_unsigned_leb128(count as u64);
            ty.serialize(&mut body);
        }
        self.body.serialize(&mut body);

        writer
            .write_unsigned_leb128(body.offset() as u64)
            .write_bytes(body.as_slice());
    }
}

impl Serializer for Expr {
    fn serialize(&self, writer: &mut BinaryWriter) {
        for instr in &self.0 {
            instr.serialize(writer);
        }
        writer.write_u8(0x0b);
    }
}

impl Serializer for Instr {
    fn serialize(&self, writer: &mut BinaryWriter) {
        let (opcode, immediate) = match *self {
            Self::Unreachable => (0x00, None),
            Self::Nop => (0x01, None),
            Self::Return => (0x0f, None),
            Self::Call(func) => (0x10, Some(func)),
            Self::Drop => (0x1a, None),
            Self::LocalGet(local) => (0x20, Some(local)),
            Self::LocalSet(local) => (0x21, Some(local)),
            Self::GlobalGet(global) => (0x23, Some(global)),
            Self::GlobalSet(global) => (0x24, Some(global)),
            Self::RefFunc(func) => (0xd2, Some(func)),
            Self::I32LtS => (0x48, None),
            Self::I32Add => (0x6a, None),
            Self::I32Sub => (0x6b, None),
            Self::I64Add => (0x7c, None),
            Self::RefNull(ty) => {
                writer.write_u8(0xd0);
                ty.serialize(writer);
                return;
            }
            Self::I32Const(value) => {
                writer.write_u8(0x41).write_signed_leb128(value as i64);
                return;
            }
            Self::I64Const(value) => {
                writer.write_u8(0x42).write_signed_leb128(value);
                return;
            }
            Self::F32Const(value) => {
                writer.write_u8(0x43).write_f32(value);
                return;
            }
            Self::F64Const(value) => {
                writer.write_u8(0x44).write_f64(value);
                return;
            }
        };
        writer.write_u8(opcode);
        if let Some(index) = immediate {
            writer.write_unsigned_leb128(index as u64);
        }
    }
}
