use crate::error::{DecodeError, DecodeErrorKind, DecodeResult};
use crate::types::TypeReader;
use wasm_helper::{
    BinaryReader, CustomSection, Export, ExportDesc, FuncType, GlobalType, Import, ImportDesc,
    Limits, SectionId, TableType, TypeIdx, MAGIC_NUMBER, VERSION,
};

/// A decoded record together with the byte offset it started at, so that
/// resolution failures found later can still point into the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    pub offset: usize,
    pub item: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Custom(CustomSection),
    Type(Vec<FuncType>),
    Import(Vec<Located<Import>>),
    Function(Vec<Located<TypeIdx>>),
    Table(Vec<TableType>),
    Memory(Vec<Limits>),
    Global(Vec<GlobalType>),
    Export(Vec<Located<Export>>),
    /// start, element, code, data and data-count bodies are opaque
    Skipped(SectionId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionRecord {
    pub id: SectionId,
    /// Offset of the section id byte.
    pub offset: usize,
    pub size: usize,
    pub section: Section,
}

/// Iterates the sections of a binary after validating its header. Stops
/// after the first error.
pub struct SectionReader<'a> {
    reader: BinaryReader<'a>,
    failed: bool,
}

impl<'a> SectionReader<'a> {
    pub fn new(buffer: &'a [u8]) -> DecodeResult<Self> {
        let mut reader = BinaryReader::new(buffer);

        let magic = reader.read_bytes(MAGIC_NUMBER.len())?;
        if magic != MAGIC_NUMBER {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(DecodeErrorKind::InvalidMagic { found }.at(0));
        }

        let version_offset = reader.offset();
        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(DecodeErrorKind::UnsupportedVersion(version).at(version_offset));
        }

        Ok(Self {
            reader,
            failed: false,
        })
    }

    pub fn offset(&self) -> usize {
        self.reader.offset()
    }

    fn read_section(&mut self) -> DecodeResult<SectionRecord> {
        let offset = self.reader.offset();
        let id_byte = self.reader.read_u8()?;
        let id = SectionId::from_byte(id_byte)
            .ok_or_else(|| DecodeErrorKind::UnknownSection(id_byte).at(offset))?;
        let size = self.reader.read_leb128_u32()? as usize;
        let body_start = self.reader.offset();

        if size > self.reader.remaining() {
            return Err(DecodeErrorKind::SectionOutOfBounds {
                id,
                declared: size,
                remaining: self.reader.remaining(),
            }
            .at(offset));
        }

        let section = match self.read_section_body(id, size) {
            Ok(section) => section,
            // a body that runs past its declared end is a framing error,
            // whatever the handler tripped over
            Err(err) if err.offset >= body_start + size => {
                return Err(DecodeErrorKind::SectionSizeMismatch {
                    id,
                    declared: size,
                    consumed: err.offset + 1 - body_start,
                }
                .at(offset))
            }
            Err(err) => return Err(err),
        };

        let consumed = self.reader.offset() - body_start;
        if consumed != size {
            return Err(DecodeErrorKind::SectionSizeMismatch {
                id,
                declared: size,
                consumed,
            }
            .at(offset));
        }

        log::trace!("decoded {id:?} section at offset {offset} ({size} bytes)");
        Ok(SectionRecord {
            id,
            offset,
            size,
            section,
        })
    }

    fn read_section_body(&mut self, id: SectionId, size: usize) -> DecodeResult<Section> {
        let reader = &mut self.reader;
        Ok(match id {
            SectionId::Custom => {
                let start = reader.offset();
                let name = reader.read_name()?.to_string();
                let name_len = reader.offset() - start;
                let data = reader.read_bytes(size.saturating_sub(name_len))?.to_vec();
                Section::Custom(CustomSection { name, data })
            }
            SectionId::Type => Section::Type(reader.read_vec(|r| r.read_func_type())?),
            SectionId::Import => Section::Import(reader.read_vec(read_import)?),
            SectionId::Function => Section::Function(reader.read_vec(|r| {
                let offset = r.offset();
                let item = r.read_leb128_u32()?;
                Ok(Located { offset, item })
            })?),
            SectionId::Table => Section::Table(reader.read_vec(|r| r.read_table_type())?),
            SectionId::Memory => Section::Memory(reader.read_vec(|r| r.read_limits())?),
            SectionId::Global => Section::Global(reader.read_vec(|r| {
                let ty = r.read_global_type()?;
                r.skip_const_expr()?;
                Ok(ty)
            })?),
            SectionId::Export => Section::Export(reader.read_vec(read_export)?),
            SectionId::Start
            | SectionId::Element
            | SectionId::Code
            | SectionId::Data
            | SectionId::DataCount => {
                reader.skip(size)?;
                Section::Skipped(id)
            }
        })
    }
}

fn read_import(reader: &mut BinaryReader<'_>) -> DecodeResult<Located<Import>> {
    let offset = reader.offset();
    let module = reader.read_name()?.to_string();
    let name = reader.read_name()?.to_string();
    let kind_offset = reader.offset();
    let desc = match reader.read_u8()? {
        0x00 => ImportDesc::Func(reader.read_leb128_u32()?),
        0x01 => ImportDesc::Table(reader.read_table_type()?),
        0x02 => ImportDesc::Mem(reader.read_limits()?),
        0x03 => ImportDesc::Global(reader.read_global_type()?),
        found => {
            return Err(DecodeErrorKind::UnexpectedByte {
                what: "import descriptor",
                found,
            }
            .at(kind_offset))
        }
    };
    Ok(Located {
        offset,
        item: Import { module, name, desc },
    })
}

fn read_export(reader: &mut BinaryReader<'_>) -> DecodeResult<Located<Export>> {
    let offset = reader.offset();
    let name = reader.read_name()?.to_string();
    let kind_offset = reader.offset();
    let kind = reader.read_u8()?;
    let index = reader.read_leb128_u32()?;
    let desc = match kind {
        0x00 => ExportDesc::Func(index),
        0x01 => ExportDesc::Table(index),
        0x02 => ExportDesc::Mem(index),
        0x03 => ExportDesc::Global(index),
        found => {
            return Err(DecodeErrorKind::UnexpectedByte {
                what: "export descriptor",
                found,
            }
            .at(kind_offset))
        }
    };
    Ok(Located {
        offset,
        item: Export { name, desc },
    })
}

impl<'a> Iterator for SectionReader<'a> {
    type Item = Result<SectionRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let result = self.read_section();
        self.failed = result.is_err();
        Some(result)
    }
}
