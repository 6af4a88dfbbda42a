use crate::symbols::SymbolKind;
use thiserror::Error;
use wasm_helper::{ReadError, SectionId};

/// A malformed binary. Fatal for the module being decoded, never for its
/// siblings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (at byte offset {offset})")]
pub struct DecodeError {
    pub offset: usize,
    pub kind: DecodeErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    #[error("Not a WebAssembly binary, found magic bytes {found:02x?}")]
    InvalidMagic { found: [u8; 4] },
    #[error("Unsupported binary format version {0}, only version 1 is supported")]
    UnsupportedVersion(u32),
    #[error("Unknown section id {0}")]
    UnknownSection(u8),
    #[error("Duplicate {0:?} section")]
    DuplicateSection(SectionId),
    #[error("{id:?} section declares {declared} byte(s) but its contents span {consumed}")]
    SectionSizeMismatch {
        id: SectionId,
        declared: usize,
        consumed: usize,
    },
    #[error("{id:?} section declares {declared} byte(s) but only {remaining} remain")]
    SectionOutOfBounds {
        id: SectionId,
        declared: usize,
        remaining: usize,
    },
    #[error("Invalid {what} byte 0x{found:02x}")]
    UnexpectedByte { what: &'static str, found: u8 },
    #[error("Name is not valid UTF-8")]
    InvalidUtf8,
    #[error("Function declares type index {0}, which is out of range")]
    UnresolvedType(u32),
    #[error("Import {module}.{name} refers to type index {index}, which is out of range")]
    UnresolvedImport {
        module: String,
        name: String,
        index: u32,
    },
    #[error("Export \"{name}\" refers to {kind} index {index}, which is out of range")]
    UnresolvedExport {
        name: String,
        kind: SymbolKind,
        index: u32,
    },
    #[error("{0}")]
    Read(ReadError),
}

impl DecodeErrorKind {
    pub fn at(self, offset: usize) -> DecodeError {
        DecodeError { offset, kind: self }
    }
}

impl From<ReadError> for DecodeError {
    fn from(err: ReadError) -> Self {
        DecodeErrorKind::Read(err.clone()).at(err.offset())
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;
