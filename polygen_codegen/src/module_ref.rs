use crate::context::Checksum;
use thiserror::Error;
use wasm_helper::{BinaryReader, BinaryWriter, ReadError};

pub const MODULE_REFERENCE_MAGIC: &[u8; 6] = b"CKWASM";
pub const MODULE_REFERENCE_VERSION: u8 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModuleReferenceError {
    #[error("Not a module reference")]
    InvalidMagic,

    #[error("Unsupported module reference version {0}")]
    UnsupportedVersion(u8),

    #[error("Module reference checksum is not valid hex")]
    InvalidChecksum,

    #[error("Module reference field is not NUL terminated")]
    MissingTerminator,

    #[error("Module name is {0} bytes long, the limit is 65535")]
    NameTooLong(usize),

    #[error("Module name is not valid UTF-8")]
    InvalidName,

    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Stand-in for a module's bytes in the JS bundle. The runtime uses it to
/// find the precompiled module by name and verify it by checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    pub name: String,
    pub checksum: Checksum,
}

impl ModuleReference {
    pub fn new(name: impl Into<String>, checksum: Checksum) -> Self {
        Self {
            name: name.into(),
            checksum,
        }
    }

    pub fn is_reference(bytes: &[u8]) -> bool {
        bytes.starts_with(MODULE_REFERENCE_MAGIC)
    }

    pub fn encode(&self) -> Result<Vec<u8>, ModuleReferenceError> {
        let name_len = u16::try_from(self.name.len())
            .map_err(|_| ModuleReferenceError::NameTooLong(self.name.len()))?;

        let mut writer = BinaryWriter::new();
        writer
            .write_bytes(MODULE_REFERENCE_MAGIC)
            .write_u8(MODULE_REFERENCE_VERSION)
            .write_bytes(hex::encode(self.checksum).as_bytes())
            .write_u8(0)
            .write_u16(name_len)
            .write_bytes(self.name.as_bytes())
            .write_u8(0);
        Ok(writer.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ModuleReferenceError> {
        let mut reader = BinaryReader::new(bytes);
        if reader.read_bytes(MODULE_REFERENCE_MAGIC.len())? != MODULE_REFERENCE_MAGIC {
            return Err(ModuleReferenceError::InvalidMagic);
        }
        let version = reader.read_u8()?;
        if version != MODULE_REFERENCE_VERSION {
            return Err(ModuleReferenceError::UnsupportedVersion(version));
        }

        let mut checksum = [0u8; 32];
        hex::decode_to_slice(reader.read_bytes(64)?, &mut checksum)
            .map_err(|_| ModuleReferenceError::InvalidChecksum)?;
        if reader.read_u8()? != 0 {
            return Err(ModuleReferenceError::MissingTerminator);
        }

        let name_len = reader.read_u16()? as usize;
        let name = std::str::from_utf8(reader.read_bytes(name_len)?)
            .map_err(|_| ModuleReferenceError::InvalidName)?;
        if reader.read_u8()? != 0 {
            return Err(ModuleReferenceError::MissingTerminator);
        }

        Ok(Self::new(name, checksum))
    }

    /// JS module exporting the encoded token as an `ArrayBuffer`.
    pub fn to_js_source(&self) -> Result<String, ModuleReferenceError> {
        let bytes = self
            .encode()?
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "const data = Uint8Array.from([{bytes}]);\nexport default data.buffer;\n"
        ))
    }
}
