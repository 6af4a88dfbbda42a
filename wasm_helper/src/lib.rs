mod reader;
mod serializer;
mod structure;
mod writer;

pub use reader::*;
pub use serializer::*;
pub use structure::*;
pub use writer::*;

pub const MAGIC_NUMBER: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];
pub const VERSION: u32 = 1;
