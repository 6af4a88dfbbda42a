mod context;
mod error;
mod generate;
mod mangling;
mod module_ref;
mod output;
mod plugin;
mod templates;
mod ty;
mod wasm2c;

pub use context::*;
pub use error::*;
pub use generate::*;
pub use mangling::*;
pub use module_ref::*;
pub use output::*;
pub use plugin::*;
pub use ty::*;
pub use wasm2c::*;
