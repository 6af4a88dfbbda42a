mod error;
mod module;
mod section;
mod symbols;
mod types;

pub use error::*;
pub use module::*;
pub use section::*;
pub use symbols::*;
pub use types::TypeReader;
