use crate::module_ref::ModuleReferenceError;
use polygen_parser::DecodeError;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Refusing to overwrite '{}' because it was not generated by polygen. Move it away or re-run with --force", path.display())]
    UnmanagedFile { path: PathBuf },

    #[error("'{}' was modified after polygen generated it. Revert the change or re-run with --force", path.display())]
    ExternallyChanged { path: PathBuf },

    #[error("Cannot access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output manifest '{}' is corrupted: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl OutputError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum Wasm2cError {
    #[error("wasm2c was not found in PATH and the WABT_PATH environment variable is not set. Set it to a directory containing WABT toolkit")]
    NotFound,

    #[error("wasm2c was not found in '{}'. Set WABT_PATH to a directory containing WABT toolkit", dir.display())]
    NotFoundIn { dir: PathBuf },

    #[error("wasm2c version {found} is not supported, version {required} is required. Install WABT {required} and set WABT_PATH to its directory")]
    VersionMismatch { found: String, required: &'static str },

    #[error("wasm2c failed for '{}' ({status}): {stderr}", input.display())]
    Failed {
        input: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error("wasm2c did not produce '{}'", path.display())]
    MissingOutput { path: PathBuf },

    #[error("Cannot run '{}': {source}", binary.display())]
    Io {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while generating one module or the host project.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("Module name '{name}' of '{}' is already used by another module", path.display())]
    DuplicateModuleName { name: String, path: PathBuf },

    #[error("Module '{module}' imports from '{import_module}' but no import context was built for it")]
    MissingImportContext {
        module: String,
        import_module: String,
    },

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Wasm2c(#[from] Wasm2cError),

    #[error("Cannot encode module reference: {0}")]
    Reference(#[from] ModuleReferenceError),

    #[error("Cannot serialize metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Generation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type GenerateResult<T> = Result<T, GenerateError>;
