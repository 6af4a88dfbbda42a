use crate::error::Wasm2cError;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const WASM2C_VERSION: &str = "1.0.36";
pub const WABT_PATH_ENV: &str = "WABT_PATH";

/// Handle to a wasm2c binary whose version was checked. Resolve it once
/// per run and pass it to whatever needs to translate modules to C.
#[derive(Debug, Clone)]
pub struct Wasm2c {
    binary: PathBuf,
    version: String,
}

impl Wasm2c {
    /// Looks wasm2c up in `PATH`, then in `$WABT_PATH`.
    pub async fn resolve() -> Result<Self, Wasm2cError> {
        let binary = match which::which("wasm2c") {
            Ok(binary) => binary,
            Err(_) => {
                let dir = std::env::var_os(WABT_PATH_ENV)
                    .map(PathBuf::from)
                    .ok_or(Wasm2cError::NotFound)?;
                let binary = dir.join("wasm2c");
                if !binary.is_file() {
                    return Err(Wasm2cError::NotFoundIn { dir });
                }
                binary
            }
        };
        Self::from_binary(binary).await
    }

    pub async fn from_binary(binary: impl Into<PathBuf>) -> Result<Self, Wasm2cError> {
        let binary = binary.into();
        let output = Command::new(&binary)
            .arg("--version")
            .output()
            .await
            .map_err(|source| Wasm2cError::Io {
                binary: binary.clone(),
                source,
            })?;
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !version.starts_with(WASM2C_VERSION) {
            return Err(Wasm2cError::VersionMismatch {
                found: version,
                required: WASM2C_VERSION,
            });
        }

        log::debug!("using wasm2c {} at {}", version, binary.display());
        Ok(Self { binary, version })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The files [`Wasm2c::generate`] writes for `module_name`.
    pub fn output_files(output_dir: &Path, module_name: &str) -> Vec<PathBuf> {
        vec![
            output_dir.join(format!("{module_name}.c")),
            output_dir.join(format!("{module_name}.h")),
        ]
    }

    /// Translates `input` into `<output_dir>/<module_name>.{c,h}`.
    pub async fn generate(
        &self,
        input: &Path,
        output_dir: &Path,
        module_name: &str,
    ) -> Result<Vec<PathBuf>, Wasm2cError> {
        let outputs = Self::output_files(output_dir, module_name);
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| Wasm2cError::Io {
                binary: self.binary.clone(),
                source,
            })?;

        log::info!("generating C sources for {}", input.display());
        let output = Command::new(&self.binary)
            .arg(input)
            .arg("-o")
            .arg(&outputs[0])
            .arg("--module-name")
            .arg(module_name)
            .output()
            .await
            .map_err(|source| Wasm2cError::Io {
                binary: self.binary.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(Wasm2cError::Failed {
                input: input.to_path_buf(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        for path in &outputs {
            let exists = tokio::fs::try_exists(path)
                .await
                .map_err(|source| Wasm2cError::Io {
                    binary: self.binary.clone(),
                    source,
                })?;
            if !exists {
                return Err(Wasm2cError::MissingOutput { path: path.clone() });
            }
        }
        Ok(outputs)
    }
}
