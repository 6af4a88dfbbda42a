use crate::error::OutputError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;

pub const MANIFEST_FILE: &str = "polygen-output.json";

/// Files written by previous runs, keyed by path relative to the output
/// root, with their modification time in whole milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WrittenFiles {
    pub files: BTreeMap<String, f64>,
}

fn mtime_ms(modified: SystemTime) -> f64 {
    match modified.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis() as f64,
        Err(_) => 0.0,
    }
}

async fn modified_ms(path: &Path) -> std::io::Result<Option<f64>> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(Some(mtime_ms(metadata.modified()?))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Writes generated files below an output root, refusing to clobber files
/// it did not write or that were edited since.
///
/// Clones share the same manifest, so a generator scoped with
/// [`OutputGenerator::for_path`] records into its parent's manifest.
#[derive(Debug, Clone)]
pub struct OutputGenerator {
    root: PathBuf,
    dir: PathBuf,
    assets_directory: Option<PathBuf>,
    force: bool,
    written: Arc<Mutex<WrittenFiles>>,
}

impl OutputGenerator {
    /// Opens `root`, loading the manifest of the previous run if there is one.
    pub async fn load(root: impl Into<PathBuf>, force: bool) -> Result<Self, OutputError> {
        let root = root.into();
        let manifest_path = root.join(MANIFEST_FILE);
        let written = match fs::read(&manifest_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| OutputError::Manifest {
                path: manifest_path.clone(),
                source,
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => WrittenFiles::default(),
            Err(err) => return Err(OutputError::io(manifest_path, err)),
        };
        log::debug!(
            "loaded output manifest with {} file(s) from {}",
            written.files.len(),
            root.display()
        );

        Ok(Self {
            dir: root.clone(),
            root,
            assets_directory: None,
            force,
            written: Arc::new(Mutex::new(written)),
        })
    }

    pub fn with_assets_directory(mut self, assets_directory: impl Into<PathBuf>) -> Self {
        self.assets_directory = Some(assets_directory.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_forced(&self) -> bool {
        self.force
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// A generator writing below `path`, relative to this one's directory.
    pub fn for_path(&self, path: impl AsRef<Path>) -> Self {
        Self {
            dir: self.dir.join(path),
            ..self.clone()
        }
    }

    pub fn output_path_to(&self, path: impl AsRef<Path>) -> PathBuf {
        self.dir.join(path)
    }

    fn manifest_key(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub(crate) async fn check_writable(&self, path: &Path) -> Result<(), OutputError> {
        if self.force {
            return Ok(());
        }
        let on_disk = modified_ms(path)
            .await
            .map_err(|err| OutputError::io(path, err))?;
        let recorded = self
            .written
            .lock()
            .await
            .files
            .get(&self.manifest_key(path))
            .copied();

        match (recorded, on_disk) {
            (None, Some(..)) => Err(OutputError::UnmanagedFile {
                path: path.to_path_buf(),
            }),
            (Some(recorded), Some(on_disk)) if on_disk > recorded => {
                Err(OutputError::ExternallyChanged {
                    path: path.to_path_buf(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Records the current modification time of `path`.
    pub async fn record(&self, path: impl AsRef<Path>) -> Result<(), OutputError> {
        let path = path.as_ref();
        let Some(modified) = modified_ms(path)
            .await
            .map_err(|err| OutputError::io(path, err))?
        else {
            return Err(OutputError::io(
                path,
                std::io::Error::new(ErrorKind::NotFound, "generated file is missing"),
            ));
        };
        let key = self.manifest_key(path);
        self.written.lock().await.files.insert(key, modified);
        Ok(())
    }

    /// Writes `contents` to `path` below this generator's directory and
    /// returns the full path written.
    pub async fn write_to(
        &self,
        path: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
    ) -> Result<PathBuf, OutputError> {
        let target = self.output_path_to(path);
        self.check_writable(&target).await?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| OutputError::io(parent, err))?;
        }
        fs::write(&target, contents)
            .await
            .map_err(|err| OutputError::io(&target, err))?;
        self.record(&target).await?;

        log::debug!("wrote {}", target.display());
        Ok(target)
    }

    pub async fn write_all_to<P, C>(
        &self,
        files: impl IntoIterator<Item = (P, C)>,
    ) -> Result<Vec<PathBuf>, OutputError>
    where
        P: AsRef<Path>,
        C: AsRef<[u8]>,
    {
        let mut written = Vec::new();
        for (path, contents) in files {
            written.push(self.write_to(path, contents).await?);
        }
        Ok(written)
    }

    /// Copies `from` (a file or directory inside the assets directory) to
    /// `to` below this generator's directory.
    pub async fn copy_asset(
        &self,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>, OutputError> {
        let Some(assets) = &self.assets_directory else {
            return Err(OutputError::io(
                from.as_ref(),
                std::io::Error::new(ErrorKind::NotFound, "no assets directory configured"),
            ));
        };

        let mut copied = Vec::new();
        let mut pending = vec![(assets.join(from), to.as_ref().to_path_buf())];
        while let Some((source, destination)) = pending.pop() {
            let metadata = fs::metadata(&source)
                .await
                .map_err(|err| OutputError::io(&source, err))?;
            if metadata.is_dir() {
                let mut entries = fs::read_dir(&source)
                    .await
                    .map_err(|err| OutputError::io(&source, err))?;
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|err| OutputError::io(&source, err))?
                {
                    pending.push((entry.path(), destination.join(entry.file_name())));
                }
            } else {
                let contents = fs::read(&source)
                    .await
                    .map_err(|err| OutputError::io(&source, err))?;
                copied.push(self.write_to(&destination, contents).await?);
            }
        }
        copied.sort();
        Ok(copied)
    }

    /// True when an output is missing or the newest source is strictly
    /// newer than the oldest output.
    pub async fn is_outdated(
        sources: &[PathBuf],
        outputs: &[PathBuf],
    ) -> Result<bool, OutputError> {
        let mut oldest_output = f64::INFINITY;
        for output in outputs {
            match modified_ms(output)
                .await
                .map_err(|err| OutputError::io(output, err))?
            {
                Some(modified) => oldest_output = oldest_output.min(modified),
                None => return Ok(true),
            }
        }

        let mut newest_source = f64::NEG_INFINITY;
        for source in sources {
            let modified = modified_ms(source)
                .await
                .map_err(|err| OutputError::io(source, err))?
                .unwrap_or(f64::INFINITY);
            newest_source = newest_source.max(modified);
        }

        Ok(newest_source > oldest_output)
    }

    /// Runs `generate` unless `outputs` are up to date with `sources`.
    /// Returns `None` when generation was skipped.
    pub async fn generating<T, E, F, Fut>(
        &self,
        sources: &[PathBuf],
        outputs: &[PathBuf],
        generate: F,
    ) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<OutputError>,
    {
        if !self.force && !Self::is_outdated(sources, outputs).await? {
            log::debug!(
                "skipping up to date output(s): {}",
                outputs
                    .iter()
                    .map(|output| output.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(None);
        }
        generate().await.map(Some)
    }

    pub async fn written_files(&self) -> WrittenFiles {
        self.written.lock().await.clone()
    }

    /// Writes the manifest next to the generated files.
    pub async fn save(&self) -> Result<(), OutputError> {
        let manifest_path = self.manifest_path();
        let manifest = {
            let written = self.written.lock().await;
            serde_json::to_vec_pretty(&*written).map_err(|source| OutputError::Manifest {
                path: manifest_path.clone(),
                source,
            })?
        };
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| OutputError::io(&self.root, err))?;
        fs::write(&manifest_path, manifest)
            .await
            .map_err(|err| OutputError::io(&manifest_path, err))?;
        log::info!("saved output manifest to {}", manifest_path.display());
        Ok(())
    }

    /// Deletes every recorded file that is still on disk, then the manifest.
    pub async fn clean(&self) -> Result<Vec<PathBuf>, OutputError> {
        let files = std::mem::take(&mut self.written.lock().await.files);
        let mut removed = Vec::new();
        for key in files.keys() {
            let path = self.root.join(key);
            match fs::remove_file(&path).await {
                Ok(()) => removed.push(path),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(OutputError::io(path, err)),
            }
        }
        match fs::remove_file(self.manifest_path()).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(OutputError::io(self.manifest_path(), err)),
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn push_mtime_forward(path: &Path) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
    }

    #[tokio::test]
    async fn refuses_to_overwrite_unmanaged_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("user.h"), "// mine").unwrap();

        let output = OutputGenerator::load(dir.path(), false).await.unwrap();
        let err = output.write_to("user.h", "// generated").await.unwrap_err();
        assert!(matches!(err, OutputError::UnmanagedFile { .. }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("user.h")).unwrap(),
            "// mine"
        );
    }

    #[tokio::test]
    async fn refuses_to_overwrite_externally_changed_file() {
        let dir = TempDir::new().unwrap();
        let output = OutputGenerator::load(dir.path(), false).await.unwrap();
        let path = output.write_to("a/b.cpp", "int x;").await.unwrap();

        push_mtime_forward(&path);
        let err = output.write_to("a/b.cpp", "int y;").await.unwrap_err();
        assert!(matches!(err, OutputError::ExternallyChanged { .. }));
    }

    #[tokio::test]
    async fn rewrites_unchanged_file() {
        let dir = TempDir::new().unwrap();
        let output = OutputGenerator::load(dir.path(), false).await.unwrap();
        output.write_to("same.h", "int x;").await.unwrap();
        output.write_to("same.h", "int x;").await.unwrap();
        assert_eq!(output.written_files().await.files.len(), 1);
    }

    #[tokio::test]
    async fn force_bypasses_checks() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("user.h"), "// mine").unwrap();

        let output = OutputGenerator::load(dir.path(), true).await.unwrap();
        output.write_to("user.h", "// generated").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("user.h")).unwrap(),
            "// generated"
        );
    }

    #[tokio::test]
    async fn manifest_survives_runs() {
        let dir = TempDir::new().unwrap();
        let output = OutputGenerator::load(dir.path(), false).await.unwrap();
        output
            .for_path("@host")
            .for_path("fib")
            .write_to("bridge.h", "// v1")
            .await
            .unwrap();
        output.save().await.unwrap();

        let reloaded = OutputGenerator::load(dir.path(), false).await.unwrap();
        let files = reloaded.written_files().await.files;
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["@host/fib/bridge.h"]);
        reloaded
            .write_to("@host/fib/bridge.h", "// v2")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn corrupted_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();
        let err = OutputGenerator::load(dir.path(), false).await.unwrap_err();
        assert!(matches!(err, OutputError::Manifest { .. }));
    }

    #[tokio::test]
    async fn copies_asset_directories() {
        let assets = TempDir::new().unwrap();
        std::fs::create_dir_all(assets.path().join("runtime/include")).unwrap();
        std::fs::write(assets.path().join("runtime/wasm-rt.c"), "c").unwrap();
        std::fs::write(assets.path().join("runtime/include/wasm-rt.h"), "h").unwrap();

        let dir = TempDir::new().unwrap();
        let output = OutputGenerator::load(dir.path(), false)
            .await
            .unwrap()
            .with_assets_directory(assets.path());
        let copied = output.copy_asset("runtime", "wasm-rt").await.unwrap();

        assert_eq!(copied.len(), 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("wasm-rt/include/wasm-rt.h")).unwrap(),
            "h"
        );
        assert!(output.copy_asset("runtime", "wasm-rt").await.is_ok());
    }

    #[tokio::test]
    async fn outdated_when_source_is_newer() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("m.wasm");
        let output = dir.path().join("m.c");
        std::fs::write(&output, "").unwrap();
        std::fs::write(&source, "").unwrap();

        let sources = vec![source.clone()];
        let outputs = vec![output.clone()];
        push_mtime_forward(&source);
        assert!(OutputGenerator::is_outdated(&sources, &outputs).await.unwrap());

        let output_file = std::fs::File::options().write(true).open(&output).unwrap();
        output_file
            .set_modified(SystemTime::now() + Duration::from_secs(120))
            .unwrap();
        assert!(!OutputGenerator::is_outdated(&sources, &outputs).await.unwrap());

        let missing = vec![dir.path().join("m.h")];
        assert!(OutputGenerator::is_outdated(&sources, &missing).await.unwrap());
    }

    #[tokio::test]
    async fn clean_removes_recorded_files() {
        let dir = TempDir::new().unwrap();
        let output = OutputGenerator::load(dir.path(), false).await.unwrap();
        output.write_to("x/a.h", "").await.unwrap();
        output.save().await.unwrap();
        std::fs::write(dir.path().join("user.txt"), "").unwrap();

        let reloaded = OutputGenerator::load(dir.path(), false).await.unwrap();
        let removed = reloaded.clean().await.unwrap();
        assert_eq!(removed, vec![dir.path().join("x/a.h")]);
        assert!(!dir.path().join(MANIFEST_FILE).exists());
        assert!(dir.path().join("user.txt").exists());
    }
}
