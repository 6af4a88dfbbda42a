use crate::context::{module_name_from_path, ModuleContext, SharedContext};
use crate::error::{GenerateError, GenerateResult};
use crate::module_ref::ModuleReference;
use crate::output::OutputGenerator;
use crate::plugin::{
    DumpMetadata, EmbedWasmRuntime, HostProjectGeneratedContext, ModuleGeneratedContext, Plugin,
};
use crate::templates::{export_bridge, host, import_bridge, static_module};
use crate::wasm2c::Wasm2c;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Directory of the project aggregating every generated module.
pub const HOST_PROJECT_DIR: &str = "@host";
/// Directory of the import bridges, inside the host project.
pub const IMPORTS_DIR: &str = "imports";
/// Directory of the JS module references.
pub const JS_MODULES_DIR: &str = "modules";

#[derive(Debug, Clone)]
pub struct CodegenOptions {
    pub output_directory: PathBuf,
    /// Where runtime assets such as `wasm-rt` are copied from.
    pub assets_directory: Option<PathBuf>,
    /// Put every module under [`HOST_PROJECT_DIR`].
    pub single_project: bool,
    pub force_generate: bool,
    pub generate_metadata: bool,
    /// Accept JS booleans where exported functions expect numbers.
    pub coerce_booleans: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("node_modules/.polygen-out"),
            assets_directory: None,
            single_project: true,
            force_generate: false,
            generate_metadata: false,
            coerce_booleans: false,
        }
    }
}

#[derive(Debug)]
pub struct ModuleFailure {
    pub path: PathBuf,
    pub error: GenerateError,
}

#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Generated modules, sorted by name.
    pub modules: Vec<Arc<ModuleContext>>,
    pub failures: Vec<ModuleFailure>,
    /// Set when the host project could not be generated. Module outputs
    /// written before it are still recorded in the manifest.
    pub host_failure: Option<GenerateError>,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.host_failure.is_none()
    }
}

pub struct Codegen {
    options: CodegenOptions,
    output: OutputGenerator,
    wasm2c: Option<Wasm2c>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Codegen {
    /// Prepares a generation run. Without `wasm2c` the C sources of the
    /// modules are not regenerated.
    pub async fn create(options: CodegenOptions, wasm2c: Option<Wasm2c>) -> GenerateResult<Self> {
        let mut output =
            OutputGenerator::load(&options.output_directory, options.force_generate).await?;
        let mut plugins: Vec<Arc<dyn Plugin>> = Vec::new();
        if let Some(assets) = &options.assets_directory {
            output = output.with_assets_directory(assets);
            plugins.push(Arc::new(EmbedWasmRuntime));
        }
        if options.generate_metadata {
            plugins.push(Arc::new(DumpMetadata));
        }

        Ok(Self {
            options,
            output,
            wasm2c,
            plugins,
        })
    }

    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn options(&self) -> &CodegenOptions {
        &self.options
    }

    pub fn output(&self) -> &OutputGenerator {
        &self.output
    }

    fn host_output(&self) -> OutputGenerator {
        if self.options.single_project {
            self.output.for_path(HOST_PROJECT_DIR)
        } else {
            self.output.clone()
        }
    }

    fn module_output(&self, name: &str) -> OutputGenerator {
        self.host_output().for_path(name)
    }

    /// Generates everything derived from the single module at `path`.
    pub async fn generate_module(&self, path: &Path) -> GenerateResult<Arc<ModuleContext>> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| GenerateError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let module = Arc::new(ModuleContext::new(&bytes, path)?);
        let output = self.module_output(&module.name);

        let (c_sources, bridge) = tokio::join!(
            self.generate_c_sources(&module, &output),
            self.generate_module_bridge(&module, &output)
        );
        c_sources?;
        bridge?;
        self.generate_js_module(&module).await?;

        for plugin in &self.plugins {
            log::debug!("running {} for {}", plugin.name(), module.name);
            plugin
                .module_generated(ModuleGeneratedContext {
                    module: &module,
                    output: &output,
                })
                .await?;
        }

        log::info!("generated module {} ({})", module.name, module.checksum_hex());
        Ok(module)
    }

    async fn generate_c_sources(
        &self,
        module: &ModuleContext,
        output: &OutputGenerator,
    ) -> GenerateResult<()> {
        let Some(wasm2c) = &self.wasm2c else {
            log::debug!("wasm2c disabled, skipping C sources of {}", module.name);
            return Ok(());
        };

        let sources = [module.source_path.clone()];
        let outputs = Wasm2c::output_files(output.dir(), &module.name);
        let generate = {
            let outputs = &outputs;
            move || async move {
                for path in outputs {
                    output.check_writable(path).await?;
                }
                let files = wasm2c
                    .generate(&module.source_path, output.dir(), &module.name)
                    .await?;
                Ok::<_, GenerateError>(files)
            }
        };
        let generated = output.generating(&sources, &outputs, generate).await?;

        for file in generated.into_iter().flatten() {
            output.record(file).await?;
        }
        Ok(())
    }

    async fn generate_module_bridge(
        &self,
        module: &ModuleContext,
        output: &OutputGenerator,
    ) -> GenerateResult<()> {
        output
            .write_all_to([
                (export_bridge::HEADER_FILE, export_bridge::header(module)),
                (
                    export_bridge::SOURCE_FILE,
                    export_bridge::source(module, self.options.coerce_booleans),
                ),
                (static_module::HEADER_FILE, static_module::header(module)),
                (static_module::SOURCE_FILE, static_module::source(module)),
            ])
            .await?;
        Ok(())
    }

    async fn generate_js_module(&self, module: &ModuleContext) -> GenerateResult<PathBuf> {
        let source = ModuleReference::new(&module.name, module.checksum).to_js_source()?;
        let path = self
            .output
            .for_path(JS_MODULES_DIR)
            .write_to(format!("{}.js", module.name), source)
            .await?;
        Ok(path)
    }

    /// Generates every module concurrently, then the host project from the
    /// modules that succeeded. A module failing does not stop the others, and a
    /// host project failure lands in the report rather than being returned.
    pub async fn generate_all(self: &Arc<Self>, paths: &[PathBuf]) -> GenerateResult<GenerationReport> {
        let mut report = GenerationReport::default();
        let mut names = HashSet::new();
        let mut tasks = JoinSet::new();

        for path in paths {
            let name = module_name_from_path(path);
            if !names.insert(name.clone()) {
                let error = GenerateError::DuplicateModuleName {
                    name,
                    path: path.clone(),
                };
                log::error!("{error}");
                report.failures.push(ModuleFailure {
                    path: path.clone(),
                    error,
                });
                continue;
            }

            let codegen = Arc::clone(self);
            let path = path.clone();
            tasks.spawn(async move {
                let result = codegen.generate_module(&path).await;
                (path, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (path, result) = joined?;
            match result {
                Ok(module) => report.modules.push(module),
                Err(error) => {
                    log::error!("failed to generate {}: {error}", path.display());
                    report.failures.push(ModuleFailure { path, error });
                }
            }
        }
        report.modules.sort_by(|a, b| a.name.cmp(&b.name));
        report.failures.sort_by(|a, b| a.path.cmp(&b.path));

        let host = async {
            let shared = SharedContext::new(report.modules.clone())?;
            self.generate_host_project(&shared).await
        };
        let host_result = host.await;
        if let Err(error) = host_result {
            log::error!("failed to generate the host project: {error}");
            report.host_failure = Some(error);
        }
        Ok(report)
    }

    /// Writes the loader aggregating every module and the import bridges,
    /// then runs the host phase of the plugins.
    pub async fn generate_host_project(&self, shared: &SharedContext) -> GenerateResult<()> {
        let output = self.host_output();
        output.write_to(host::LOADER_FILE, host::loader(shared)).await?;
        self.generate_imported_modules(shared).await?;

        for plugin in &self.plugins {
            log::debug!("running {} for the host project", plugin.name());
            plugin
                .host_project_generated(HostProjectGeneratedContext {
                    shared,
                    output: &output,
                })
                .await?;
        }
        Ok(())
    }

    pub async fn generate_imported_modules(&self, shared: &SharedContext) -> GenerateResult<()> {
        let output = self.host_output().for_path(IMPORTS_DIR);
        for imported in shared.imported_modules() {
            output
                .write_all_to([
                    (imported.header_file_name(), import_bridge::header(imported)),
                    (imported.source_file_name(), import_bridge::source(imported)),
                ])
                .await?;
        }
        Ok(())
    }

    /// Persists the output manifest. Call once after generation.
    pub async fn finalize(&self) -> GenerateResult<()> {
        self.output.save().await?;
        Ok(())
    }
}
