use crate::error::{GenerateError, GenerateResult};
use crate::mangling::{mangle_module_name, mangle_name, mangle_symbol_name};
use crate::ty::{coerce_type_name, return_type_name};
use indexmap::IndexMap;
use polygen_parser::{
    FunctionSymbol, GlobalSymbol, MemorySymbol, Module, ModuleSymbol, NamedSymbol, SymbolKind,
    SymbolSet, TableSymbol,
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type Checksum = [u8; 32];

pub fn compute_checksum(bytes: &[u8]) -> Checksum {
    let mut checksum = [0u8; 32];
    checksum.copy_from_slice(&Sha256::digest(bytes));
    checksum
}

/// Name of the module stored at `path`: its file name without `.wasm`.
pub fn module_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.strip_suffix(".wasm") {
        Some(stem) => stem.to_string(),
        None => file_name,
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFunction {
    pub symbol: FunctionSymbol,
    /// Parameter types after coercion, in declaration order.
    pub parameter_type_names: Vec<&'static str>,
    pub return_type_name: String,
}

impl From<&FunctionSymbol> for GeneratedFunction {
    fn from(symbol: &FunctionSymbol) -> Self {
        Self {
            symbol: symbol.clone(),
            parameter_type_names: symbol
                .parameters
                .iter()
                .copied()
                .map(coerce_type_name)
                .collect(),
            return_type_name: return_type_name(&symbol.results),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedTarget {
    Function(GeneratedFunction),
    Table(TableSymbol),
    Memory(MemorySymbol),
    Global(GlobalSymbol),
}

impl From<&ModuleSymbol> for GeneratedTarget {
    fn from(symbol: &ModuleSymbol) -> Self {
        match symbol {
            ModuleSymbol::Function(function) => Self::Function(function.into()),
            ModuleSymbol::Table(table) => Self::Table(*table),
            ModuleSymbol::Memory(memory) => Self::Memory(*memory),
            ModuleSymbol::Global(global) => Self::Global(*global),
        }
    }
}

/// An import or export together with the identifiers the bridge uses for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSymbol {
    pub name: String,
    /// Source module, set for imports only.
    pub module: Option<String>,
    pub mangled_local_name: String,
    /// The wasm2c symbol implementing or accessing this entry.
    pub generated_function_name: String,
    pub target: GeneratedTarget,
}

impl GeneratedSymbol {
    fn new(
        name: &str,
        module: Option<&str>,
        owner_mangled_name: &str,
        target: &ModuleSymbol,
    ) -> Self {
        Self {
            name: name.to_string(),
            module: module.map(str::to_string),
            mangled_local_name: mangle_name(name),
            generated_function_name: mangle_symbol_name(name, owner_mangled_name),
            target: target.into(),
        }
    }

    pub fn function(&self) -> Option<&GeneratedFunction> {
        match &self.target {
            GeneratedTarget::Function(function) => Some(function),
            _ => None,
        }
    }
}

impl NamedSymbol for GeneratedSymbol {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SymbolKind {
        match self.target {
            GeneratedTarget::Function(..) => SymbolKind::Function,
            GeneratedTarget::Table(..) => SymbolKind::Table,
            GeneratedTarget::Memory(..) => SymbolKind::Memory,
            GeneratedTarget::Global(..) => SymbolKind::Global,
        }
    }
}

/// Everything one module imports from a single source module.
#[derive(Debug, Clone)]
pub struct ImportedModuleContext {
    pub name: String,
    pub mangled_name: String,
    pub imports: SymbolSet<GeneratedSymbol>,
}

impl ImportedModuleContext {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mangled_name: mangle_module_name(name),
            imports: SymbolSet::new(),
        }
    }

    /// Type wasm2c expects as the instance of this import module.
    pub fn context_type_name(&self) -> String {
        format!("w2c_{}", self.mangled_name)
    }

    /// Field holding this context inside the importing module's instance.
    pub fn root_context_field_name(&self) -> String {
        format!("ctx_{}", self.mangled_name)
    }

    pub fn header_file_name(&self) -> String {
        format!("{}-imports.h", self.mangled_name)
    }

    pub fn source_file_name(&self) -> String {
        format!("{}-imports.cpp", self.mangled_name)
    }

    fn contains(&self, symbol: &GeneratedSymbol) -> bool {
        self.imports
            .all_by_name(&symbol.name)
            .any(|existing| existing.kind() == symbol.kind())
    }
}

/// Codegen state of one module for the duration of a generation run.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    pub name: String,
    pub source_path: PathBuf,
    pub checksum: Checksum,
    pub module: Module,
    pub mangled_name: String,
    pub class_name: String,
    pub imports: SymbolSet<GeneratedSymbol>,
    pub exports: SymbolSet<GeneratedSymbol>,
    pub imported_modules: Vec<Arc<ImportedModuleContext>>,
}

impl ModuleContext {
    /// Decodes `bytes` and builds the context of the module found at
    /// `source_path`.
    pub fn new(bytes: &[u8], source_path: impl Into<PathBuf>) -> GenerateResult<Self> {
        let source_path = source_path.into();
        let module = Module::from_bytes(bytes).map_err(|source| GenerateError::Decode {
            path: source_path.clone(),
            source,
        })?;
        let name = module_name_from_path(&source_path);
        Ok(Self::from_module(
            name,
            source_path,
            compute_checksum(bytes),
            module,
        ))
    }

    pub fn from_module(
        name: String,
        source_path: PathBuf,
        checksum: Checksum,
        module: Module,
    ) -> Self {
        let mangled_name = mangle_module_name(&name);
        let class_name = capitalize(&mangled_name);

        let mut imports = SymbolSet::new();
        let mut by_source: IndexMap<&str, ImportedModuleContext> = IndexMap::new();
        for import in module.imports() {
            let imported = by_source
                .entry(import.module.as_str())
                .or_insert_with(|| ImportedModuleContext::new(&import.module));
            let symbol = GeneratedSymbol::new(
                &import.name,
                Some(&import.module),
                &imported.mangled_name,
                &import.target,
            );
            imported.imports.insert(symbol.clone());
            imports.insert(symbol);
        }
        let imported_modules = by_source.into_values().map(Arc::new).collect();

        let exports = module
            .exports()
            .iter()
            .map(|export| GeneratedSymbol::new(&export.name, None, &mangled_name, &export.target))
            .collect();

        log::debug!(
            "built context for module {name} ({} import(s), {} export(s))",
            module.imports().len(),
            module.exports().len()
        );

        Self {
            name,
            source_path,
            checksum,
            module,
            mangled_name,
            class_name,
            imports,
            exports,
            imported_modules,
        }
    }

    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }

    pub fn context_class_name(&self) -> String {
        format!("{}ModuleContext", self.class_name)
    }

    pub fn module_factory_function_name(&self) -> String {
        format!("create{}Module", self.class_name)
    }

    pub fn exports_function_name(&self) -> String {
        format!("create{}Exports", self.class_name)
    }

    pub fn static_module_class_name(&self) -> String {
        format!("WASM{}Module", self.class_name)
    }

    /// The instance type wasm2c generates for this module.
    pub fn root_context_type_name(&self) -> String {
        format!("w2c_{}", self.mangled_name)
    }

    pub fn instantiate_function_name(&self) -> String {
        format!("wasm2c_{}_instantiate", self.mangled_name)
    }

    pub fn exported(&self, kind: SymbolKind) -> impl Iterator<Item = &GeneratedSymbol> {
        self.exports.of_kind(kind)
    }

    pub fn imported_module(&self, name: &str) -> GenerateResult<&ImportedModuleContext> {
        self.imported_modules
            .iter()
            .find(|imported| imported.name == name)
            .map(Arc::as_ref)
            .ok_or_else(|| GenerateError::MissingImportContext {
                module: self.name.clone(),
                import_module: name.to_string(),
            })
    }
}

/// State shared by all modules of one generation run.
#[derive(Debug, Clone)]
pub struct SharedContext {
    modules: Vec<Arc<ModuleContext>>,
    imported_modules: Vec<ImportedModuleContext>,
}

impl SharedContext {
    /// Sorts `modules` by name and merges their imported modules by source
    /// module name.
    pub fn new(mut modules: Vec<Arc<ModuleContext>>) -> GenerateResult<Self> {
        modules.sort_by(|a, b| a.name.cmp(&b.name));

        let mut merged: IndexMap<String, ImportedModuleContext> = IndexMap::new();
        for module in &modules {
            for import in &module.imports {
                let Some(source) = &import.module else {
                    continue;
                };
                let imported = module.imported_module(source)?;
                let target = merged
                    .entry(imported.name.clone())
                    .or_insert_with(|| ImportedModuleContext::new(&imported.name));
                if target.contains(import) {
                    let existing = target
                        .imports
                        .all_by_name(&import.name)
                        .find(|existing| existing.kind() == import.kind());
                    if existing.map(|existing| &existing.target) != Some(&import.target) {
                        log::warn!(
                            "{}.{} is imported with different types, keeping the first one",
                            source,
                            import.name
                        );
                    }
                    continue;
                }
                target.imports.insert(import.clone());
            }
        }

        Ok(Self {
            modules,
            imported_modules: merged.into_values().collect(),
        })
    }

    pub fn modules(&self) -> &[Arc<ModuleContext>] {
        &self.modules
    }

    pub fn imported_modules(&self) -> &[ImportedModuleContext] {
        &self.imported_modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_helper::{self as wasm, Serializer, ValType};

    fn fixture(import_modules: &[(&str, &str)]) -> Vec<u8> {
        wasm::Module {
            types: vec![wasm::FuncType {
                parameters: vec![ValType::I32, ValType::F64],
                returns: vec![ValType::I64],
            }],
            imports: import_modules
                .iter()
                .map(|(module, name)| wasm::Import {
                    module: module.to_string(),
                    name: name.to_string(),
                    desc: wasm::ImportDesc::Func(0),
                })
                .collect(),
            funcs: vec![wasm::Func {
                ty: 0,
                locals: vec![],
                body: wasm::Expr(vec![wasm::Instr::Unreachable]),
            }],
            exports: vec![wasm::Export {
                name: "do_work".to_string(),
                desc: wasm::ExportDesc::Func(import_modules.len() as u32),
            }],
            ..Default::default()
        }
        .to_bytes()
    }

    #[test]
    fn module_names_come_from_file_names() {
        assert_eq!(module_name_from_path(Path::new("dir/my_lib.wasm")), "my_lib");
        assert_eq!(module_name_from_path(Path::new("plain")), "plain");
        assert_eq!(module_name_from_path(Path::new("a.b.wasm")), "a.b");
    }

    #[test]
    fn builds_names_for_module_and_symbols() {
        let bytes = fixture(&[("env", "log_value")]);
        let context = ModuleContext::new(&bytes, "assets/my_lib.wasm").unwrap();

        assert_eq!(context.name, "my_lib");
        assert_eq!(context.mangled_name, "my__lib");
        assert_eq!(context.class_name, "My__lib");
        assert_eq!(context.context_class_name(), "My__libModuleContext");
        assert_eq!(context.module_factory_function_name(), "createMy__libModule");
        assert_eq!(context.root_context_type_name(), "w2c_my__lib");
        assert_eq!(context.instantiate_function_name(), "wasm2c_my__lib_instantiate");
        assert_eq!(context.checksum, compute_checksum(&bytes));
        assert_eq!(context.checksum_hex().len(), 64);

        let export = context.exports.by_name("do_work").unwrap();
        assert_eq!(export.generated_function_name, "w2c_my__lib_do_work");
        assert_eq!(
            export.function().unwrap().parameter_type_names,
            vec!["u32", "f64"]
        );
        assert_eq!(export.function().unwrap().return_type_name, "u64");

        let import = context.imports.by_name("log_value").unwrap();
        assert_eq!(import.module.as_deref(), Some("env"));
        assert_eq!(import.generated_function_name, "w2c_env_log_value");
    }

    #[test]
    fn imports_are_grouped_by_source_module() {
        let bytes = fixture(&[("env", "a"), ("math_utils", "b"), ("env", "c")]);
        let context = ModuleContext::new(&bytes, "m.wasm").unwrap();

        let names: Vec<_> = context
            .imported_modules
            .iter()
            .map(|imported| imported.name.as_str())
            .collect();
        assert_eq!(names, vec!["env", "math_utils"]);

        let env = context.imported_module("env").unwrap();
        assert_eq!(env.imports.len(), 2);
        assert_eq!(env.context_type_name(), "w2c_env");
        assert_eq!(env.root_context_field_name(), "ctx_env");

        let math = context.imported_module("math_utils").unwrap();
        assert_eq!(math.mangled_name, "math__utils");
        assert_eq!(
            math.imports.by_name("b").unwrap().generated_function_name,
            "w2c_math__utils_b"
        );

        assert!(matches!(
            context.imported_module("missing"),
            Err(GenerateError::MissingImportContext { .. })
        ));
    }

    #[test]
    fn shared_context_merges_imports_and_sorts_modules() {
        let second = ModuleContext::new(&fixture(&[("env", "a"), ("env", "b")]), "zeta.wasm").unwrap();
        let first = ModuleContext::new(&fixture(&[("env", "a")]), "alpha.wasm").unwrap();
        let shared = SharedContext::new(vec![Arc::new(second), Arc::new(first)]).unwrap();

        let names: Vec<_> = shared.modules().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(shared.imported_modules().len(), 1);
        let env_names: Vec<_> = shared.imported_modules()[0].imports.names().collect();
        assert_eq!(env_names, vec!["a", "b"]);
    }
}
