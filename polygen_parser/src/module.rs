use crate::error::{DecodeErrorKind, DecodeResult};
use crate::section::{Located, Section, SectionReader, SectionRecord};
use crate::symbols::{
    FunctionSymbol, GlobalSymbol, MemorySymbol, ModuleSymbol, NamedSymbol, SymbolKind,
    TableSymbol,
};
use std::collections::BTreeSet;
use wasm_helper::{
    CustomSection, Export, ExportDesc, FuncType, GlobalType, Import, ImportDesc, Limits,
    SectionId, TableType, TypeIdx,
};

/// Symbols of one kind addressed the way instructions and descriptors
/// address them: imported entries first, then local declarations.
#[derive(Debug, Clone)]
pub struct IndexSpace<T> {
    entries: Vec<T>,
    imported: usize,
}

impl<T> Default for IndexSpace<T> {
    fn default() -> Self {
        Self {
            entries: Vec::default(),
            imported: 0,
        }
    }
}

impl<T> IndexSpace<T> {
    fn push_imported(&mut self, entry: T) {
        debug_assert_eq!(self.imported, self.entries.len());
        self.entries.push(entry);
        self.imported += 1;
    }

    fn push_local(&mut self, entry: T) {
        self.entries.push(entry);
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.entries.get(index as usize)
    }

    pub fn imported(&self) -> &[T] {
        &self.entries[..self.imported]
    }

    pub fn local(&self) -> &[T] {
        &self.entries[self.imported..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleImport {
    pub module: String,
    pub name: String,
    pub target: ModuleSymbol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleExport {
    pub name: String,
    pub target: ModuleSymbol,
    /// Position of the target in its kind's index space.
    pub index: u32,
}

impl NamedSymbol for ModuleImport {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SymbolKind {
        self.target.kind()
    }
}

impl NamedSymbol for ModuleExport {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SymbolKind {
        self.target.kind()
    }
}

/// A decoded binary, reduced to its module-level declarations. Immutable
/// once built.
#[derive(Debug, Clone, Default)]
pub struct Module {
    functions: IndexSpace<FunctionSymbol>,
    tables: IndexSpace<TableSymbol>,
    memories: IndexSpace<MemorySymbol>,
    globals: IndexSpace<GlobalSymbol>,
    imports: Vec<ModuleImport>,
    exports: Vec<ModuleExport>,
    custom_sections: Vec<CustomSection>,
}

impl Module {
    pub fn from_bytes(bytes: &[u8]) -> DecodeResult<Self> {
        let mut builder = ModuleBuilder::default();
        for record in SectionReader::new(bytes)? {
            builder.add(record?)?;
        }
        let module = builder.build()?;
        log::debug!(
            "decoded module: {} function(s), {} table(s), {} memor(ies), {} global(s), {} import(s), {} export(s)",
            module.functions.len(),
            module.tables.len(),
            module.memories.len(),
            module.globals.len(),
            module.imports.len(),
            module.exports.len(),
        );
        Ok(module)
    }

    /// Locally declared functions, in declaration order.
    pub fn functions(&self) -> &[FunctionSymbol] {
        self.functions.local()
    }

    pub fn tables(&self) -> &[TableSymbol] {
        self.tables.local()
    }

    pub fn memories(&self) -> &[MemorySymbol] {
        self.memories.local()
    }

    pub fn globals(&self) -> &[GlobalSymbol] {
        self.globals.local()
    }

    pub fn imports(&self) -> &[ModuleImport] {
        &self.imports
    }

    pub fn exports(&self) -> &[ModuleExport] {
        &self.exports
    }

    pub fn custom_sections(&self) -> &[CustomSection] {
        &self.custom_sections
    }

    pub fn function_space(&self) -> &IndexSpace<FunctionSymbol> {
        &self.functions
    }

    pub fn table_space(&self) -> &IndexSpace<TableSymbol> {
        &self.tables
    }

    pub fn memory_space(&self) -> &IndexSpace<MemorySymbol> {
        &self.memories
    }

    pub fn global_space(&self) -> &IndexSpace<GlobalSymbol> {
        &self.globals
    }

    pub fn import_count(&self, kind: SymbolKind) -> usize {
        match kind {
            SymbolKind::Function => self.functions.imported,
            SymbolKind::Table => self.tables.imported,
            SymbolKind::Memory => self.memories.imported,
            SymbolKind::Global => self.globals.imported,
        }
    }

    pub fn export(&self, name: &str) -> Option<&ModuleExport> {
        self.exports.iter().find(|export| export.name == name)
    }

    /// Looks `index` up in the combined index space of `kind`.
    pub fn resolve(&self, kind: SymbolKind, index: u32) -> Option<ModuleSymbol> {
        match kind {
            SymbolKind::Function => self.functions.get(index).cloned().map(Into::into),
            SymbolKind::Table => self.tables.get(index).copied().map(Into::into),
            SymbolKind::Memory => self.memories.get(index).copied().map(Into::into),
            SymbolKind::Global => self.globals.get(index).copied().map(Into::into),
        }
    }
}

#[derive(Default)]
struct ModuleBuilder {
    seen: BTreeSet<SectionId>,
    types: Vec<FuncType>,
    imports: Vec<Located<Import>>,
    functions: Vec<Located<TypeIdx>>,
    tables: Vec<TableType>,
    memories: Vec<Limits>,
    globals: Vec<GlobalType>,
    exports: Vec<Located<Export>>,
    custom_sections: Vec<CustomSection>,
}

impl ModuleBuilder {
    fn add(&mut self, record: SectionRecord) -> DecodeResult<()> {
        if record.id != SectionId::Custom && !self.seen.insert(record.id) {
            return Err(DecodeErrorKind::DuplicateSection(record.id).at(record.offset));
        }

        match record.section {
            Section::Custom(custom) => self.custom_sections.push(custom),
            Section::Type(types) => self.types = types,
            Section::Import(imports) => self.imports = imports,
            Section::Function(functions) => self.functions = functions,
            Section::Table(tables) => self.tables = tables,
            Section::Memory(memories) => self.memories = memories,
            Section::Global(globals) => self.globals = globals,
            Section::Export(exports) => self.exports = exports,
            Section::Skipped(..) => (),
        }
        Ok(())
    }

    fn build(self) -> DecodeResult<Module> {
        let mut module = Module {
            custom_sections: self.custom_sections,
            ..Module::default()
        };

        // imports occupy the low end of every index space
        for Located { offset, item } in self.imports {
            let Import { module: from, name, desc } = item;
            let target = match desc {
                ImportDesc::Func(index) => {
                    let Some(ty) = self.types.get(index as usize) else {
                        return Err(DecodeErrorKind::UnresolvedImport {
                            module: from,
                            name,
                            index,
                        }
                        .at(offset));
                    };
                    let symbol = FunctionSymbol::from(ty);
                    module.functions.push_imported(symbol.clone());
                    ModuleSymbol::Function(symbol)
                }
                ImportDesc::Table(ty) => {
                    let symbol = TableSymbol::from(ty);
                    module.tables.push_imported(symbol);
                    ModuleSymbol::Table(symbol)
                }
                ImportDesc::Mem(limits) => {
                    let symbol = MemorySymbol::from(limits);
                    module.memories.push_imported(symbol);
                    ModuleSymbol::Memory(symbol)
                }
                ImportDesc::Global(ty) => {
                    let symbol = GlobalSymbol::from(ty);
                    module.globals.push_imported(symbol);
                    ModuleSymbol::Global(symbol)
                }
            };
            module.imports.push(ModuleImport {
                module: from,
                name,
                target,
            });
        }

        for Located { offset, item } in self.functions {
            let ty = self
                .types
                .get(item as usize)
                .ok_or_else(|| DecodeErrorKind::UnresolvedType(item).at(offset))?;
            module.functions.push_local(FunctionSymbol::from(ty));
        }
        for table in self.tables {
            module.tables.push_local(table.into());
        }
        for memory in self.memories {
            module.memories.push_local(memory.into());
        }
        for global in self.globals {
            module.globals.push_local(global.into());
        }

        for Located { offset, item } in self.exports {
            let (kind, index) = match item.desc {
                ExportDesc::Func(index) => (SymbolKind::Function, index),
                ExportDesc::Table(index) => (SymbolKind::Table, index),
                ExportDesc::Mem(index) => (SymbolKind::Memory, index),
                ExportDesc::Global(index) => (SymbolKind::Global, index),
            };
            let Some(target) = module.resolve(kind, index) else {
                return Err(DecodeErrorKind::UnresolvedExport {
                    name: item.name,
                    kind,
                    index,
                }
                .at(offset));
            };
            module.exports.push(ModuleExport {
                name: item.name,
                target,
                index,
            });
        }

        Ok(module)
    }
}
