use indexmap::IndexMap;
use std::fmt::{Display, Formatter};
use wasm_helper::{FuncType, GlobalType, Limits, Mut, RefType, TableType, ValType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    Function,
    Table,
    Memory,
    Global,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 4] = [
        SymbolKind::Function,
        SymbolKind::Table,
        SymbolKind::Memory,
        SymbolKind::Global,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Table => "table",
            Self::Memory => "memory",
            Self::Global => "global",
        }
    }
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSymbol {
    pub parameters: Vec<ValType>,
    pub results: Vec<ValType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalSymbol {
    pub ty: ValType,
    pub mutable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemorySymbol {
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableSymbol {
    pub element_type: RefType,
    pub min: u32,
    pub max: Option<u32>,
}

/// The type-level shape of one module declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleSymbol {
    Function(FunctionSymbol),
    Table(TableSymbol),
    Memory(MemorySymbol),
    Global(GlobalSymbol),
}

impl ModuleSymbol {
    pub fn kind(&self) -> SymbolKind {
        match self {
            Self::Function(..) => SymbolKind::Function,
            Self::Table(..) => SymbolKind::Table,
            Self::Memory(..) => SymbolKind::Memory,
            Self::Global(..) => SymbolKind::Global,
        }
    }
}

impl From<&FuncType> for FunctionSymbol {
    fn from(ty: &FuncType) -> Self {
        Self {
            parameters: ty.parameters.clone(),
            results: ty.returns.clone(),
        }
    }
}

impl From<GlobalType> for GlobalSymbol {
    fn from(ty: GlobalType) -> Self {
        Self {
            ty: ty.ty,
            mutable: ty.mutability == Mut::Var,
        }
    }
}

impl From<Limits> for MemorySymbol {
    fn from(limits: Limits) -> Self {
        Self {
            min: limits.min,
            max: limits.max,
        }
    }
}

impl From<TableType> for TableSymbol {
    fn from(ty: TableType) -> Self {
        Self {
            element_type: ty.ref_type,
            min: ty.limits.min,
            max: ty.limits.max,
        }
    }
}

impl From<FunctionSymbol> for ModuleSymbol {
    fn from(symbol: FunctionSymbol) -> Self {
        Self::Function(symbol)
    }
}

impl From<TableSymbol> for ModuleSymbol {
    fn from(symbol: TableSymbol) -> Self {
        Self::Table(symbol)
    }
}

impl From<MemorySymbol> for ModuleSymbol {
    fn from(symbol: MemorySymbol) -> Self {
        Self::Memory(symbol)
    }
}

impl From<GlobalSymbol> for ModuleSymbol {
    fn from(symbol: GlobalSymbol) -> Self {
        Self::Global(symbol)
    }
}

/// Anything that can be stored in a [`SymbolSet`].
pub trait NamedSymbol {
    fn name(&self) -> &str;
    fn kind(&self) -> SymbolKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(usize);

impl SymbolId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Insertion-ordered arena of symbols with lookup by name and by kind. The
/// indexes are only maintained by [`SymbolSet::insert`].
#[derive(Debug, Clone)]
pub struct SymbolSet<T> {
    symbols: Vec<T>,
    by_name: IndexMap<String, Vec<SymbolId>>,
    by_kind: IndexMap<SymbolKind, Vec<SymbolId>>,
}

impl<T> Default for SymbolSet<T> {
    fn default() -> Self {
        Self {
            symbols: Vec::default(),
            by_name: IndexMap::default(),
            by_kind: IndexMap::default(),
        }
    }
}

impl<T: NamedSymbol> SymbolSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: T) -> SymbolId {
        let id = SymbolId(self.symbols.len());
        self.by_name
            .entry(symbol.name().to_string())
            .or_insert_with(Vec::new)
            .push(id);
        self.by_kind.entry(symbol.kind()).or_insert_with(Vec::new).push(id);
        self.symbols.push(symbol);
        id
    }

    pub fn get(&self, id: SymbolId) -> Option<&T> {
        self.symbols.get(id.0)
    }

    /// The first symbol inserted under `name`.
    pub fn by_name(&self, name: &str) -> Option<&T> {
        self.by_name
            .get(name)
            .and_then(|ids| ids.first())
            .and_then(|id| self.get(*id))
    }

    pub fn all_by_name<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a T> + 'a {
        self.resolve_ids(self.by_name.get(name))
    }

    pub fn of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &T> + '_ {
        self.resolve_ids(self.by_kind.get(&kind))
    }

    pub fn count_of_kind(&self, kind: SymbolKind) -> usize {
        self.by_kind.get(&kind).map_or(0, |ids| ids.len())
    }

    fn resolve_ids<'a>(
        &'a self,
        ids: Option<&'a Vec<SymbolId>>,
    ) -> impl Iterator<Item = &'a T> + 'a {
        ids.into_iter()
            .flatten()
            .filter_map(move |id| self.symbols.get(id.0))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.symbols.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl<T: NamedSymbol> FromIterator<T> for SymbolSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        for symbol in iter {
            set.insert(symbol);
        }
        set
    }
}

impl<'a, T> IntoIterator for &'a SymbolSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}
