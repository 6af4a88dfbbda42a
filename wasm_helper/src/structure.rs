use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum NumType {
    I32,
    I64,
    F32,
    F64,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum VecType {
    V128,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum RefType {
    FuncRef,
    ExternRef,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ValType {
    Num(NumType),
    Vec(VecType),
    Ref(RefType),
}

impl ValType {
    pub const I32: Self = Self::Num(NumType::I32);
    pub const I64: Self = Self::Num(NumType::I64);
    pub const F32: Self = Self::Num(NumType::F32);
    pub const F64: Self = Self::Num(NumType::F64);
    pub const V128: Self = Self::Vec(VecType::V128);
    pub const FUNCREF: Self = Self::Ref(RefType::FuncRef);
    pub const EXTERNREF: Self = Self::Ref(RefType::ExternRef);

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x7f => Some(Self::I32),
            0x7e => Some(Self::I64),
            0x7d => Some(Self::F32),
            0x7c => Some(Self::F64),
            0x7b => Some(Self::V128),
            0x70 => Some(Self::FUNCREF),
            0x6f => Some(Self::EXTERNREF),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Num(NumType::I32) => "i32",
            Self::Num(NumType::I64) => "i64",
            Self::Num(NumType::F32) => "f32",
            Self::Num(NumType::F64) => "f64",
            Self::Vec(VecType::V128) => "v128",
            Self::Ref(RefType::FuncRef) => "funcref",
            Self::Ref(RefType::ExternRef) => "externref",
        }
    }
}

impl Display for ValType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RefType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x70 => Some(Self::FuncRef),
            0x6f => Some(Self::ExternRef),
            _ => None,
        }
    }
}

impl Display for RefType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        ValType::Ref(*self).fmt(f)
    }
}

pub type ResultType = Vec<ValType>;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Default)]
pub struct FuncType {
    pub parameters: ResultType,
    pub returns: ResultType,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

pub type MemType = Limits;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct TableType {
    pub limits: Limits,
    pub ref_type: RefType,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Mut {
    Const,
    Var,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct GlobalType {
    pub mutability: Mut,
    pub ty: ValType,
}

/// Section ids of the binary format, in the order they appear in a module.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum SectionId {
    Custom,
    Type,
    Import,
    Function,
    Table,
    Memory,
    Global,
    Export,
    Start,
    Element,
    Code,
    Data,
    DataCount,
}

impl SectionId {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Custom,
            1 => Self::Type,
            2 => Self::Import,
            3 => Self::Function,
            4 => Self::Table,
            5 => Self::Memory,
            6 => Self::Global,
            7 => Self::Export,
            8 => Self::Start,
            9 => Self::Element,
            10 => Self::Code,
            11 => Self::Data,
            12 => Self::DataCount,
            _ => return None,
        })
    }

    pub fn byte(&self) -> u8 {
        match self {
            Self::Custom => 0,
            Self::Type => 1,
            Self::Import => 2,
            Self::Function => 3,
            Self::Table => 4,
            Self::Memory => 5,
            Self::Global => 6,
            Self::Export => 7,
            Self::Start => 8,
            Self::Element => 9,
            Self::Code => 10,
            Self::Data => 11,
            Self::DataCount => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expr(pub Vec<Instr>);

// Only what module-level fixtures need: constant initializers and small
// function bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Unreachable,
    Nop,
    Return,
    Call(FuncIdx),
    Drop,

    LocalGet(LocalIdx),
    LocalSet(LocalIdx),
    GlobalGet(GlobalIdx),
    GlobalSet(GlobalIdx),

    RefNull(RefType),
    RefFunc(FuncIdx),

    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),

    I32Add,
    I32Sub,
    I32LtS,
    I64Add,
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub types: Vec<FuncType>,
    pub funcs: Vec<Func>,
    pub tables: Vec<Table>,
    pub mems: Vec<Mem>,
    pub globals: Vec<Global>,
    pub start: Option<FuncIdx>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub customs: Vec<CustomSection>,
}

pub type TypeIdx = u32;
pub type FuncIdx = u32;
pub type TableIdx = u32;
pub type MemIdx = u32;
pub type GlobalIdx = u32;
pub type LocalIdx = u32;

#[derive(Debug, Clone)]
pub struct Func {
    pub ty: TypeIdx,
    pub locals: Vec<ValType>,
    pub body: Expr,
}

pub type Table = TableType;
pub type Mem = MemType;

#[derive(Debug, Clone)]
pub struct Global {
    pub ty: GlobalType,
    pub init: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSection {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDesc {
    Func(FuncIdx),
    Table(TableIdx),
    Mem(MemIdx),
    Global(GlobalIdx),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub desc: ImportDesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDesc {
    Func(TypeIdx),
    Table(TableType),
    Mem(MemType),
    Global(GlobalType),
}
