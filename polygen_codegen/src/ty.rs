use wasm_helper::{NumType, RefType, ValType, VecType};

/// The C type a value of `ty` has in wasm2c signatures. Signed integers are
/// folded into their unsigned counterparts to match the signatures wasm2c
/// emits; this is a compatibility shim, keep it confined to this table.
pub fn coerce_type_name(ty: ValType) -> &'static str {
    match ty {
        ValType::Num(NumType::I32) => "u32",
        ValType::Num(NumType::I64) => "u64",
        ValType::Num(NumType::F32) => "f32",
        ValType::Num(NumType::F64) => "f64",
        ValType::Vec(VecType::V128) => "v128",
        ValType::Ref(RefType::FuncRef) => "wasm_rt_funcref_t",
        ValType::Ref(RefType::ExternRef) => "wasm_rt_externref_t",
    }
}

/// Member prefix wasm2c uses inside `struct wasm_multi_*`.
pub fn multi_value_prefix(ty: ValType) -> char {
    match ty {
        ValType::Num(NumType::I32) => 'i',
        ValType::Num(NumType::I64) => 'j',
        ValType::Num(NumType::F32) => 'f',
        ValType::Num(NumType::F64) => 'd',
        ValType::Vec(VecType::V128) => 'o',
        ValType::Ref(RefType::FuncRef) => 'r',
        ValType::Ref(RefType::ExternRef) => 'e',
    }
}

/// Field of a multi-value result struct holding result number `index`.
pub fn multi_value_field(ty: ValType, index: usize) -> String {
    format!("{}{}", multi_value_prefix(ty), index)
}

pub fn return_type_name(results: &[ValType]) -> String {
    match results {
        [] => "void".to_string(),
        [ty] => coerce_type_name(*ty).to_string(),
        _ => {
            let prefixes: String = results.iter().copied().map(multi_value_prefix).collect();
            format!("struct wasm_multi_{prefixes}")
        }
    }
}

pub fn table_c_type(element_type: RefType) -> &'static str {
    match element_type {
        RefType::FuncRef => "wasm_rt_funcref_table_t",
        RefType::ExternRef => "wasm_rt_externref_table_t",
    }
}

/// Runtime class wrapping a table of `element_type` on the JS side.
pub fn table_class_name(element_type: RefType) -> &'static str {
    match element_type {
        RefType::FuncRef => "FuncRefTable",
        RefType::ExternRef => "ExternRefTable",
    }
}

/// How a value crosses the JS boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marshaling {
    Number,
    BigInt,
    Unsupported,
}

impl Marshaling {
    pub fn of(ty: ValType) -> Self {
        match ty {
            ValType::Num(NumType::I64) => Self::BigInt,
            ValType::Num(..) => Self::Number,
            ValType::Vec(..) | ValType::Ref(..) => Self::Unsupported,
        }
    }

    pub fn all_supported(types: &[ValType]) -> bool {
        types
            .iter()
            .all(|ty| Self::of(*ty) != Self::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_return_type {
        ($name:ident, $results:expr, $expected:expr) => {
            #[test]
            fn $name() {
                let results: &[ValType] = $results;
                assert_eq!(return_type_name(results), $expected);
            }
        };
    }

    test_return_type! {no_result, &[], "void"}
    test_return_type! {signed_result_is_unsigned, &[ValType::I32], "u32"}
    test_return_type! {float_result_is_unchanged, &[ValType::F64], "f64"}
    test_return_type! {
        multi_value_struct,
        &[ValType::I32, ValType::I64, ValType::F32, ValType::F64],
        "struct wasm_multi_ijfd"
    }
    test_return_type! {multi_value_refs, &[ValType::FUNCREF, ValType::EXTERNREF], "struct wasm_multi_re"}

    #[test]
    fn multi_value_fields_are_indexed() {
        assert_eq!(multi_value_field(ValType::I64, 1), "j1");
        assert_eq!(multi_value_field(ValType::V128, 0), "o0");
    }

    #[test]
    fn i64_crosses_as_bigint() {
        assert_eq!(Marshaling::of(ValType::I64), Marshaling::BigInt);
        assert_eq!(Marshaling::of(ValType::F32), Marshaling::Number);
        assert!(!Marshaling::all_supported(&[ValType::I32, ValType::V128]));
    }
}
