//! Identifier mangling compatible with the wasm2c C writer.
//!
//! Every name that ends up in a generated C/C++ identifier goes through
//! [`mangle`], so the generated bridge links against the symbols wasm2c
//! emits for the same module.

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Any,
    Zero,
    ZeroX,
    ZeroXHexDigit,
}

fn escape(out: &mut String, byte: u8) {
    out.push_str(&format!("0x{:02X}", byte));
}

/// Mangles `name` into `[0-9A-Za-z_]`. With `double_underscores` every
/// underscore that is kept is written twice.
pub fn mangle(name: &str, double_underscores: bool) -> String {
    let bytes = name.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut state = State::Any;
    let mut last_was_underscore = false;

    for (i, &c) in bytes.iter().enumerate() {
        state = match (state, c) {
            (State::Any, b'0') => State::Zero,
            (State::Zero, b'x') => State::ZeroX,
            (State::ZeroX, c) if c.is_ascii_hexdigit() => State::ZeroXHexDigit,
            _ => State::Any,
        };

        let is_edge = i == 0 || i == bytes.len() - 1;
        if state == State::ZeroXHexDigit
            || (c == b'_' && (is_edge || last_was_underscore))
            || !(c.is_ascii_alphanumeric() || c == b'_')
        {
            escape(&mut out, c);
            state = State::Any;
            last_was_underscore = false;
        } else if c == b'_' {
            out.push_str(if double_underscores { "__" } else { "_" });
            last_was_underscore = true;
        } else {
            out.push(c as char);
            last_was_underscore = false;
        }
    }

    out
}

pub fn mangle_name(name: &str) -> String {
    mangle(name, false)
}

pub fn mangle_module_name(name: &str) -> String {
    mangle(name, true)
}

/// The C symbol wasm2c emits for `name` inside the module whose mangled
/// name is `mangled_module`.
pub fn mangle_symbol_name(name: &str, mangled_module: &str) -> String {
    format!("w2c_{}_{}", mangled_module, mangle_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_mangle {
        ($name:ident, $input:expr, $double:expr, $expected:expr) => {
            #[test]
            fn $name() {
                assert_eq!(mangle($input, $double), $expected);
            }
        };
    }

    test_mangle! {plain_name, "normal_name", false, "normal_name"}
    test_mangle! {leading_underscore, "_private", false, "0x5Fprivate"}
    test_mangle! {trailing_underscore, "name_", false, "name0x5F"}
    test_mangle! {repeated_underscore, "a__b", false, "a_0x5Fb"}
    test_mangle! {module_doubles_underscores, "a_b", true, "a__b"}
    test_mangle! {module_repeated_underscore, "a__b", true, "a__0x5Fb"}
    test_mangle! {hex_after_zero_x, "0x1f", false, "0x0x31f"}
    test_mangle! {zero_x_without_hex, "0xg", false, "0xg"}
    test_mangle! {double_zero_resets, "00x1", false, "00x1"}
    test_mangle! {punctuation, "my-module.v2", false, "my0x2Dmodule0x2Ev2"}
    test_mangle! {non_ascii_escapes_every_byte, "é", false, "0xC30xA9"}
    test_mangle! {empty, "", true, ""}

    #[test]
    fn symbol_names_are_module_qualified() {
        assert_eq!(mangle_symbol_name("add", "host"), "w2c_host_add");
        assert_eq!(
            mangle_symbol_name("get_value", &mangle_module_name("my_lib")),
            "w2c_my__lib_get_value"
        );
    }

    #[test]
    fn module_underscores_keep_symbols_apart() {
        let first = mangle_symbol_name("c", &mangle_module_name("a_b"));
        let second = mangle_symbol_name("b_c", &mangle_module_name("a"));
        assert_eq!(first, "w2c_a__b_c");
        assert_eq!(second, "w2c_a_b_c");
        assert_ne!(first, second);
    }
}
