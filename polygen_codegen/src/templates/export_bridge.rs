use super::{comment_text, quoted, SourceWriter};
use crate::context::{GeneratedFunction, GeneratedSymbol, GeneratedTarget, ModuleContext};
use crate::ty::{multi_value_field, table_class_name, Marshaling};
use polygen_parser::SymbolKind;
use wasm_helper::{NumType, ValType};

pub(crate) const HEADER_FILE: &str = "jsi-exports-bridge.h";
pub(crate) const SOURCE_FILE: &str = "jsi-exports-bridge.cpp";

pub(crate) fn header(module: &ModuleContext) -> String {
    let context_class = module.context_class_name();
    let mut w = SourceWriter::new();

    w.line("#pragma once")
        .line("#include <jsi/jsi.h>")
        .line("#include <ReactNativePolygen/gen-utils.h>")
        .line(format!("#include \"{}.h\"", module.name));
    for imported in &module.imported_modules {
        w.line(format!("#include \"../imports/{}\"", imported.header_file_name()));
    }
    w.blank()
        .line("namespace callstack::polygen::generated {")
        .blank()
        .line(format!(
            "class {context_class}: public facebook::jsi::NativeState {{"
        ))
        .line("public:")
        .indent()
        .line(format!(
            "{context_class}(facebook::jsi::Runtime& rt, facebook::jsi::Object&& importObject)"
        ))
        .indent()
        .line(": importObject(std::move(importObject))");
    for imported in &module.imported_modules {
        w.line(format!(
            ", INIT_IMPORT_CTX({}, {})",
            imported.root_context_field_name(),
            quoted(&imported.name)
        ));
    }
    w.dedent()
        .line("{}")
        .blank()
        .line("facebook::jsi::Object importObject;")
        .line(format!("{} rootCtx;", module.root_context_type_name()));
    for imported in &module.imported_modules {
        w.line(format!(
            "{} {};",
            imported.context_type_name(),
            imported.root_context_field_name()
        ));
    }
    w.close("};")
        .blank()
        .line(format!(
            "void {}(facebook::jsi::Runtime &rt, facebook::jsi::Object& target, facebook::jsi::Object&& importObject);",
            module.exports_function_name()
        ))
        .blank()
        .line("}");

    w.finish()
}

pub(crate) fn source(module: &ModuleContext, coerce_booleans: bool) -> String {
    let context_class = module.context_class_name();
    let context_getter = format!("get{context_class}Context");
    let mut w = SourceWriter::new();

    w.line("#include <ReactNativePolygen/gen-utils.h>")
        .line("#include <ReactNativePolygen/WebAssembly.h>")
        .line(format!("#include \"{HEADER_FILE}\""))
        .line("#include \"wasm-rt.h\"")
        .line(format!("#include \"{}.h\"", module.name))
        .blank()
        .line("using namespace facebook;")
        .line("using namespace callstack::polygen;")
        .blank();

    if coerce_booleans {
        w.open("static double getNumericVal(const facebook::jsi::Value& val) {")
            .open("if (val.isBool()) {")
            .line("return (double)val.asBool();")
            .close("}")
            .line("return val.asNumber();")
            .close("}")
            .blank();
    }

    w.line("namespace callstack::polygen::generated {")
        .blank()
        .open(format!(
            "std::shared_ptr<{context_class}> {context_getter}(jsi::Runtime& rt, const jsi::Value& val) {{"
        ))
        .line("auto obj = val.asObject(rt);")
        .line("assert(obj.hasNativeState(rt));")
        .line(format!(
            "auto ctx = std::dynamic_pointer_cast<{context_class}>(obj.getNativeState(rt));"
        ))
        .line("assert(ctx != nullptr);")
        .line("return ctx;")
        .close("}")
        .blank();

    let init_args: String = module
        .imported_modules
        .iter()
        .map(|imported| format!(", &inst->{}", imported.root_context_field_name()))
        .collect();

    w.open(format!(
        "void {}(jsi::Runtime &rt, jsi::Object& target, jsi::Object&& importObject) {{",
        module.exports_function_name()
    ))
    .open("if (!wasm_rt_is_initialized()) {")
    .line("wasm_rt_init();")
    .close("}")
    .blank()
    .line(format!(
        "auto inst = std::make_shared<{context_class}>(rt, std::move(importObject));"
    ))
    .line(format!(
        "{}(&inst->rootCtx{init_args});",
        module.instantiate_function_name()
    ))
    .line("target.setNativeState(rt, inst);")
    .blank();

    w.line("// Memories").line("jsi::Object memories {rt};");
    for memory in module.exported(SymbolKind::Memory) {
        holder(&mut w, "memory", "Memory", memory, "memories");
    }
    w.line("target.setProperty(rt, \"memories\", std::move(memories));")
        .blank();

    w.line("// Tables").line("jsi::Object tables {rt};");
    for table in module.exported(SymbolKind::Table) {
        if let GeneratedTarget::Table(symbol) = &table.target {
            holder(
                &mut w,
                "table",
                table_class_name(symbol.element_type),
                table,
                "tables",
            );
        }
    }
    w.line("target.setProperty(rt, \"tables\", std::move(tables));")
        .blank();

    w.line("// Exported functions")
        .line("jsi::Object exports {rt};");
    for export in module.exported(SymbolKind::Function) {
        if let Some(function) = export.function() {
            export_function(&mut w, &context_getter, export, function, coerce_booleans);
        }
    }
    w.line("exports.setNativeState(rt, inst);")
        .line("target.setProperty(rt, \"exports\", std::move(exports));")
        .close("}")
        .blank()
        .line("}");

    w.finish()
}

fn holder(w: &mut SourceWriter, what: &str, class: &str, export: &GeneratedSymbol, target: &str) {
    w.line(format!("/* exported {what}: '{}' */", comment_text(&export.name)))
        .open("{")
        .line("jsi::Object holder {rt};")
        .line(format!(
            "auto {what} = std::make_shared<{class}>({}(&inst->rootCtx));",
            export.generated_function_name
        ))
        .line(format!("holder.setNativeState(rt, std::move({what}));"))
        .line(format!(
            "{target}.setProperty(rt, {}, std::move(holder));",
            quoted(&export.name)
        ))
        .close("}");
}

fn export_function(
    w: &mut SourceWriter,
    context_getter: &str,
    export: &GeneratedSymbol,
    function: &GeneratedFunction,
    coerce_booleans: bool,
) {
    let name = quoted(&export.name);
    let parameters = &function.symbol.parameters;
    let results = &function.symbol.results;

    w.line(format!("/* export: '{}' */", comment_text(&export.name))).open(format!(
        "exports.setProperty(rt, {name}, HOSTFN({name}, {}) {{",
        parameters.len()
    ));

    if !Marshaling::all_supported(parameters) || !Marshaling::all_supported(results) {
        log::warn!(
            "export '{}' has parameters or results that cannot cross into JavaScript",
            export.name
        );
        let message = format!(
            "Function '{}' uses value types that cannot be passed to or from JavaScript",
            export.name
        );
        w.line(format!("throw jsi::JSError(rt, {});", quoted(&message)));
        w.close("}));");
        return;
    }

    if !parameters.is_empty() {
        w.open(format!("if (count < {}) {{", parameters.len()))
            .line(format!(
                "throw jsi::JSError(rt, {});",
                quoted(&format!(
                    "Function '{}' expects {} argument(s)",
                    export.name,
                    parameters.len()
                ))
            ))
            .close("}");
    }

    let args: String = parameters
        .iter()
        .zip(&function.parameter_type_names)
        .enumerate()
        .map(|(index, (ty, c_type))| format!(", {}", argument(*ty, c_type, index, coerce_booleans)))
        .collect();
    let call = format!("{}(&nativeState->rootCtx{args})", export.generated_function_name);

    w.line(format!("auto nativeState = {context_getter}(rt, thisValue);"))
        .line("assert(nativeState != nullptr);");
    match results.as_slice() {
        [] => {
            w.line(format!("{call};"))
                .line("return jsi::Value::undefined();");
        }
        [ty] => {
            w.line(format!("auto res = {call};"))
                .line(format!("return {};", to_js_value(*ty, "res")));
        }
        _ => {
            let elements = results
                .iter()
                .enumerate()
                .map(|(index, ty)| to_js_value(*ty, &format!("res.{}", multi_value_field(*ty, index))))
                .collect::<Vec<_>>()
                .join(", ");
            w.line(format!("auto res = {call};")).line(format!(
                "return jsi::Array::createWithElements(rt, {elements});"
            ));
        }
    }
    w.close("}));");
}

fn argument(ty: ValType, c_type: &str, index: usize, coerce_booleans: bool) -> String {
    let number = if coerce_booleans {
        format!("getNumericVal(args[{index}])")
    } else {
        format!("args[{index}].asNumber()")
    };
    match (Marshaling::of(ty), ty) {
        (Marshaling::BigInt, _) => format!("({c_type})args[{index}].asBigInt(rt).getUint64(rt)"),
        (_, ValType::Num(NumType::I32)) => format!("({c_type})(int64_t){number}"),
        _ => format!("({c_type}){number}"),
    }
}

fn to_js_value(ty: ValType, value: &str) -> String {
    match (Marshaling::of(ty), ty) {
        (Marshaling::BigInt, _) => {
            format!("jsi::Value {{ jsi::BigInt::fromInt64(rt, (int64_t){value}) }}")
        }
        (_, ValType::Num(NumType::I32)) => format!("jsi::Value {{ (double)(int32_t){value} }}"),
        _ => format!("jsi::Value {{ (double){value} }}"),
    }
}
