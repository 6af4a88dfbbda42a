use super::{comment_text, quoted, SourceWriter};
use crate::context::{GeneratedFunction, GeneratedSymbol, GeneratedTarget, ImportedModuleContext};
use crate::ty::{coerce_type_name, multi_value_field, table_c_type, table_class_name, Marshaling};
use wasm_helper::{NumType, ValType};

pub(crate) fn header(imported: &ImportedModuleContext) -> String {
    let mut w = SourceWriter::new();
    w.line("#pragma once")
        .line("#include <jsi/jsi.h>")
        .line("#include <wasm-rt.h>")
        .line("#include <ReactNativePolygen/gen-utils.h>")
        .blank()
        .open(format!("struct {} {{", imported.context_type_name()))
        .line("void* root;")
        .line("facebook::jsi::Runtime& rt;")
        .line("facebook::jsi::Object importObj;")
        .close("};")
        .blank();

    extern_c(&mut w, |w| {
        for symbol in &imported.imports {
            import(w, imported, symbol, false);
        }
    });
    w.finish()
}

pub(crate) fn source(imported: &ImportedModuleContext) -> String {
    let mut w = SourceWriter::new();
    w.line(format!("#include \"{}\"", imported.header_file_name()))
        .line("#include <ReactNativePolygen/WebAssembly.h>")
        .line("#include <ReactNativePolygen/NativeStateHelper.h>")
        .blank()
        .line("using namespace facebook;")
        .line("using namespace callstack::polygen;")
        .blank();

    extern_c(&mut w, |w| {
        for symbol in &imported.imports {
            import(w, imported, symbol, true);
        }
    });
    w.finish()
}

fn extern_c(w: &mut SourceWriter, body: impl FnOnce(&mut SourceWriter)) {
    w.line("#ifdef __cplusplus")
        .line("extern \"C\" {")
        .line("#endif")
        .blank();
    body(w);
    w.line("#ifdef __cplusplus")
        .line("}")
        .line("#endif");
}

fn import(
    w: &mut SourceWriter,
    imported: &ImportedModuleContext,
    symbol: &GeneratedSymbol,
    with_body: bool,
) {
    let context = format!("{}* ctx", imported.context_type_name());
    let name = quoted(&symbol.name);

    w.line(format!(
        "/* import: '{}' '{}' */",
        comment_text(&imported.name),
        comment_text(&symbol.name)
    ));
    match &symbol.target {
        GeneratedTarget::Function(function) => {
            let parameters: String = function
                .parameter_type_names
                .iter()
                .enumerate()
                .map(|(index, c_type)| format!(", {c_type} arg{index}"))
                .collect();
            let prototype = format!(
                "{} {}({context}{parameters})",
                function.return_type_name, symbol.generated_function_name
            );
            if with_body {
                w.open(format!("{prototype} {{"))
                    .line(format!(
                        "auto fn = ctx->importObj.getPropertyAsFunction(ctx->rt, {name});"
                    ));
                function_call(w, symbol, function);
                w.close("}");
            } else {
                w.line(format!("{prototype};"));
            }
        }
        GeneratedTarget::Global(global) => {
            let c_type = format!("{}*", coerce_type_name(global.ty));
            let prototype = format!("{c_type} {}({context})", symbol.generated_function_name);
            if with_body {
                w.open(format!("{prototype} {{"))
                    .line(format!(
                        "auto obj = ctx->importObj.getPropertyAsObject(ctx->rt, {name});"
                    ))
                    .line("auto global = NativeStateHelper::tryGet<Global>(ctx->rt, obj);")
                    .line("assert(global != nullptr);")
                    .line(format!("return ({c_type})global->getUnsafePayloadPtr();"))
                    .close("}");
            } else {
                w.line(format!("{prototype};"));
            }
        }
        GeneratedTarget::Memory(..) => {
            let prototype = format!(
                "wasm_rt_memory_t* {}({context})",
                symbol.generated_function_name
            );
            if with_body {
                w.open(format!("{prototype} {{"))
                    .line(format!(
                        "auto memoryHolder = ctx->importObj.getPropertyAsObject(ctx->rt, {name});"
                    ))
                    .line("auto memoryState = NativeStateHelper::tryGet<Memory>(ctx->rt, memoryHolder);")
                    .line("assert(memoryState != nullptr);")
                    .line("return memoryState->getMemory();")
                    .close("}");
            } else {
                w.line(format!("{prototype};"));
            }
        }
        GeneratedTarget::Table(table) => {
            let prototype = format!(
                "{}* {}({context})",
                table_c_type(table.element_type),
                symbol.generated_function_name
            );
            if with_body {
                w.open(format!("{prototype} {{"))
                    .line(format!(
                        "auto tableHolder = ctx->importObj.getPropertyAsObject(ctx->rt, {name});"
                    ))
                    .line(format!(
                        "auto table = NativeStateHelper::tryGet<{}>(ctx->rt, tableHolder);",
                        table_class_name(table.element_type)
                    ))
                    .line("assert(table != nullptr);")
                    .line("return table->getTableData();")
                    .close("}");
            } else {
                w.line(format!("{prototype};"));
            }
        }
    }
    w.blank();
}

fn function_call(w: &mut SourceWriter, symbol: &GeneratedSymbol, function: &GeneratedFunction) {
    let parameters = &function.symbol.parameters;
    let results = &function.symbol.results;

    if !Marshaling::all_supported(parameters) || !Marshaling::all_supported(results) {
        log::warn!(
            "import '{}' cannot be called from native code, its signature has no JavaScript mapping",
            symbol.name
        );
        let message = format!(
            "Imported function '{}' uses value types that cannot be passed to or from JavaScript",
            symbol.name
        );
        w.line(format!("throw jsi::JSError(ctx->rt, {});", quoted(&message)));
        return;
    }

    let args: String = parameters
        .iter()
        .enumerate()
        .map(|(index, ty)| format!(", {}", to_js_value(*ty, &format!("arg{index}"))))
        .collect();
    let call = format!("fn.call(ctx->rt{args})");

    match results.as_slice() {
        [] => {
            w.line(format!("{call};"));
        }
        [ty] => {
            w.line(format!("auto res = {call};")).line(format!(
                "return {};",
                from_js_value(*ty, &function.return_type_name, "res")
            ));
        }
        _ => {
            w.line(format!(
                "auto res = {call}.asObject(ctx->rt).asArray(ctx->rt);"
            ))
            .line(format!("{} out;", function.return_type_name));
            for (index, ty) in results.iter().enumerate() {
                let element = format!("res.getValueAtIndex(ctx->rt, {index})");
                w.line(format!(
                    "out.{} = {};",
                    multi_value_field(*ty, index),
                    from_js_value(*ty, coerce_type_name(*ty), &element)
                ));
            }
            w.line("return out;");
        }
    }
}

fn to_js_value(ty: ValType, value: &str) -> String {
    match (Marshaling::of(ty), ty) {
        (Marshaling::BigInt, _) => {
            format!("jsi::Value {{ jsi::BigInt::fromInt64(ctx->rt, (int64_t){value}) }}")
        }
        (_, ValType::Num(NumType::I32)) => format!("jsi::Value {{ (double)(int32_t){value} }}"),
        _ => format!("jsi::Value {{ (double){value} }}"),
    }
}

fn from_js_value(ty: ValType, c_type: &str, value: &str) -> String {
    match (Marshaling::of(ty), ty) {
        (Marshaling::BigInt, _) => format!("({c_type}){value}.asBigInt(ctx->rt).getUint64(ctx->rt)"),
        (_, ValType::Num(NumType::I32)) => format!("({c_type})(int64_t){value}.asNumber()"),
        _ => format!("({c_type}){value}.asNumber()"),
    }
}
