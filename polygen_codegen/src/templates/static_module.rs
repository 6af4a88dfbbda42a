use super::{quoted, SourceWriter};
use crate::context::ModuleContext;
use crate::templates::export_bridge;
use polygen_parser::{NamedSymbol, SymbolKind};

pub(crate) const HEADER_FILE: &str = "static-module.h";
pub(crate) const SOURCE_FILE: &str = "static-module.cpp";

fn symbol_kind(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Function => "Module::SymbolKind::Function",
        SymbolKind::Table => "Module::SymbolKind::Table",
        SymbolKind::Memory => "Module::SymbolKind::Memory",
        SymbolKind::Global => "Module::SymbolKind::Global",
    }
}

pub(crate) fn header(module: &ModuleContext) -> String {
    let class_name = module.static_module_class_name();
    let mut w = SourceWriter::new();
    w.line("#pragma once")
        .line("#include <ReactNativePolygen/StaticLibraryModule.h>")
        .blank()
        .line("namespace callstack::polygen::generated {")
        .blank()
        .line(format!(
            "std::shared_ptr<callstack::polygen::Module> {}();",
            module.module_factory_function_name()
        ))
        .blank()
        .line(format!(
            "class {class_name}: public callstack::polygen::StaticLibraryModule {{"
        ))
        .line("public:")
        .indent()
        .line(format!(
            "{class_name}(const std::string& name): StaticLibraryModule(name) {{}}"
        ))
        .line("const std::vector<ImportInfo>& getImports() const override;")
        .line("const std::vector<ExportInfo>& getExports() const override;")
        .line("facebook::jsi::Object createInstance(facebook::jsi::Runtime& rt, facebook::jsi::Object&& importObject) const override;")
        .close("};")
        .blank()
        .line("}");
    w.finish()
}

pub(crate) fn source(module: &ModuleContext) -> String {
    let class_name = module.static_module_class_name();
    let imports = module
        .imports
        .iter()
        .map(|import| {
            format!(
                "{{{}, {}, {}}}",
                quoted(import.module.as_deref().unwrap_or_default()),
                quoted(&import.name),
                symbol_kind(import.kind())
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    let exports = module
        .exports
        .iter()
        .map(|export| format!("{{{}, {}}}", quoted(&export.name), symbol_kind(export.kind())))
        .collect::<Vec<_>>()
        .join(", ");

    let mut w = SourceWriter::new();
    w.line(format!("#include \"{HEADER_FILE}\""))
        .line(format!("#include \"{}\"", export_bridge::HEADER_FILE))
        .blank()
        .line("using namespace facebook;")
        .blank()
        .line("namespace callstack::polygen::generated {")
        .blank()
        .line(format!(
            "const std::vector<Module::ImportInfo> imports {{ {imports} }};"
        ))
        .line(format!(
            "const std::vector<Module::ExportInfo> exports {{ {exports} }};"
        ))
        .blank()
        .open(format!(
            "std::shared_ptr<Module> {}() {{",
            module.module_factory_function_name()
        ))
        .line(format!(
            "return std::make_shared<{class_name}>({});",
            quoted(&module.name)
        ))
        .close("}")
        .blank()
        .open(format!(
            "const std::vector<Module::ImportInfo>& {class_name}::getImports() const {{"
        ))
        .line("return imports;")
        .close("}")
        .blank()
        .open(format!(
            "const std::vector<Module::ExportInfo>& {class_name}::getExports() const {{"
        ))
        .line("return exports;")
        .close("}")
        .blank()
        .open(format!(
            "jsi::Object {class_name}::createInstance(jsi::Runtime& rt, jsi::Object&& importObject) const {{"
        ))
        .line("jsi::Object target {rt};")
        .line(format!(
            "{}(rt, target, std::move(importObject));",
            module.exports_function_name()
        ))
        .line("return target;")
        .close("}")
        .blank()
        .line("}");
    w.finish()
}
