use super::{quoted, SourceWriter};
use crate::context::SharedContext;

pub(crate) const LOADER_FILE: &str = "loader.cpp";

pub(crate) fn loader(shared: &SharedContext) -> String {
    let modules = shared.modules();
    let names = modules
        .iter()
        .map(|module| quoted(&module.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut w = SourceWriter::new();
    w.line("#include <sstream>")
        .line("#include <ReactNativePolygen/w2c.h>")
        .line("#include <ReactNativePolygen/checksum.h>")
        .line("#include <ReactNativePolygen/bridge.h>")
        .blank()
        .line("namespace callstack::polygen::generated {")
        .blank()
        .line("using ModuleFactoryFunction = std::function<std::shared_ptr<Module>()>;")
        .blank();
    for module in modules {
        w.line(format!(
            "std::shared_ptr<Module> {}();",
            module.module_factory_function_name()
        ));
    }
    if !modules.is_empty() {
        w.blank();
    }

    w.line(format!(
        "const std::vector<std::string> moduleNames {{ {names} }};"
    ))
    .open("const std::unordered_map<std::string, std::string> moduleChecksums {");
    for (index, module) in modules.iter().enumerate() {
        let separator = if index + 1 < modules.len() { "," } else { "" };
        w.line(format!(
            "{{ {}, \"{}\" }}{separator}",
            quoted(&module.name),
            module.checksum_hex()
        ));
    }
    w.close("};")
        .open("const std::unordered_map<std::string, ModuleFactoryFunction> moduleFactoryByChecksum {");
    for (index, module) in modules.iter().enumerate() {
        let separator = if index + 1 < modules.len() { "," } else { "" };
        w.line(format!(
            "{{ \"{}\", {} }}{separator}",
            module.checksum_hex(),
            module.module_factory_function_name()
        ));
    }
    w.close("};")
        .blank()
        .open("const std::vector<std::string>& getAvailableModules() {")
        .line("return moduleNames;")
        .close("}")
        .blank();

    w.open("std::shared_ptr<Module> loadWebAssemblyModule(std::span<uint8_t> moduleData) {")
        .open("if (ModuleMetadataView::isMetadata(moduleData)) {")
        .line("auto metadata = ModuleMetadataView::fromBuffer(moduleData);")
        .line("auto& name = metadata->getName();")
        .blank()
        .open("if (auto foundModule = moduleChecksums.find(name); foundModule != moduleChecksums.end() && foundModule->second != std::string(metadata->checksum)) {")
        .line("std::ostringstream errorMsgStream;")
        .line("errorMsgStream << \"Module checksums for '\" << name << \"' differ, this means that the precompiled module is different from the one that was generated. Perhaps you forgot to rebuild the project?\";")
        .line("throw LoaderError { errorMsgStream.str() };")
        .close("}")
        .blank();
    for module in modules {
        w.line(format!(
            "if (name == {}) {{ return {}(); }}",
            quoted(&module.name),
            module.module_factory_function_name()
        ));
    }
    w.line("std::ostringstream errorMsgStream;")
        .line("errorMsgStream << \"Failed to load WebAssembly Module '\" << name << \"'. The module is not precompiled. Perhaps you forgot to run 'polygen generate'?\";")
        .line("throw LoaderError { errorMsgStream.str() };")
        .close("} else {")
        .indent()
        .line("auto checksum = computeSHA256(moduleData);")
        .open("if (auto foundModule = moduleFactoryByChecksum.find(checksum); foundModule != moduleFactoryByChecksum.end()) {")
        .line("return foundModule->second();")
        .close("}")
        .blank()
        .line("throw LoaderError { \"Tried to load an unknown WebAssembly Module from binary buffer. Polygen can only load statically precompiled modules.\" };")
        .close("}")
        .close("}")
        .blank()
        .line("}");
    w.finish()
}
