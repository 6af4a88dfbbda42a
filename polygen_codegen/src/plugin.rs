use crate::context::{GeneratedSymbol, GeneratedTarget, ModuleContext, SharedContext};
use crate::error::GenerateResult;
use crate::output::OutputGenerator;
use async_trait::async_trait;
use polygen_parser::{NamedSymbol, SymbolSet};
use serde::Serialize;
use wasm_helper::ValType;

#[derive(Clone, Copy)]
pub struct ModuleGeneratedContext<'a> {
    pub module: &'a ModuleContext,
    /// Scoped to the module's output directory.
    pub output: &'a OutputGenerator,
}

#[derive(Clone, Copy)]
pub struct HostProjectGeneratedContext<'a> {
    pub shared: &'a SharedContext,
    /// Scoped to the host project directory.
    pub output: &'a OutputGenerator,
}

/// Hooks into generation. `module_generated` runs once per module after its
/// bridge is written; `host_project_generated` runs once after every module
/// and the host project are done. Plugins of a phase run in registration
/// order.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn module_generated(&self, _cx: ModuleGeneratedContext<'_>) -> GenerateResult<()> {
        Ok(())
    }

    async fn host_project_generated(
        &self,
        _cx: HostProjectGeneratedContext<'_>,
    ) -> GenerateResult<()> {
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SymbolMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    module: Option<&'a str>,
    kind: &'static str,
    mangled_name: &'a str,
    generated_function_name: &'a str,
    #[serde(flatten)]
    target: TargetMetadata<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum TargetMetadata<'a> {
    #[serde(rename_all = "camelCase")]
    Function {
        parameter_types: Vec<&'static str>,
        result_types: Vec<&'static str>,
        parameter_type_names: &'a [&'static str],
        return_type_name: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Table {
        element_type: &'static str,
        min: u32,
        max: Option<u32>,
    },
    Memory {
        min: u32,
        max: Option<u32>,
    },
    Global {
        #[serde(rename = "type")]
        ty: &'static str,
        mutable: bool,
    },
}

fn type_names(types: &[ValType]) -> Vec<&'static str> {
    types.iter().map(ValType::as_str).collect()
}

impl<'a> From<&'a GeneratedSymbol> for SymbolMetadata<'a> {
    fn from(symbol: &'a GeneratedSymbol) -> Self {
        let target = match &symbol.target {
            GeneratedTarget::Function(function) => TargetMetadata::Function {
                parameter_types: type_names(&function.symbol.parameters),
                result_types: type_names(&function.symbol.results),
                parameter_type_names: &function.parameter_type_names,
                return_type_name: &function.return_type_name,
            },
            GeneratedTarget::Table(table) => TargetMetadata::Table {
                element_type: ValType::Ref(table.element_type).as_str(),
                min: table.min,
                max: table.max,
            },
            GeneratedTarget::Memory(memory) => TargetMetadata::Memory {
                min: memory.min,
                max: memory.max,
            },
            GeneratedTarget::Global(global) => TargetMetadata::Global {
                ty: global.ty.as_str(),
                mutable: global.mutable,
            },
        };
        Self {
            name: &symbol.name,
            module: symbol.module.as_deref(),
            kind: symbol.kind().as_str(),
            mangled_name: &symbol.mangled_local_name,
            generated_function_name: &symbol.generated_function_name,
            target,
        }
    }
}

/// Renders `symbols` as the pretty-printed JSON array written by
/// [`DumpMetadata`].
pub fn symbols_to_json(symbols: &SymbolSet<GeneratedSymbol>) -> GenerateResult<String> {
    let metadata: Vec<SymbolMetadata> = symbols.iter().map(SymbolMetadata::from).collect();
    Ok(serde_json::to_string_pretty(&metadata)?)
}

/// Writes `<module>.exports.json` and `<module>.imports.json` next to the
/// module's bridge.
#[derive(Debug, Default)]
pub struct DumpMetadata;

#[async_trait]
impl Plugin for DumpMetadata {
    fn name(&self) -> &str {
        "core/dump-metadata"
    }

    async fn module_generated(&self, cx: ModuleGeneratedContext<'_>) -> GenerateResult<()> {
        let module = cx.module;
        let exports = symbols_to_json(&module.exports)?;
        let imports = symbols_to_json(&module.imports)?;
        cx.output
            .write_all_to([
                (format!("{}.exports.json", module.name), exports),
                (format!("{}.imports.json", module.name), imports),
            ])
            .await?;
        Ok(())
    }
}

/// Copies the wasm2c runtime from the assets directory into the host
/// project.
#[derive(Debug, Default)]
pub struct EmbedWasmRuntime;

pub const WASM_RUNTIME_ASSET: &str = "wasm-rt";

#[async_trait]
impl Plugin for EmbedWasmRuntime {
    fn name(&self) -> &str {
        "core/wasm2c-runtime"
    }

    async fn host_project_generated(
        &self,
        cx: HostProjectGeneratedContext<'_>,
    ) -> GenerateResult<()> {
        let copied = cx
            .output
            .copy_asset(WASM_RUNTIME_ASSET, WASM_RUNTIME_ASSET)
            .await?;
        log::debug!("copied {} runtime file(s)", copied.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wasm_helper::{self as wasm, Serializer};

    #[test]
    fn metadata_describes_each_symbol() {
        let bytes = wasm::Module {
            types: vec![wasm::FuncType {
                parameters: vec![ValType::I32],
                returns: vec![ValType::I32, ValType::F32],
            }],
            imports: vec![wasm::Import {
                module: "env".to_string(),
                name: "memory".to_string(),
                desc: wasm::ImportDesc::Mem(wasm::Limits { min: 1, max: None }),
            }],
            funcs: vec![wasm::Func {
                ty: 0,
                locals: vec![],
                body: wasm::Expr(vec![wasm::Instr::Unreachable]),
            }],
            exports: vec![wasm::Export {
                name: "split".to_string(),
                desc: wasm::ExportDesc::Func(0),
            }],
            ..Default::default()
        }
        .to_bytes();
        let module = ModuleContext::new(&bytes, "calc.wasm").unwrap();

        let exports: serde_json::Value =
            serde_json::from_str(&symbols_to_json(&module.exports).unwrap()).unwrap();
        assert_eq!(
            exports,
            json!([{
                "name": "split",
                "kind": "function",
                "mangledName": "split",
                "generatedFunctionName": "w2c_calc_split",
                "parameterTypes": ["i32"],
                "resultTypes": ["i32", "f32"],
                "parameterTypeNames": ["u32"],
                "returnTypeName": "struct wasm_multi_if",
            }])
        );

        let imports: serde_json::Value =
            serde_json::from_str(&symbols_to_json(&module.imports).unwrap()).unwrap();
        assert_eq!(
            imports,
            json!([{
                "name": "memory",
                "module": "env",
                "kind": "memory",
                "mangledName": "memory",
                "generatedFunctionName": "w2c_env_memory",
                "min": 1,
                "max": null,
            }])
        );
    }
}
