use async_trait::async_trait;
use polygen_codegen::{
    compute_checksum, Codegen, CodegenOptions, GenerateError, GenerateResult,
    HostProjectGeneratedContext, ModuleGeneratedContext, OutputError, Plugin, MANIFEST_FILE,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const FIB: &str = r#"
(module
  (import "host" "add" (func $add (param i32 i32) (result i32)))
  (func (export "fib") (param i32) (result i32)
    local.get 0
    local.get 0
    call $add))
"#;

const COUNTER: &str = r#"
(module
  (import "host" "add" (func (param i32 i32) (result i32)))
  (import "host" "log" (func (param f64)))
  (memory (export "memory") 1)
  (func (export "pair") (result i32 i64)
    i32.const 1
    i64.const 2))
"#;

fn write_module(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, wat::parse_str(text).unwrap()).unwrap();
    path
}

fn options(out: &Path) -> CodegenOptions {
    CodegenOptions {
        output_directory: out.to_path_buf(),
        ..Default::default()
    }
}

async fn run(options: CodegenOptions, paths: &[PathBuf]) -> polygen_codegen::GenerationReport {
    let codegen = Arc::new(Codegen::create(options, None).await.unwrap());
    let report = codegen.generate_all(paths).await.unwrap();
    codegen.finalize().await.unwrap();
    report
}

fn read(path: PathBuf) -> String {
    std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("{}: {err}", path.display()))
}

#[tokio::test]
async fn generates_bridges_for_import_and_export() {
    let dir = TempDir::new().unwrap();
    let wasm = write_module(dir.path(), "fib.wasm", FIB);
    let out = dir.path().join("out");

    let report = run(options(&out), &[wasm.clone()]).await;
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.modules.len(), 1);

    let exports = read(out.join("@host/fib/jsi-exports-bridge.cpp"));
    assert!(exports.contains("exports.setProperty(rt, \"fib\", HOSTFN(\"fib\", 1) {"));
    assert!(exports.contains(
        "auto res = w2c_fib_fib(&nativeState->rootCtx, (u32)(int64_t)args[0].asNumber());"
    ));
    assert!(exports.contains("return jsi::Value { (double)(int32_t)res };"));
    assert!(exports.contains("wasm2c_fib_instantiate(&inst->rootCtx, &inst->ctx_host);"));

    let header = read(out.join("@host/fib/jsi-exports-bridge.h"));
    assert!(header.contains("#include \"../imports/host-imports.h\""));
    assert!(header.contains("class FibModuleContext: public facebook::jsi::NativeState {"));
    assert!(header.contains(", INIT_IMPORT_CTX(ctx_host, \"host\")"));
    assert!(header.contains("w2c_fib rootCtx;"));
    assert!(header.contains("w2c_host ctx_host;"));

    let imports = read(out.join("@host/imports/host-imports.cpp"));
    assert!(imports.contains("/* import: 'host' 'add' */"));
    assert!(imports.contains("u32 w2c_host_add(w2c_host* ctx, u32 arg0, u32 arg1) {"));
    assert!(imports.contains(
        "auto res = fn.call(ctx->rt, jsi::Value { (double)(int32_t)arg0 }, jsi::Value { (double)(int32_t)arg1 });"
    ));
    assert!(imports.contains("return (u32)(int64_t)res.asNumber();"));
    let imports_header = read(out.join("@host/imports/host-imports.h"));
    assert!(imports_header.contains("struct w2c_host {"));
    assert!(imports_header.contains("u32 w2c_host_add(w2c_host* ctx, u32 arg0, u32 arg1);"));

    let static_module = read(out.join("@host/fib/static-module.cpp"));
    assert!(static_module.contains(
        "const std::vector<Module::ImportInfo> imports { {\"host\", \"add\", Module::SymbolKind::Function} };"
    ));
    assert!(static_module.contains("return std::make_shared<WASMFibModule>(\"fib\");"));

    let checksum = hex::encode(compute_checksum(&std::fs::read(&wasm).unwrap()));
    let loader = read(out.join("@host/loader.cpp"));
    assert!(loader.contains("const std::vector<std::string> moduleNames { \"fib\" };"));
    assert!(loader.contains(&format!("{{ \"fib\", \"{checksum}\" }}")));
    assert!(loader.contains(&format!("{{ \"{checksum}\", createFibModule }}")));
    assert!(loader.contains("if (name == \"fib\") { return createFibModule(); }"));

    let js = read(out.join("modules/fib.js"));
    assert!(js.starts_with("const data = Uint8Array.from([67, 75, 87, 65, 83, 77, 1, "));

    let manifest: serde_json::Value = serde_json::from_str(&read(out.join(MANIFEST_FILE))).unwrap();
    let files = manifest["files"].as_object().unwrap();
    assert!(files.contains_key("@host/fib/jsi-exports-bridge.cpp"));
    assert!(files.contains_key("@host/imports/host-imports.h"));
    assert!(files.contains_key("modules/fib.js"));
}

#[tokio::test]
async fn regeneration_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let fib = write_module(dir.path(), "fib.wasm", FIB);
    let counter = write_module(dir.path(), "counter.wasm", COUNTER);
    let out = dir.path().join("out");

    let first = run(options(&out), &[fib.clone(), counter.clone()]).await;
    assert!(first.is_success(), "{:?}", first.failures);
    let loader = read(out.join("@host/loader.cpp"));
    let bridge = read(out.join("@host/counter/jsi-exports-bridge.cpp"));

    let second = run(options(&out), &[counter, fib]).await;
    assert!(second.is_success(), "{:?}", second.failures);
    assert_eq!(read(out.join("@host/loader.cpp")), loader);
    assert_eq!(read(out.join("@host/counter/jsi-exports-bridge.cpp")), bridge);

    let names: Vec<_> = second.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["counter", "fib"]);
    assert!(loader.contains("const std::vector<std::string> moduleNames { \"counter\", \"fib\" };"));
}

#[tokio::test]
async fn shared_import_module_gets_one_bridge() {
    let dir = TempDir::new().unwrap();
    let fib = write_module(dir.path(), "fib.wasm", FIB);
    let counter = write_module(dir.path(), "counter.wasm", COUNTER);
    let out = dir.path().join("out");

    let report = run(options(&out), &[fib, counter]).await;
    assert!(report.is_success(), "{:?}", report.failures);

    let imports = read(out.join("@host/imports/host-imports.cpp"));
    assert_eq!(imports.matches("u32 w2c_host_add(").count(), 1);
    assert!(imports.contains("void w2c_host_log(w2c_host* ctx, f64 arg0) {"));
    assert!(imports.contains("fn.call(ctx->rt, jsi::Value { (double)arg0 });"));

    let bridge = read(out.join("@host/counter/jsi-exports-bridge.cpp"));
    assert!(bridge.contains("auto memory = std::make_shared<Memory>(w2c_counter_memory(&inst->rootCtx));"));
    assert!(bridge.contains(
        "return jsi::Array::createWithElements(rt, jsi::Value { (double)(int32_t)res.i0 }, jsi::Value { jsi::BigInt::fromInt64(rt, (int64_t)res.j1) });"
    ));
}

#[tokio::test]
async fn failing_module_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let fib = write_module(dir.path(), "fib.wasm", FIB);
    let broken = dir.path().join("broken.wasm");
    std::fs::write(&broken, b"\0asm\x01\0\0\0\x63\x00").unwrap();
    let missing = dir.path().join("missing.wasm");
    let out = dir.path().join("out");

    let report = run(options(&out), &[broken.clone(), fib, missing.clone()]).await;
    assert_eq!(report.modules.len(), 1);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].path, broken);
    assert!(matches!(report.failures[0].error, GenerateError::Decode { .. }));
    assert_eq!(report.failures[1].path, missing);
    assert!(matches!(report.failures[1].error, GenerateError::Read { .. }));

    let loader = read(out.join("@host/loader.cpp"));
    assert!(loader.contains("moduleNames { \"fib\" }"));
    assert!(!out.join("@host/broken").exists());
}

#[tokio::test]
async fn duplicate_module_names_are_rejected() {
    let dir = TempDir::new().unwrap();
    let first = write_module(dir.path(), "a/fib.wasm", FIB);
    let second = write_module(dir.path(), "b/fib.wasm", FIB);
    let out = dir.path().join("out");

    let report = run(options(&out), &[first, second.clone()]).await;
    assert_eq!(report.modules.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, second);
    assert!(matches!(
        report.failures[0].error,
        GenerateError::DuplicateModuleName { ref name, .. } if name == "fib"
    ));
}

#[tokio::test]
async fn edited_output_is_reported() {
    let dir = TempDir::new().unwrap();
    let fib = write_module(dir.path(), "fib.wasm", FIB);
    let out = dir.path().join("out");
    run(options(&out), &[fib.clone()]).await;

    let edited = out.join("@host/fib/jsi-exports-bridge.cpp");
    std::fs::File::options()
        .write(true)
        .open(&edited)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();

    let report = run(options(&out), &[fib.clone()]).await;
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        GenerateError::Output(OutputError::ExternallyChanged { .. })
    ));

    let forced = CodegenOptions {
        force_generate: true,
        ..options(&out)
    };
    assert!(run(forced, &[fib]).await.is_success());
}

#[tokio::test]
async fn host_conflict_keeps_module_outputs_managed() {
    let dir = TempDir::new().unwrap();
    let fib = write_module(dir.path(), "fib.wasm", FIB);
    let out = dir.path().join("out");
    let loader = out.join("@host/loader.cpp");
    std::fs::create_dir_all(loader.parent().unwrap()).unwrap();
    std::fs::write(&loader, "// mine").unwrap();

    let report = run(options(&out), &[fib.clone()]).await;
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert!(!report.is_success());
    assert!(matches!(
        report.host_failure,
        Some(GenerateError::Output(OutputError::UnmanagedFile { .. }))
    ));
    assert_eq!(read(loader.clone()), "// mine");

    let manifest: serde_json::Value = serde_json::from_str(&read(out.join(MANIFEST_FILE))).unwrap();
    let files = manifest["files"].as_object().unwrap();
    assert!(files.contains_key("@host/fib/jsi-exports-bridge.h"));
    assert!(!files.contains_key("@host/loader.cpp"));

    std::fs::remove_file(&loader).unwrap();
    let report = run(options(&out), &[fib]).await;
    assert!(report.is_success(), "{:?} {:?}", report.failures, report.host_failure);
    assert!(read(loader).contains("fib"));
}

#[tokio::test]
async fn metadata_plugin_writes_json() {
    let dir = TempDir::new().unwrap();
    let fib = write_module(dir.path(), "fib.wasm", FIB);
    let out = dir.path().join("out");
    let options = CodegenOptions {
        generate_metadata: true,
        ..options(&out)
    };
    assert!(run(options, &[fib]).await.is_success());

    let exports: serde_json::Value =
        serde_json::from_str(&read(out.join("@host/fib/fib.exports.json"))).unwrap();
    assert_eq!(exports[0]["generatedFunctionName"], "w2c_fib_fib");
    let imports: serde_json::Value =
        serde_json::from_str(&read(out.join("@host/fib/fib.imports.json"))).unwrap();
    assert_eq!(imports[0]["module"], "host");
}

struct Recorder(Arc<Mutex<Vec<String>>>);

#[async_trait]
impl Plugin for Recorder {
    fn name(&self) -> &str {
        "test/recorder"
    }

    async fn module_generated(&self, cx: ModuleGeneratedContext<'_>) -> GenerateResult<()> {
        self.0.lock().unwrap().push(format!("module {}", cx.module.name));
        Ok(())
    }

    async fn host_project_generated(
        &self,
        cx: HostProjectGeneratedContext<'_>,
    ) -> GenerateResult<()> {
        self.0
            .lock()
            .unwrap()
            .push(format!("host {}", cx.shared.modules().len()));
        Ok(())
    }
}

#[tokio::test]
async fn host_phase_runs_after_every_module() {
    let dir = TempDir::new().unwrap();
    let fib = write_module(dir.path(), "fib.wasm", FIB);
    let counter = write_module(dir.path(), "counter.wasm", COUNTER);
    let out = dir.path().join("out");

    let calls = Arc::new(Mutex::new(Vec::new()));
    let codegen = Codegen::create(options(&out), None)
        .await
        .unwrap()
        .with_plugin(Recorder(Arc::clone(&calls)));
    let report = Arc::new(codegen).generate_all(&[fib, counter]).await.unwrap();
    assert!(report.is_success());

    let mut calls = calls.lock().unwrap().clone();
    assert_eq!(calls.pop().as_deref(), Some("host 2"));
    calls.sort();
    assert_eq!(calls, vec!["module counter", "module fib"]);
}

#[tokio::test]
async fn non_single_project_writes_modules_at_root() {
    let dir = TempDir::new().unwrap();
    let fib = write_module(dir.path(), "fib.wasm", FIB);
    let out = dir.path().join("out");
    let options = CodegenOptions {
        single_project: false,
        ..options(&out)
    };
    assert!(run(options, &[fib]).await.is_success());
    assert!(out.join("fib/jsi-exports-bridge.h").exists());
    assert!(out.join("imports/host-imports.h").exists());
    assert!(out.join("loader.cpp").exists());
}
