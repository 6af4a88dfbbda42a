use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use polygen_codegen::{Codegen, CodegenOptions, GenerationReport, OutputGenerator, Wasm2c};
use polygen_parser::{Module, SymbolKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "polygen", version, about = "Precompiles WebAssembly modules into JSI bridges")]
struct CliArgs {
    /// Print debug logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the native sources and bridges for the given modules.
    Generate(GenerateArgs),
    /// Find WebAssembly modules and print what they import and export.
    Scan(ScanArgs),
    /// Remove every file recorded by a previous generation.
    Clean(CleanArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(required = true)]
    modules: Vec<PathBuf>,

    #[arg(short = 'o', long = "output-dir")]
    output_directory: Option<PathBuf>,

    /// Overwrite files that were changed since they were generated.
    #[arg(short, long)]
    force: bool,

    /// Write the import and export metadata of each module as JSON.
    #[arg(long)]
    metadata: bool,

    /// Directory holding the `wasm-rt` runtime to embed in the host project.
    #[arg(long = "assets-dir")]
    assets_directory: Option<PathBuf>,

    /// Do not run wasm2c.
    #[arg(long)]
    skip_c_sources: bool,

    /// Accept booleans where exported functions expect numbers.
    #[arg(long)]
    coerce_booleans: bool,
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[arg(default_value = ".")]
    directory: PathBuf,
}

#[derive(Args, Debug)]
struct CleanArgs {
    #[arg(short = 'o', long = "output-dir")]
    output_directory: Option<PathBuf>,

    /// Remove the files instead of listing them.
    #[arg(short, long)]
    yes: bool,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let result = match args.command {
        Command::Generate(arg) => generate(arg).await,
        Command::Scan(arg) => scan(&arg.directory),
        Command::Clean(arg) => clean(arg).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn output_directory(arg: Option<PathBuf>) -> PathBuf {
    arg.unwrap_or_else(|| CodegenOptions::default().output_directory)
}

async fn generate(arg: GenerateArgs) -> anyhow::Result<()> {
    let options = CodegenOptions {
        output_directory: output_directory(arg.output_directory),
        assets_directory: arg.assets_directory,
        force_generate: arg.force,
        generate_metadata: arg.metadata,
        coerce_booleans: arg.coerce_booleans,
        ..CodegenOptions::default()
    };

    let wasm2c = if arg.skip_c_sources {
        None
    } else {
        let wasm2c = Wasm2c::resolve()
            .await
            .context("cannot run wasm2c, pass --skip-c-sources to generate the bridges only")?;
        log::info!(
            "using wasm2c {} at {}",
            wasm2c.version(),
            wasm2c.binary().display()
        );
        Some(wasm2c)
    };

    let codegen = Arc::new(
        Codegen::create(options, wasm2c)
            .await
            .context("cannot prepare the output directory")?,
    );
    let report = codegen.generate_all(&arg.modules).await?;
    codegen
        .finalize()
        .await
        .context("cannot save the output manifest")?;

    print_report(&report);
    if !report.failures.is_empty() {
        bail!(
            "{} of {} module(s) failed to generate",
            report.failures.len(),
            arg.modules.len()
        );
    }
    if report.host_failure.is_some() {
        bail!("the host project failed to generate");
    }
    Ok(())
}

fn print_report(report: &GenerationReport) {
    for module in &report.modules {
        println!("generated {} ({})", module.name, module.source_path.display());
    }
    for failure in &report.failures {
        eprintln!("failed {}: {}", failure.path.display(), failure.error);
    }
    if let Some(error) = &report.host_failure {
        eprintln!("failed host project: {error}");
    }
}

fn scan(directory: &Path) -> anyhow::Result<()> {
    let pattern = directory.join("**").join("*.wasm");
    let pattern = pattern.to_string_lossy();

    let mut found = 0;
    for entry in glob::glob(&pattern).context("invalid search directory")? {
        let path = entry?;
        if path.components().any(|c| c.as_os_str() == "node_modules") {
            continue;
        }
        found += 1;

        let bytes = std::fs::read(&path).with_context(|| format!("cannot read {}", path.display()))?;
        let module = match Module::from_bytes(&bytes) {
            Ok(module) => module,
            Err(err) => {
                log::warn!("skipping {}: {err}", path.display());
                continue;
            }
        };

        println!("{}", path.display());
        for kind in SymbolKind::ALL {
            let exports = module
                .exports()
                .iter()
                .filter(|export| export.target.kind() == kind)
                .count();
            println!(
                "  {:<8} {} imported, {} exported",
                kind.as_str(),
                module.import_count(kind),
                exports
            );
        }
    }

    if found == 0 {
        println!("no WebAssembly modules found in {}", directory.display());
    }
    Ok(())
}

async fn clean(arg: CleanArgs) -> anyhow::Result<()> {
    let root = output_directory(arg.output_directory);
    let output = OutputGenerator::load(&root, false)
        .await
        .with_context(|| format!("cannot read the manifest in {}", root.display()))?;

    if !arg.yes {
        let files = output.written_files().await;
        for path in files.files.keys() {
            println!("{}", root.join(path).display());
        }
        println!("{} file(s) would be removed, rerun with --yes", files.files.len());
        return Ok(());
    }

    let removed = output.clean().await?;
    log::info!("removed {} file(s) from {}", removed.len(), root.display());
    Ok(())
}
