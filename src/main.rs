use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use ilrun::{Assembly, Runtime};

/// Load a .NET PE/CLI executable and interpret its entry point.
#[derive(Parser)]
#[command(name = "ilrun", version, about)]
struct Cli {
    /// The executable image to run
    path: PathBuf,

    /// Directory searched for referenced assemblies (defaults to the image's directory)
    #[arg(long)]
    search_path: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("ilrun", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let search_path = match &cli.search_path {
        Some(path) => path.clone(),
        None => cli
            .path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let mut runtime = Runtime::new();
    runtime.add_assembly_loader(move |assembly_name| {
        let entries = fs::read_dir(&search_path).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.file_stem().and_then(|stem| stem.to_str()) == Some(assembly_name) {
                if let Ok(assembly) = Assembly::from_path(&path) {
                    return Some(assembly);
                }
            }
        }

        None
    });

    let assembly = Assembly::from_path(&cli.path)
        .with_context(|| format!("failed to load '{}'", cli.path.display()))?;

    let exit_code = runtime
        .run(assembly)
        .with_context(|| format!("execution of '{}' failed", cli.path.display()))?;

    Ok(ExitCode::from(u8::try_from(exit_code).unwrap_or(1)))
}
