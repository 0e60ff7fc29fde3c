//! Tibbar command-line front end.
//!
//! Parses the generation options, configures logging, loads the memory
//! layout, runs the chosen recipe, and writes the assembly, linker script
//! and optional debug YAML. Exit codes: 0 on success, 2 on argument errors
//! (clap's convention), 1 on configuration or generation failure.

use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use tibbar_core::suites;
use tibbar_core::{MemoryLayout, Tibbar};

/// Log verbosity choices.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Verbosity {
    /// Everything, including per-placement detail.
    Debug,
    /// Progress messages.
    Info,
    /// Problems only.
    Warning,
    /// Failures only.
    Error,
}

impl Verbosity {
    const fn level(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warning => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "tibbar",
    author,
    version,
    about = "Tibbar - RISC-V instruction stream generator",
    long_about = "Generate a self-terminating RISC-V test program as assembly plus a linker \
                  script.\n\nExamples:\n  tibbar --generator simple --output test.S\n  tibbar -g \
                  ldst -s 7 --memory-config banks.yaml --debug-yaml debug.yaml"
)]
struct Cli {
    /// Output assembly path; the linker script lands next to it as
    /// `<output>.ld`.
    #[arg(short, long, default_value = "test.S")]
    output: PathBuf,

    /// Seed for the deterministic random source.
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Log verbosity.
    #[arg(short, long, value_enum, default_value = "info")]
    verbosity: Verbosity,

    /// Named test suite, e.g. simple, ldst, rel_branching.
    #[arg(short, long, value_parser = suite_name)]
    generator: String,

    /// Memory layout YAML (banks, code/data, base, size). Default: built-in
    /// layout.
    #[arg(long, value_name = "FILE")]
    memory_config: Option<PathBuf>,

    /// Write a debug YAML dump of placed items and the execution trace.
    #[arg(long, value_name = "FILE")]
    debug_yaml: Option<PathBuf>,
}

/// Validates the suite name against the catalog.
fn suite_name(s: &str) -> Result<String, String> {
    if suites::RECIPE_NAMES.contains(&s) {
        Ok(s.to_owned())
    } else {
        Err(format!(
            "unknown generator '{s}' (available: {})",
            suites::RECIPE_NAMES.join(", ")
        ))
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.level())
        .with_target(false)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("tibbar: error: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> tibbar_core::Result<()> {
    let layout = match &cli.memory_config {
        Some(path) => MemoryLayout::from_yaml_file(path)?,
        None => MemoryLayout::built_in(),
    };

    let mut tibbar = Tibbar::new(&layout, cli.seed, cli.debug_yaml.is_some())?;
    let recipe = tibbar.build_recipe(&cli.generator).ok_or_else(|| {
        tibbar_core::GenError::ConfigInvalid(format!("unknown generator '{}'", cli.generator))
    })?;
    tibbar.create_test(recipe)?;
    tibbar.write_asm(&cli.output)?;
    tracing::info!(output = %cli.output.display(), "wrote assembly and linker script");

    if let Some(path) = &cli.debug_yaml {
        tibbar.write_debug_yaml(path)?;
        tracing::info!(debug_yaml = %path.display(), "wrote debug YAML");
    }
    Ok(())
}
