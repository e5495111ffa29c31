//! # flowlang-cli
//!
//! Command-line compiler for the flowlang annotation language: parses the doc-comment
//! workflow annotations out of a host source file, validates the reconstructed graph, and
//! emits the generated procedure (or the canonical annotation block, for round-trip
//! editing).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use flowlang_core::emitter::{GenerateOptions, ModuleFormat};
use flowlang_core::{compile, generate_annotations, generate_in_place, parse, validate_opts};

#[derive(Parser)]
#[command(name = "flowlang")]
#[command(about = "Compile visual dataflow workflow annotations into procedures", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliModuleFormat {
    Esm,
    Cjs,
}

impl From<CliModuleFormat> for ModuleFormat {
    fn from(f: CliModuleFormat) -> Self {
        match f {
            CliModuleFormat::Esm => ModuleFormat::Esm,
            CliModuleFormat::Cjs => ModuleFormat::Cjs,
        }
    }
}

/// Shared code-generation flags, grouped the way `GenerateOptions` groups them so a
/// `--config` file and CLI flags stay in lockstep.
#[derive(clap::Args)]
struct GenArgs {
    /// Emit the generated procedure as though for production (suppresses variable-set
    /// events and the debugger pass-through; status events are still emitted).
    #[arg(long)]
    production: bool,

    /// Force asynchronous generation even if no referenced node is async.
    #[arg(long)]
    async_forced: bool,

    /// Module format for the emitted procedure.
    #[arg(long, value_enum, default_value = "esm")]
    module_format: CliModuleFormat,

    /// Path to the execution-context runtime module the generated code imports from.
    #[arg(long)]
    external_runtime_path: Option<String>,

    /// Escalate `OBJECT`-typed port mismatches from a warning to an error.
    #[arg(long)]
    strict_types: bool,

    /// Bundle the generated procedure with its dependencies inline rather than importing
    /// them.
    #[arg(long)]
    bundle_mode: bool,

    /// Load additional `GenerateOptions` fields (including `external_node_types`) from a
    /// YAML or JSON config file, overlaid with the flags above.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl GenArgs {
    fn into_options(self) -> Result<GenerateOptions> {
        let mut options = match &self.config {
            Some(path) => load_options(path)?,
            None => GenerateOptions::default(),
        };
        options.production = self.production || options.production;
        options.async_forced = self.async_forced || options.async_forced;
        options.module_format = self.module_format.into();
        options.strict_types = self.strict_types || options.strict_types;
        options.bundle_mode = self.bundle_mode || options.bundle_mode;
        if let Some(path) = self.external_runtime_path {
            options.external_runtime_path = Some(path);
        }
        Ok(options)
    }
}

fn load_options(path: &Path) -> Result<GenerateOptions> {
    let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let options = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&text).with_context(|| format!("parsing JSON config {}", path.display()))?
    } else {
        serde_yaml::from_str(&text).with_context(|| format!("parsing YAML config {}", path.display()))?
    };
    Ok(options)
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a source file and report every workflow and node type found.
    Parse {
        /// Host source file containing `@node`/`@connect`/... doc-comment annotations.
        file: PathBuf,
    },

    /// Parse and validate every workflow in a source file, printing diagnostics.
    Validate {
        file: PathBuf,

        /// Escalate `OBJECT`-typed port mismatches from a warning to an error.
        #[arg(long)]
        strict_types: bool,
    },

    /// Parse, validate, and emit generated code for every workflow in a source file.
    Compile {
        file: PathBuf,

        /// Write generated output to this directory (one file per workflow) instead of
        /// stdout.
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        #[command(flatten)]
        gen: GenArgs,
    },

    /// Regenerate the canonical annotation block for the first workflow in a source file.
    Annotations { file: PathBuf },

    /// Replace a source file's generated region in place, leaving the rest untouched.
    Format {
        file: PathBuf,

        /// Write the result back to `file` instead of printing a diff-free rewrite to
        /// stdout.
        #[arg(long)]
        write: bool,
    },

    /// Render the annotation grammar as plain-text EBNF.
    Grammar,

    /// Compile every source file matching a glob pattern, writing generated output
    /// alongside each input file's workflow name under `--out-dir`.
    Build {
        /// Glob pattern, e.g. `src/**/*.ts`.
        pattern: String,

        #[arg(short, long, default_value = "dist")]
        out_dir: PathBuf,

        #[command(flatten)]
        gen: GenArgs,
    },
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::filter::LevelFilter;
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();
}

fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}

fn print_diagnostics(label: &str, diags: &[flowlang_core::Diagnostic]) {
    for d in diags {
        eprintln!("{label}: {d}");
    }
}

async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Parse { file } => {
            let source = read_source(&file)?;
            let result = parse(&source);
            println!("node types: {}", result.node_types.len());
            for name in result.node_types.keys() {
                println!("  - {name}");
            }
            println!("workflows: {}", result.workflows.len());
            for wf in &result.workflows {
                println!("  - {} ({} instances, {} connections)", wf.name, wf.instances.len(), wf.connections.len());
            }
            print_diagnostics("warning", &result.warnings);
            print_diagnostics("error", &result.errors);
            Ok(result.errors.is_empty())
        }

        Commands::Validate { file, strict_types } => {
            let source = read_source(&file)?;
            let result = parse(&source);
            print_diagnostics("warning", &result.warnings);
            print_diagnostics("error", &result.errors);
            let mut ok = result.errors.is_empty();
            for wf in &result.workflows {
                let diags = validate_opts(wf, &Default::default(), strict_types);
                let (errors, warnings): (Vec<_>, Vec<_>) =
                    diags.into_iter().partition(flowlang_core::Diagnostic::is_error);
                if !errors.is_empty() {
                    ok = false;
                }
                print_diagnostics(&format!("{} warning", wf.name), &warnings);
                print_diagnostics(&format!("{} error", wf.name), &errors);
            }
            if ok {
                println!("ok");
            }
            Ok(ok)
        }

        Commands::Compile { file, out_dir, gen } => {
            let source = read_source(&file)?;
            let options = gen.into_options()?;
            let output = compile(&source, &options);
            print_diagnostics("warning", &output.warnings);
            print_diagnostics("error", &output.errors);

            match out_dir {
                Some(dir) => {
                    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
                    for (name, code) in &output.generated {
                        let ext = match options.module_format {
                            ModuleFormat::Esm => "mjs",
                            ModuleFormat::Cjs => "cjs",
                        };
                        let path = dir.join(format!("{name}.{ext}"));
                        fs::write(&path, code).with_context(|| format!("writing {}", path.display()))?;
                        println!("wrote {}", path.display());
                    }
                }
                None => {
                    for (name, code) in &output.generated {
                        println!("// === {name} ===");
                        println!("{code}");
                    }
                }
            }

            Ok(output.errors.is_empty())
        }

        Commands::Annotations { file } => {
            let source = read_source(&file)?;
            let result = parse(&source);
            let Some(wf) = result.workflows.first() else {
                bail!("no workflow found in {}", file.display());
            };
            print!("{}", generate_annotations(wf));
            Ok(true)
        }

        Commands::Format { file, write } => {
            let source = read_source(&file)?;
            let result = parse(&source);
            let Some(wf) = result.workflows.first() else {
                bail!("no workflow found in {}", file.display());
            };
            let outcome = generate_in_place(&source, wf);
            if write {
                if outcome.has_changes {
                    fs::write(&file, &outcome.code).with_context(|| format!("writing {}", file.display()))?;
                    println!("updated {}", file.display());
                } else {
                    println!("{} already up to date", file.display());
                }
            } else {
                print!("{}", outcome.code);
            }
            Ok(true)
        }

        Commands::Grammar => {
            let grammar = flowlang_core::parser::ebnf::full_grammar();
            print!("{}", flowlang_core::parser::ebnf::render(&grammar));
            Ok(true)
        }

        Commands::Build { pattern, out_dir, gen } => build(pattern, out_dir, gen).await,
    }
}

/// Compile every file matching `pattern` concurrently — one blocking task per file, since
/// `compile` is synchronous CPU work and the files are independent of each other — and
/// write the results under `out_dir` as they complete.
async fn build(pattern: String, out_dir: PathBuf, gen: GenArgs) -> Result<bool> {
    let options = gen.into_options()?;
    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let ext = match options.module_format {
        ModuleFormat::Esm => "mjs",
        ModuleFormat::Cjs => "cjs",
    };

    let paths: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("invalid glob pattern '{pattern}'"))?
        .collect::<std::result::Result<_, _>>()
        .with_context(|| "reading glob match")?;

    if paths.is_empty() {
        eprintln!("no files matched '{pattern}'");
        return Ok(true);
    }

    let mut tasks = tokio::task::JoinSet::new();
    for path in paths {
        let options = options.clone();
        tasks.spawn_blocking(move || {
            let source = read_source(&path)?;
            Ok::<_, anyhow::Error>((path, compile(&source, &options)))
        });
    }

    let mut ok = true;
    while let Some(joined) = tasks.join_next().await {
        let (path, output) = joined.context("build task panicked")??;
        print_diagnostics(&format!("{}: warning", path.display()), &output.warnings);
        print_diagnostics(&format!("{}: error", path.display()), &output.errors);
        if !output.errors.is_empty() {
            ok = false;
            continue;
        }
        for (name, code) in &output.generated {
            let out_path = out_dir.join(format!("{name}.{ext}"));
            fs::write(&out_path, code).with_context(|| format!("writing {}", out_path.display()))?;
            println!("wrote {}", out_path.display());
        }
    }

    Ok(ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
