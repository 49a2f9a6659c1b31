//! Experiments Code Generator CLI
//!
//! Compiles an experiment catalogue and rollout document into the C++
//! header, source, test and Bazel files, or checks existing files for drift.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use experiments_compiler::{
    Artifact, CompilerConfig, ExperimentsCompiler, Mode, WriteOutcome,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gen-experiments")]
#[command(about = "Generate experiment headers and sources from YAML")]
struct Cli {
    /// Config file (experiments.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Inputs {
    /// Experiment catalogue
    #[arg(long, default_value = "src/core/lib/experiments/experiments.yaml")]
    experiments: PathBuf,

    /// Rollout document
    #[arg(long, default_value = "src/core/lib/experiments/rollouts.yaml")]
    rollouts: PathBuf,

    /// Output mode (grpc_google3, grpc_oss_production, grpc_oss_test)
    #[arg(short, long)]
    mode: Option<String>,

    /// Enforce expiry dates
    #[arg(long)]
    check_expiry: bool,

    /// Fail if any experiment defaults to debug
    #[arg(long)]
    no_debug: bool,
}

#[derive(clap::Args)]
struct Outputs {
    /// Header output
    #[arg(long)]
    header: Option<PathBuf>,

    /// Source output
    #[arg(long)]
    source: Option<PathBuf>,

    /// Test output
    #[arg(long)]
    test: Option<PathBuf>,

    /// Bazel dictionary output
    #[arg(long)]
    bzl: Option<PathBuf>,

    /// Header path as included by the source and test (defaults to --header)
    #[arg(long)]
    header_path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write generated files
    Generate {
        #[command(flatten)]
        inputs: Inputs,
        #[command(flatten)]
        outputs: Outputs,
    },

    /// Validate inputs and compare existing files with what would be generated
    Check {
        #[command(flatten)]
        inputs: Inputs,
        #[command(flatten)]
        outputs: Outputs,
        /// Print the diff for each drifted file
        #[arg(long)]
        diff: bool,
    },

    /// Print the compiled experiments
    List {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(short, long, value_enum, default_value = "text")]
        format: ListFormat,
    },

    /// Show or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        #[arg(default_value = "experiments.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct ExperimentSummary<'a> {
    name: &'a str,
    description: &'a str,
    owner: &'a str,
    expiry: &'a str,
    uses_polling: bool,
    allow_in_fuzzing_config: bool,
    test_tags: &'a [String],
    requirements: &'a [String],
    defaults: Vec<(&'a str, &'a str)>,
    issues: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = CompilerConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Generate { inputs, outputs } => {
            let compiler = compile(&config, &inputs)?;
            let mode = mode_name(&config, &inputs);
            let header_path = header_path(&outputs);

            let mut written = 0;
            let mut record = |outcome: WriteOutcome, path: &Path| {
                match outcome {
                    WriteOutcome::Written => {
                        written += 1;
                        println!("✅ wrote {}", path.display());
                    }
                    WriteOutcome::Unchanged => println!("   {} unchanged", path.display()),
                }
            };

            if let Some(path) = &outputs.header {
                record(compiler.generate_experiments_hdr(path, &mode)?, path);
            }
            if let Some(path) = &outputs.source {
                record(compiler.generate_experiments_src(path, &header_path, &mode)?, path);
            }
            if let Some(path) = &outputs.test {
                record(compiler.generate_test(path, &header_path, &mode)?, path);
            }
            if let Some(path) = &outputs.bzl {
                record(compiler.gen_experiments_bzl(path, &mode)?, path);
            }
            println!("{} file(s) written", written);
            Ok(())
        }

        Commands::Check { inputs, outputs, diff } => {
            let compiler = compile(&config, &inputs)?;
            let mode: Mode = mode_name(&config, &inputs).parse()?;
            let header_path = header_path(&outputs);

            let mut targets = Vec::new();
            if let Some(path) = outputs.header.clone() {
                targets.push((path, Artifact::Header));
            }
            if let Some(path) = outputs.source.clone() {
                targets.push((path, Artifact::Source { header_file_path: header_path.clone() }));
            }
            if let Some(path) = outputs.test.clone() {
                targets.push((path, Artifact::Test { header_file_path: header_path.clone() }));
            }
            if let Some(path) = outputs.bzl.clone() {
                targets.push((path, Artifact::Bzl));
            }

            println!("🔍 Checking {} generated file(s)...", targets.len());
            let mut drifted = 0;
            for (path, artifact) in &targets {
                match compiler.check(path, artifact, mode)? {
                    None => println!("  ✅ {}", path.display()),
                    Some(drift) => {
                        drifted += 1;
                        if drift.missing {
                            println!("  ❌ {} - missing", path.display());
                        } else {
                            println!("  ❌ {} - out of date", path.display());
                        }
                        if diff {
                            print!("{}", drift.diff);
                        }
                    }
                }
            }

            if drifted > 0 {
                bail!("{} generated file(s) out of date", drifted);
            }
            println!("✅ All generated files are up to date");
            Ok(())
        }

        Commands::List { inputs, format } => {
            let compiler = compile(&config, &inputs)?;
            match format {
                ListFormat::Json => {
                    let summaries: Vec<ExperimentSummary<'_>> = compiler
                        .experiments()
                        .values()
                        .map(|experiment| {
                            let definition = experiment.definition();
                            ExperimentSummary {
                                name: definition.name(),
                                description: definition.description(),
                                owner: definition.owner(),
                                expiry: definition.expiry(),
                                uses_polling: definition.uses_polling(),
                                allow_in_fuzzing_config: definition.allow_in_fuzzing_config(),
                                test_tags: definition.test_tags(),
                                requirements: definition.requirements(),
                                defaults: definition.defaults().collect(),
                                issues: experiment
                                    .report()
                                    .issues()
                                    .iter()
                                    .map(ToString::to_string)
                                    .collect(),
                            }
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&summaries)?);
                }
                ListFormat::Text => {
                    println!("📋 {} experiment(s)", compiler.experiments().len());
                    for experiment in compiler.experiments().values() {
                        let definition = experiment.definition();
                        let defaults: Vec<String> = definition
                            .defaults()
                            .map(|(platform, token)| format!("{}={}", platform, token))
                            .collect();
                        println!(
                            "  {} (owner {}, expires {}) [{}]",
                            definition.name(),
                            definition.owner(),
                            definition.expiry(),
                            defaults.join(" ")
                        );
                        for issue in experiment.report().issues() {
                            println!("     └─ {}", issue);
                        }
                    }
                }
            }
            Ok(())
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
            ConfigAction::Init { path, force } => {
                if path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", path.display());
                }
                CompilerConfig::default().save(&path)?;
                println!("✅ wrote {}", path.display());
                Ok(())
            }
        },
    }
}

/// Parse both inputs and run the validation passes the flags ask for.
fn compile(config: &CompilerConfig, inputs: &Inputs) -> Result<ExperimentsCompiler> {
    let mut compiler = ExperimentsCompiler::from_config(config);

    let catalogue = std::fs::read_to_string(&inputs.experiments)
        .with_context(|| format!("failed to read {}", inputs.experiments.display()))?;
    compiler.add_experiment_definition(&catalogue)?;

    let rollouts = std::fs::read_to_string(&inputs.rollouts)
        .with_context(|| format!("failed to read {}", inputs.rollouts.display()))?;
    compiler.add_rollout_specification(&rollouts)?;

    compiler.validate(inputs.check_expiry || config.validation.check_expiry)?;
    compiler.check_requirements()?;
    if inputs.no_debug || !config.validation.allow_debug {
        compiler.ensure_no_debug_experiments()?;
    }
    Ok(compiler)
}

fn mode_name(config: &CompilerConfig, inputs: &Inputs) -> String {
    inputs
        .mode
        .clone()
        .unwrap_or_else(|| config.output.mode.as_str().to_string())
}

fn header_path(outputs: &Outputs) -> String {
    outputs.header_path.clone().unwrap_or_else(|| {
        outputs
            .header
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "src/core/lib/experiments/experiments.h".to_string())
    })
}
