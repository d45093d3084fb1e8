use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use linkbench::{
    benchmarks::{RunManifest, Runner},
    config::{
        load_variants, BuildMode, Configuration, HarnessConfig, TargetConfig,
        DEFAULT_VARIANTS_FILE,
    },
    config::harness::{
        DEFAULT_BUILD_COMMAND, DEFAULT_ITERATIONS, DEFAULT_PACKAGE, DEFAULT_PARALLELISM_VAR,
        DEFAULT_TARGET,
    },
    path_utils, system_info,
};
use log::{debug, info};
use std::{path::PathBuf, process};

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Time relinks (or full rebuilds) of a Go binary with each toolchain listed \
                  in a variants file, writing one benchstat-compatible results file per variant"
)]
struct Cli {
    /// Emit debug/trace output
    #[arg(short, long)]
    verbose: bool,

    /// Benchmark the entire build, as opposed to a relink
    #[arg(long)]
    build: bool,

    /// Number of timed iterations per phase
    #[arg(short = 'n', long, default_value_t = DEFAULT_ITERATIONS, env = "LINKBENCH_ITERATIONS")]
    iterations: usize,

    /// Also time a relink with '-s -w' (no symbols or debug info)
    #[arg(short = 'x', long)]
    without_debug: bool,

    /// Generate scripts and show commands, but don't execute them
    #[arg(short, long)]
    dry_run: bool,

    /// Run timed builds under perflock
    #[arg(short = 'P', long)]
    perflock: bool,

    /// Keep the generated scripts instead of removing them
    #[arg(long)]
    preserve_tmp: bool,

    /// Variants file, one `tag:toolchain_root[:extra_args[:parallelism]]` per line
    #[arg(short = 'f', long, default_value = DEFAULT_VARIANTS_FILE, env = "LINKBENCH_VARIANTS")]
    variants: PathBuf,

    /// Directory receiving the out.<tag>.<revision>.txt files
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Source checkout the scripts run in
    #[arg(short = 'C', long, default_value = ".")]
    work_dir: PathBuf,

    /// Name of the binary being built
    #[arg(long, default_value = DEFAULT_TARGET)]
    target: String,

    /// Package path of the binary being built
    #[arg(long, default_value = DEFAULT_PACKAGE)]
    package: String,

    /// Build command, relative to each toolchain root
    #[arg(long, default_value = DEFAULT_BUILD_COMMAND)]
    build_command: PathBuf,

    /// Environment variable set from a variant's parallelism field
    #[arg(long, default_value = DEFAULT_PARALLELISM_VAR)]
    parallelism_var: String,

    /// Write a JSON summary of the run to this file
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Write a description of the host and settings to this file
    #[arg(long)]
    system_info: Option<PathBuf>,
}

impl Cli {
    fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            verbose: self.verbose,
            mode: if self.build {
                BuildMode::Rebuild
            } else {
                BuildMode::Relink
            },
            iterations: self.iterations,
            without_debug: self.without_debug,
            dry_run: self.dry_run,
            perflock: self.perflock,
            preserve_scripts: self.preserve_tmp,
            target: TargetConfig {
                name: self.target.clone(),
                package: self.package.clone(),
            },
            build_command: self.build_command.clone(),
            parallelism_var: self.parallelism_var.clone(),
            work_dir: path_utils::expand_path_buf(&self.work_dir),
            out_dir: path_utils::expand_path_buf(&self.out_dir),
            ..Default::default()
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.harness_config();
    debug!(
        "Validating {} configuration rooted at {:?}",
        config.config_type(),
        config.config_path()
    );
    config.validate()?;

    let variants = load_variants(&cli.variants, &config.build_command)?;
    debug!(
        "Loaded {} {} configuration from {:?}",
        variants.len(),
        variants.config_type(),
        variants.config_path()
    );

    if let Some(path) = &cli.system_info {
        system_info::dump_sys_info(path, &config, &variants)?;
    }

    // The runner owns the generated scripts; they go away when it drops
    let runner = Runner::new(config.clone(), variants)?;
    let outcomes = runner.run()?;
    drop(runner);

    if let Some(path) = &cli.manifest {
        RunManifest::new(&config, &outcomes)
            .export_json(path)
            .with_context(|| format!("Failed to export manifest to {path:?}"))?;
        info!("Wrote run manifest to {path:?}");
    }

    info!("All {} variants completed", outcomes.len());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    if let Err(err) = run(&cli) {
        eprintln!("linkbench: {err:#}");
        process::exit(1);
    }
}
