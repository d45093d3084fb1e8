use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::traits::Configuration;

pub const DEFAULT_ITERATIONS: usize = 20;
pub const DEFAULT_TARGET: &str = "kubelet";
pub const DEFAULT_PACKAGE: &str = "k8s.io/kubernetes/cmd/kubelet";
pub const DEFAULT_BUILD_COMMAND: &str = "bin/go";
pub const DEFAULT_PARALLELISM_VAR: &str = "GOMAXPROCS";

/// What each timed invocation measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Incremental relink of an already-built target
    #[default]
    Relink,
    /// Full build with the build cache cleared before every run
    Rebuild,
}

impl BuildMode {
    /// Phase name used for script prefixes and benchmark names
    pub fn phase(&self) -> &'static str {
        match self {
            BuildMode::Relink => "relink",
            BuildMode::Rebuild => "rebuild",
        }
    }

    pub fn is_rebuild(&self) -> bool {
        matches!(self, BuildMode::Rebuild)
    }
}

/// The binary being built in every variant
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// Binary name, also used for the output binary and benchmark names
    pub name: String,
    /// Package path handed to the build command
    pub package: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TARGET.to_string(),
            package: DEFAULT_PACKAGE.to_string(),
        }
    }
}

/// Immutable settings for a single harness run, built once at startup
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Emit trace output for every step
    pub verbose: bool,
    /// Relink or whole-build benchmarking
    pub mode: BuildMode,
    /// Timed iterations per phase
    pub iterations: usize,
    /// Run a second phase with symbols stripped from the output binary
    pub without_debug: bool,
    /// Generate scripts and log intended actions without executing anything
    pub dry_run: bool,
    /// Wrap timed builds in `perflock`
    pub perflock: bool,
    /// Keep generated scripts after the run
    pub preserve_scripts: bool,
    /// Target binary and package
    pub target: TargetConfig,
    /// Build command location relative to each toolchain root
    pub build_command: PathBuf,
    /// Environment variable bounding the build command's parallelism
    pub parallelism_var: String,
    /// Directory the generated scripts run in
    pub work_dir: PathBuf,
    /// Directory that receives the per-variant output files
    pub out_dir: PathBuf,
    /// Directory the build command writes its binary into
    pub binary_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            mode: BuildMode::default(),
            iterations: DEFAULT_ITERATIONS,
            without_debug: false,
            dry_run: false,
            perflock: false,
            preserve_scripts: false,
            target: TargetConfig::default(),
            build_command: PathBuf::from(DEFAULT_BUILD_COMMAND),
            parallelism_var: DEFAULT_PARALLELISM_VAR.to_string(),
            work_dir: PathBuf::from("."),
            out_dir: PathBuf::from("."),
            binary_dir: std::env::temp_dir(),
        }
    }
}

impl HarnessConfig {
    /// Name of the build command binary, e.g. `go`
    pub fn build_command_name(&self) -> String {
        self.build_command
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory of the build command relative to a toolchain root, e.g. `bin`
    pub fn build_command_dir(&self) -> &Path {
        self.build_command.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Path of the binary produced for a given variant tag
    pub fn output_binary(&self, tag: &str) -> PathBuf {
        self.binary_dir.join(format!("{}.{}", self.target.name, tag))
    }
}

impl Configuration for HarnessConfig {
    fn config_path(&self) -> &Path {
        &self.work_dir
    }

    fn config_type(&self) -> &str {
        "harness"
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.iterations == 0 {
            anyhow::bail!("Iteration count must be at least 1");
        }
        if self.target.name.is_empty() {
            anyhow::bail!("Target name cannot be empty");
        }
        if self.target.package.is_empty() {
            anyhow::bail!("Target package cannot be empty");
        }
        if self.build_command_name().is_empty() || self.build_command.is_absolute() {
            anyhow::bail!(
                "Build command must be a relative path inside the toolchain root: {}",
                self.build_command.display()
            );
        }
        if self.parallelism_var.is_empty() || self.parallelism_var.contains('=') {
            anyhow::bail!("Invalid parallelism variable: {:?}", self.parallelism_var);
        }
        if !self.work_dir.is_dir() {
            anyhow::bail!("Work directory not found: {}", self.work_dir.display());
        }
        Ok(())
    }
}
