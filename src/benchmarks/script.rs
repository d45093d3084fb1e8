use anyhow::{Context, Result};
use log::{debug, info};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

use crate::config::{HarnessConfig, Variant};

/// Argument that switches the build script into warmup mode
pub const WARMUP_ARG: &str = "warmup";

/// Extra build flags producing a binary without symbol or debug information
pub const STRIP_DEBUG_FLAGS: &str = "-ldflags=\"-s -w\"";

/// A generated script on disk, removed on drop unless preserved
#[derive(Debug)]
pub struct ScriptFile {
    path: PathBuf,
    _guard: Option<TempPath>,
}

impl ScriptFile {
    /// Create an empty temporary script file named after `prefix`
    pub fn create(prefix: &str, preserve: bool) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".sh")
            .tempfile()
            .with_context(|| format!("Failed to create {prefix} script"))?
            .into_temp_path();

        if preserve {
            let path = temp
                .keep()
                .with_context(|| format!("Failed to preserve {prefix} script"))?;
            info!("... preserving {prefix} script {}", path.display());
            Ok(Self { path, _guard: None })
        } else {
            Ok(Self {
                path: temp.to_path_buf(),
                _guard: Some(temp),
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole file with `contents`
    pub fn write(&self, contents: &str) -> Result<()> {
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write script {}", self.path.display()))?;
        debug!("Wrote script {}:\n{contents}", self.path.display());
        Ok(())
    }
}

/// The clean and build scripts shared by every variant of a run
#[derive(Debug)]
pub struct ScriptFiles {
    pub clean: ScriptFile,
    pub build: ScriptFile,
}

impl ScriptFiles {
    pub fn create(config: &HarnessConfig) -> Result<Self> {
        Ok(Self {
            clean: ScriptFile::create("clean", config.preserve_scripts)?,
            build: ScriptFile::create(config.mode.phase(), config.preserve_scripts)?,
        })
    }
}

/// Renders the shell scripts driven by the orchestrator
pub struct ScriptGenerator<'a> {
    config: &'a HarnessConfig,
}

impl<'a> ScriptGenerator<'a> {
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    /// Locations the target binary is installed to inside the work directory
    fn installed_binaries(&self) -> [String; 2] {
        let name = &self.config.target.name;
        [
            format!("./_output/local/go/bin/{name}"),
            format!("./_output/local/bin/linux/amd64/{name}"),
        ]
    }

    /// Script removing previously built binaries
    pub fn render_clean_script(&self) -> String {
        let mut script = String::from("#!/bin/sh\n");
        if !self.config.dry_run {
            let _ = writeln!(script, "rm -rf {}", self.installed_binaries().join(" "));
        }
        script
    }

    /// Script building the target with `variant`'s toolchain.
    ///
    /// An optional first argument `warmup` primes dependencies; remaining
    /// arguments are exported as `INJECT` and passed to the build command.
    pub fn render_build_script(&self, variant: &Variant, extra: &str) -> String {
        let config = self.config;
        let go = config.build_command_name();
        let package = &config.target.package;
        let binary = config.output_binary(&variant.tag);
        let bin_dir = variant.toolchain_root.join(config.build_command_dir());

        let mut script = String::from("#!/bin/sh\n");
        script.push_str("HERE=`pwd`\n");
        script.push_str("WARMUP=\"$1\"\n");
        let _ = writeln!(script, "if [ \"$WARMUP\" = \"{WARMUP_ARG}\" ]; then");
        script.push_str("  shift\n");
        script.push_str("fi\n");
        script.push_str("export INJECT=\"$*\"\n");
        script.push_str("export GOCACHE=$HERE/_output/local/go/cache\n");
        script.push_str("export GOPATH=$HERE/_output/local/go\n");
        let _ = writeln!(script, "export PATH=\"{}:${{PATH}}\"", bin_dir.display());

        if config.dry_run {
            return script;
        }

        if !config.mode.is_rebuild() {
            let _ = writeln!(script, "if [ \"$WARMUP\" = \"{WARMUP_ARG}\" ]; then");
            let _ = writeln!(script, "  {go} install -i {package}");
            script.push_str("fi\n");
        }
        let _ = writeln!(script, "rm -f {}", binary.display());
        if config.mode.is_rebuild() {
            let _ = writeln!(script, "{go} clean -cache");
        }

        let lock = if config.perflock { "perflock " } else { "" };
        let mut build = format!("{lock}{go} build -o {}", binary.display());
        if !extra.is_empty() {
            build.push(' ');
            build.push_str(extra);
        }
        let _ = writeln!(script, "{build} \"$@\" {package}");
        script
    }

    pub fn write_clean_script(&self, file: &ScriptFile) -> Result<()> {
        file.write(&self.render_clean_script())
    }

    pub fn write_build_script(&self, file: &ScriptFile, variant: &Variant, extra: &str) -> Result<()> {
        file.write(&self.render_build_script(variant, extra))
    }
}
