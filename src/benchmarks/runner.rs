use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::benchmarks::env_overlay::with_parallelism;
use crate::benchmarks::results::{
    benchmark_name, PhaseOutcome, VariantOutcome, WITHOUT_DEBUG_SUFFIX,
};
use crate::benchmarks::revision::{GitRevision, RevisionSource};
use crate::benchmarks::script::{ScriptFiles, ScriptGenerator, STRIP_DEBUG_FLAGS, WARMUP_ARG};
use crate::benchmarks::timer::run_timed;
use crate::command::{CommandExecutor, Environment};
use crate::config::{HarnessConfig, Variant, VariantSet};
use crate::path_utils;

/// Benchmark orchestrator driving every variant through its phases
///
/// For each variant, in file order, the Runner:
/// 1. Emits the build script for the variant
/// 2. Resolves the toolchain revision and opens `out.<tag>.<revision>.txt`
/// 3. Runs the clean script, then untimed warmup and prime builds
/// 4. Times `iterations` clean+build cycles, one record per build
/// 5. Optionally repeats the timed loop with `-ldflags="-s -w"`, still
///    passing the variant's extra build arguments
///
/// Any failure aborts the whole run; results files of finished variants
/// are left untouched.
pub struct Runner {
    /// Settings for this run
    config: HarnessConfig,
    /// Variants to benchmark
    variants: VariantSet,
    /// Clean and build scripts, removed when the Runner is dropped
    scripts: ScriptFiles,
    /// Source of revision tokens for output file names
    revisions: Box<dyn RevisionSource>,
}

impl Runner {
    /// Create a new Runner, emitting the clean script
    pub fn new(config: HarnessConfig, variants: VariantSet) -> Result<Self> {
        let scripts = ScriptFiles::create(&config)?;
        ScriptGenerator::new(&config).write_clean_script(&scripts.clean)?;

        if !config.dry_run {
            path_utils::ensure_directory(&config.out_dir)?;
        }

        Ok(Self {
            config,
            variants,
            scripts,
            revisions: Box::new(GitRevision),
        })
    }

    /// Replace the git-based revision lookup
    pub fn with_revision_source(mut self, revisions: impl RevisionSource + 'static) -> Self {
        self.revisions = Box::new(revisions);
        self
    }

    pub fn clean_script(&self) -> &Path {
        self.scripts.clean.path()
    }

    pub fn build_script(&self) -> &Path {
        self.scripts.build.path()
    }

    /// Benchmark all variants in order
    pub fn run(&self) -> Result<Vec<VariantOutcome>> {
        let mut outcomes = Vec::with_capacity(self.variants.len());
        for variant in self.variants.iter() {
            debug!("... starting variant: {variant:?}");
            let outcome = self.run_variant(variant)?;
            info!(
                "Variant {} completed with {} records",
                outcome.tag,
                outcome.total_records()
            );
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn executor(&self, environment: Option<Environment>) -> Result<CommandExecutor> {
        CommandExecutor::builder()
            .working_dir(Some(&self.config.work_dir))
            .environment(environment)
            .dry_run(self.config.dry_run)
            .build()
    }

    fn run_variant(&self, variant: &Variant) -> Result<VariantOutcome> {
        let generator = ScriptGenerator::new(&self.config);
        let phase = self.config.mode.phase();
        generator.write_build_script(&self.scripts.build, variant, "")?;

        let revision = self.revisions.revision(variant)?;
        let output_path = self
            .config
            .out_dir
            .join(path_utils::output_file_name(&variant.tag, &revision));
        let mut sink: Box<dyn Write> = if self.config.dry_run {
            info!("dryrun: open {} for output", output_path.display());
            Box::new(io::stderr())
        } else {
            let file = File::create(&output_path)
                .with_context(|| format!("Failed to create output file {output_path:?}"))?;
            Box::new(file)
        };

        debug!("... performing clean and/or warmup runs for variant {}", variant.tag);
        let untimed = self.executor(None)?;
        let args = variant.extra_arg_tokens();

        untimed
            .execute_script(self.clean_script(), &[])
            .with_context(|| format!("initial clean for {} failed", variant.tag))?;

        if !self.config.mode.is_rebuild() {
            let mut warmup_args = vec![WARMUP_ARG];
            warmup_args.extend_from_slice(&args);
            untimed
                .execute_script(self.build_script(), &warmup_args)
                .with_context(|| format!("initial {phase} for {} failed", variant.tag))?;
        }

        debug!("... priming with args: {args:?}");
        untimed
            .execute_script(self.build_script(), &args)
            .with_context(|| format!("initial {phase} for {} failed", variant.tag))?;

        let name = benchmark_name(phase, &self.config.target.name);
        let mut phases = vec![self.timed_loop(variant, &name, &args, sink.as_mut())?];

        if self.config.without_debug {
            generator.write_build_script(&self.scripts.build, variant, STRIP_DEBUG_FLAGS)?;
            let stripped = format!("{name}{WITHOUT_DEBUG_SUFFIX}");
            phases.push(self.timed_loop(variant, &stripped, &args, sink.as_mut())?);
        }

        sink.flush().context("Failed to flush output file")?;
        drop(sink);

        Ok(VariantOutcome {
            tag: variant.tag.clone(),
            revision,
            output: (!self.config.dry_run).then_some(output_path),
            phases,
        })
    }

    /// Clean, then time one build, `iterations` times
    fn timed_loop(
        &self,
        variant: &Variant,
        name: &str,
        args: &[&str],
        out: &mut dyn Write,
    ) -> Result<PhaseOutcome> {
        let cleaner = self.executor(None)?;
        let environment = variant
            .parallelism()
            .map(|value| with_parallelism(None, &self.config.parallelism_var, value));
        let timed = self.executor(environment)?;

        let progress = self.progress_bar(name)?;
        let mut records = 0;
        for i in 0..self.config.iterations {
            debug!("... timing run {i} of {name} for variant {}", variant.tag);
            cleaner
                .execute_script(self.clean_script(), &[])
                .with_context(|| format!("clean before timing run {i} for {} failed", variant.tag))?;

            debug!("... kicking off timing run {} {args:?}", self.build_script().display());
            let record = run_timed(name, &timed, self.build_script(), args, &mut *out)
                .with_context(|| format!("timing run {i} for {} failed", variant.tag))?;
            if record.is_some() {
                records += 1;
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(PhaseOutcome {
            benchmark: name.to_string(),
            records,
        })
    }

    fn progress_bar(&self, name: &str) -> Result<ProgressBar> {
        if self.config.verbose || self.config.dry_run {
            return Ok(ProgressBar::hidden());
        }

        let pb = ProgressBar::new(self.config.iterations as u64);
        pb.set_style(
            ProgressStyle::with_template("{msg} [{elapsed_precise}] [{bar:40.magenta/black}] {pos}/{len} ({eta})")
                .context("Invalid progress bar template")?
                .progress_chars("⟨⟨⟨⟨⟨····· "),
        );
        pb.set_message(name.to_string());
        Ok(pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmarks::revision::FixedRevision;
    use crate::config::BuildMode;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    // Work dir holding a stub toolchain whose `go` appends its args to calls.log
    fn setup() -> (TempDir, HarnessConfig, VariantSet) {
        let dir = tempdir().unwrap();
        let root = dir.path().join("go.stub");
        std::fs::create_dir_all(root.join("bin")).unwrap();
        let go = root.join("bin/go");
        std::fs::write(&go, "#!/bin/sh\necho \"$GOMAXPROCS go $*\" >> \"$(pwd)/calls.log\"\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&go, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = HarnessConfig {
            iterations: 2,
            work_dir: dir.path().to_path_buf(),
            out_dir: dir.path().join("results"),
            binary_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let contents = format!("stub:{}:-a:3\n", root.display());
        let variants =
            VariantSet::parse(Path::new("variants.txt"), Path::new("bin/go"), &contents).unwrap();
        (dir, config, variants)
    }

    fn calls(dir: &TempDir) -> Vec<String> {
        std::fs::read_to_string(dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_relink_phase_sequence() {
        let (dir, config, variants) = setup();
        let runner = Runner::new(config, variants)
            .unwrap()
            .with_revision_source(FixedRevision("abc".to_string()));
        let outcomes = runner.run().unwrap();

        let calls = calls(&dir);
        let binary = dir.path().join("kubelet.stub");
        let build = format!("go build -o {} -a k8s.io/kubernetes/cmd/kubelet", binary.display());
        // Warmup and prime inherit GOMAXPROCS, timed runs get the overlay
        assert_eq!(calls.len(), 5);
        assert!(calls[0].ends_with("go install -i k8s.io/kubernetes/cmd/kubelet"));
        assert!(calls[1].ends_with(&build));
        assert_eq!(calls[3], format!("3 {build}"));
        assert_eq!(calls[4], format!("3 {build}"));

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].revision, "abc");
        assert_eq!(
            outcomes[0].phases,
            vec![PhaseOutcome {
                benchmark: "BenchmarkRelinkKubelet".to_string(),
                records: 2,
            }]
        );

        let output = dir.path().join("results/out.stub.abc.txt");
        assert_eq!(outcomes[0].output, Some(output.clone()));
        let lines: Vec<String> = std::fs::read_to_string(output)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.starts_with("BenchmarkRelinkKubelet 1 ") && l.ends_with(" ns/op")));
    }

    #[test]
    fn test_rebuild_skips_warmup() {
        let (dir, config, variants) = setup();
        let config = HarnessConfig {
            mode: BuildMode::Rebuild,
            ..config
        };
        let runner = Runner::new(config, variants)
            .unwrap()
            .with_revision_source(FixedRevision("abc".to_string()));
        let outcomes = runner.run().unwrap();

        let calls = calls(&dir);
        assert!(calls.iter().all(|c| !c.contains("go install")));
        // prime + 2 timed, each preceded by a cache clean
        assert_eq!(calls.iter().filter(|c| c.contains("go clean -cache")).count(), 3);
        assert_eq!(calls.iter().filter(|c| c.contains("go build")).count(), 3);
        assert_eq!(outcomes[0].phases[0].benchmark, "BenchmarkRebuildKubelet");
    }

    #[test]
    fn test_stripped_phase_keeps_extra_args() {
        let (dir, config, variants) = setup();
        let config = HarnessConfig {
            without_debug: true,
            ..config
        };
        let runner = Runner::new(config, variants)
            .unwrap()
            .with_revision_source(FixedRevision("abc".to_string()));
        let outcomes = runner.run().unwrap();

        let calls = calls(&dir);
        let binary = dir.path().join("kubelet.stub");
        let stripped = format!(
            "3 go build -o {} -ldflags=-s -w -a k8s.io/kubernetes/cmd/kubelet",
            binary.display()
        );
        assert_eq!(calls.len(), 7);
        assert_eq!(calls[5], stripped);
        assert_eq!(calls[6], stripped);
        assert_eq!(outcomes[0].phases[1].benchmark, "BenchmarkRelinkKubelet-WithoutDebug");
        assert_eq!(outcomes[0].phases[1].records, 2);
    }

    #[test]
    fn test_dry_run_executes_nothing() {
        let (dir, config, variants) = setup();
        let config = HarnessConfig {
            dry_run: true,
            without_debug: true,
            ..config
        };
        let runner = Runner::new(config, variants)
            .unwrap()
            .with_revision_source(FixedRevision("abc".to_string()));
        let outcomes = runner.run().unwrap();

        assert!(calls(&dir).is_empty());
        assert!(!dir.path().join("results").exists());
        assert_eq!(outcomes[0].output, None);
        assert_eq!(outcomes[0].total_records(), 0);
        assert_eq!(outcomes[0].phases.len(), 2);
    }

    #[test]
    fn test_scripts_removed_with_runner() {
        let (_dir, config, variants) = setup();
        let runner = Runner::new(config, variants).unwrap();
        let paths: Vec<PathBuf> = vec![
            runner.clean_script().to_path_buf(),
            runner.build_script().to_path_buf(),
        ];
        assert!(paths.iter().all(|p| p.exists()));
        drop(runner);
        assert!(paths.iter().all(|p| !p.exists()));
    }
}
