use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::benchmarks::results::VariantOutcome;
use crate::config::{BuildMode, HarnessConfig};

/// Summary of a harness run, written next to the results files
#[derive(Debug, Serialize)]
pub struct RunManifest<'a> {
    pub mode: BuildMode,
    pub iterations: usize,
    pub without_debug: bool,
    pub dry_run: bool,
    pub target: &'a str,
    pub variants: &'a [VariantOutcome],
}

impl<'a> RunManifest<'a> {
    pub fn new(config: &'a HarnessConfig, variants: &'a [VariantOutcome]) -> Self {
        Self {
            mode: config.mode,
            iterations: config.iterations,
            without_debug: config.without_debug,
            dry_run: config.dry_run,
            target: &config.target.name,
            variants,
        }
    }

    /// Export the manifest as pretty JSON
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let json_data =
            serde_json::to_string_pretty(self).context("Failed to serialize run manifest")?;

        std::fs::write(path, json_data)
            .with_context(|| format!("Failed to write run manifest to {path:?}"))?;

        Ok(())
    }
}
