use log::{info, warn};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::traits::Configuration;
use crate::path_utils;

pub const DEFAULT_VARIANTS_FILE: &str = "variants.txt";

/// Errors raised while reading the variants file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read variants file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("variants file line {line} malformed: expected 2 to 4 fields, got {fields}")]
    Malformed { line: usize, fields: usize },
    #[error("tag '{tag}' appears more than once in variants file")]
    DuplicateTag { tag: String },
    #[error("tag '{tag}' has bad parallelism value '{value}'")]
    BadParallelism { tag: String, value: String },
    #[error("tag '{tag}' has invalid parallelism value {value}")]
    InvalidParallelism { tag: String, value: i64 },
    #[error("variants file {path:?} has no content")]
    Empty { path: PathBuf },
    #[error("could not open build command {path:?}: {source}")]
    MissingBuildCommand {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One toolchain configuration under comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Unique identifier, used in output file and binary names
    pub tag: String,
    /// Root of the toolchain installation
    pub toolchain_root: PathBuf,
    /// Whitespace-separated arguments appended to build invocations
    pub extra_args: String,
    /// Value for the parallelism variable, 0 inherits the ambient setting
    pub parallelism: u32,
}

impl Variant {
    pub fn new(tag: impl Into<String>, toolchain_root: impl Into<PathBuf>) -> Self {
        Self {
            tag: tag.into(),
            toolchain_root: toolchain_root.into(),
            extra_args: String::new(),
            parallelism: 0,
        }
    }

    /// Extra build arguments split into tokens
    pub fn extra_arg_tokens(&self) -> Vec<&str> {
        self.extra_args.split_whitespace().collect()
    }

    /// Parallelism override, if one was configured
    pub fn parallelism(&self) -> Option<u32> {
        (self.parallelism > 0).then_some(self.parallelism)
    }

    /// Full path of the build command inside this variant's toolchain
    pub fn build_command_path(&self, build_command: &Path) -> PathBuf {
        self.toolchain_root.join(build_command)
    }

    /// Parse one `tag:root[:extra[:parallelism]]` entry
    fn parse_line(line: &str, line_number: usize) -> Result<Self, ConfigError> {
        let fields: Vec<&str> = line.split(':').collect();
        if !(2..=4).contains(&fields.len()) {
            return Err(ConfigError::Malformed {
                line: line_number,
                fields: fields.len(),
            });
        }

        let mut variant = Variant::new(
            fields[0].trim(),
            path_utils::expand_path_str(fields[1].trim()),
        );
        if let Some(extra) = fields.get(2) {
            variant.extra_args = extra.trim().to_string();
        }
        if let Some(value) = fields.get(3).filter(|value| !value.trim().is_empty()) {
            variant.parallelism = parse_parallelism(&variant.tag, value)?;
        }
        Ok(variant)
    }
}

fn parse_parallelism(tag: &str, value: &str) -> Result<u32, ConfigError> {
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::BadParallelism {
            tag: tag.to_string(),
            value: value.to_string(),
        })?;
    if parsed < 1 {
        return Err(ConfigError::InvalidParallelism {
            tag: tag.to_string(),
            value: parsed,
        });
    }
    u32::try_from(parsed).map_err(|_| ConfigError::BadParallelism {
        tag: tag.to_string(),
        value: value.to_string(),
    })
}

/// The ordered set of variants loaded from a variants file
#[derive(Debug, Clone)]
pub struct VariantSet {
    /// File the variants were read from
    pub path: PathBuf,
    /// Build command location relative to each toolchain root
    pub build_command: PathBuf,
    /// Variants in file order
    pub variants: Vec<Variant>,
    /// Non-fatal problems found while parsing, already logged
    pub warnings: Vec<String>,
}

impl VariantSet {
    /// Parse variants file contents, checking tag uniqueness and entry count
    pub fn parse(
        path: &Path,
        build_command: &Path,
        contents: &str,
    ) -> Result<Self, ConfigError> {
        let mut variants = Vec::new();
        let mut tags = HashSet::new();
        let mut roots = HashSet::new();
        let mut warnings = Vec::new();

        for (index, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let variant = Variant::parse_line(trimmed, index + 1)?;
            if !tags.insert(variant.tag.clone()) {
                return Err(ConfigError::DuplicateTag { tag: variant.tag });
            }
            if !roots.insert(variant.toolchain_root.clone()) {
                warnings.push(format!(
                    "toolchain root {:?} appears more than once in variants file",
                    variant.toolchain_root
                ));
            }
            variants.push(variant);
        }

        if variants.is_empty() {
            return Err(ConfigError::Empty {
                path: path.to_path_buf(),
            });
        }
        if variants.len() == 1 {
            warnings.push(format!("variants file {path:?} has only a single entry"));
        }
        for warning in &warnings {
            warn!("{warning}");
        }

        Ok(Self {
            path: path.to_path_buf(),
            build_command: build_command.to_path_buf(),
            variants,
            warnings,
        })
    }

    /// Check every toolchain root exposes the build command
    pub fn check_toolchains(&self) -> Result<(), ConfigError> {
        for variant in &self.variants {
            let command = variant.build_command_path(&self.build_command);
            File::open(&command)
                .map_err(|source| ConfigError::MissingBuildCommand {
                    path: command.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variant> {
        self.variants.iter()
    }
}

impl Configuration for VariantSet {
    fn config_path(&self) -> &Path {
        &self.path
    }

    fn config_type(&self) -> &str {
        "variants"
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.check_toolchains()?;
        Ok(())
    }
}

/// Load and validate the variants file, logging one remark per variant
pub fn load_variants(path: &Path, build_command: &Path) -> Result<VariantSet, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let set = VariantSet::parse(path, build_command, &contents)?;
    set.check_toolchains()?;

    for (index, variant) in set.iter().enumerate() {
        info!(
            "remark: variant {}: tag={} root={}",
            index,
            variant.tag,
            variant.toolchain_root.display()
        );
    }
    Ok(set)
}
