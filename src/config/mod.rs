/// Harness settings built from the command line
pub mod harness;
pub use harness::{BuildMode, HarnessConfig, TargetConfig};

/// Variants file parsing and validation
pub mod variants;
pub use variants::{load_variants, ConfigError, Variant, VariantSet, DEFAULT_VARIANTS_FILE};

/// Configuration traits
pub mod traits;
pub use traits::Configuration;
