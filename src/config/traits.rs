use std::path::Path;

/// Common trait for configuration types
pub trait Configuration {
    /// Returns the file or directory this configuration is anchored to
    fn config_path(&self) -> &Path;

    /// Returns a string identifier for the configuration type
    fn config_type(&self) -> &str;

    /// Validates the configuration
    fn validate(&self) -> anyhow::Result<()>;
}
