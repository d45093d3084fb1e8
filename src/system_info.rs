use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use sysinfo::System;

use crate::config::{HarnessConfig, VariantSet};

/// Describe the host and the run settings, so results can be compared later
#[rustfmt::skip]
pub fn dump_sys_info(file: &Path, config: &HarnessConfig, variants: &VariantSet) -> Result<()> {
    info!("Writing system info to {file:?}");
    let mut file = File::create(file)
        .with_context(|| format!("Failed to create system info file {file:?}"))?;
    let mut sys = System::new_all();
    sys.refresh_all();

    {
    writeln!(file, "{:<25}{}", "System name:", System::name().unwrap_or_else(|| "<unknown>".to_owned()))?;
    writeln!(file, "{:<25}{}", "System kernel version:", System::kernel_version().unwrap_or_else(|| "<unknown>".to_owned()))?;
    writeln!(file, "{:<25}{}", "System OS version:", System::long_os_version().unwrap_or_else(|| "<unknown>".to_owned()))?;
    writeln!(file, "{:<25}{}", "Host name:", System::host_name().unwrap_or_else(|| "<unknown>".to_owned()))?;
    }
    writeln!(file, "{:<25}{}", "CPU Arch:", System::cpu_arch())?;
    let processors = sys.cpus();
    if let Some(processor) = processors.first() {
    writeln!(file, "{:<25}{} ({}) @ {:.2} GHz",
        "CPU:",
            processor.brand(),
            processors.len(),
            processor.frequency() as f64 / 1000.0)?;
    } else {
        writeln!(file, "CPU: Unknown")?;
    }
    writeln!(file, "{:<25}{} bytes", "Total memory:", sys.total_memory())?;
    writeln!(file, "{:<25}{} bytes", "Available memory:", sys.available_memory())?;
    writeln!(file, "{:<25}{:.2} {:.2} {:.2}", "Load average:",
        System::load_average().one, System::load_average().five, System::load_average().fifteen)?;

    // Run settings
    writeln!(file, "{:<25}{}", "Mode:", config.mode.phase())?;
    writeln!(file, "{:<25}{}", "Iterations:", config.iterations)?;
    writeln!(file, "{:<25}{}", "Without debug phase:", config.without_debug)?;
    writeln!(file, "{:<25}{}", "Perflock:", config.perflock)?;
    writeln!(file, "{:<25}{} ({})", "Target:", config.target.name, config.target.package)?;
    for variant in variants.iter() {
    writeln!(file, "{:<25}{} root={} extra={:?} parallelism={}",
        "Variant:",
            variant.tag,
            variant.toolchain_root.display(),
            variant.extra_args,
            variant.parallelism)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_dump_sys_info() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("system_info");
        let variants = VariantSet::parse(
            Path::new("variants.txt"),
            Path::new("bin/go"),
            "master:/ssd/go.master\ndev:/ssd/go.dev::2\n",
        )
        .unwrap();

        dump_sys_info(&path, &HarnessConfig::default(), &variants).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("CPU Arch:"));
        assert!(contents
            .lines()
            .any(|line| line.starts_with("Mode:") && line.ends_with("relink")));
        assert!(contents.contains("dev root=/ssd/go.dev extra=\"\" parallelism=2"));
    }
}
