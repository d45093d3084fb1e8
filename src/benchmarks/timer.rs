use anyhow::{Context, Result};
use log::{debug, info};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use crate::benchmarks::results::BenchRecord;
use crate::command::{combined_output, CommandExecutor};

/// Run `script` once, timing it, and append its record to `out`.
///
/// In dry-run mode nothing is launched and no record is written.
pub fn run_timed<W: Write + ?Sized>(
    name: &str,
    executor: &CommandExecutor,
    script: &Path,
    args: &[&str],
    out: &mut W,
) -> Result<Option<BenchRecord>> {
    if executor.is_dry_run() {
        info!("... executing timing run {name}");
        executor.execute_script(script, args)?;
        return Ok(None);
    }

    let start = Instant::now();
    let output = executor.execute_script(script, args)?;
    let record = BenchRecord::new(name, start.elapsed());

    if let Some(output) = &output {
        debug!("... output: {}", combined_output(output));
    }
    debug!("... timing run took {} ns", record.nanos);

    writeln!(out, "{record}").context("Failed to write benchmark record")?;
    out.flush().context("Failed to flush benchmark record")?;
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn script(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "#!/bin/sh\n{body}\n").unwrap();
        file
    }

    #[test]
    fn test_successful_run_appends_one_record() {
        let script = script("exit 0");
        let mut out: Vec<u8> = b"BenchmarkEarlier 1 5 ns/op\n".to_vec();

        let record = run_timed(
            "BenchmarkFooKubelet",
            &CommandExecutor::new(),
            script.path(),
            &[],
            &mut out,
        )
        .unwrap()
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            format!(
                "BenchmarkEarlier 1 5 ns/op\nBenchmarkFooKubelet 1 {} ns/op\n",
                record.nanos
            )
        );
        assert!(record.nanos > 0);
    }

    #[test]
    fn test_duration_covers_command() {
        let script = script("sleep 0.2");
        let mut out = Vec::new();
        let record = run_timed("BenchmarkSleep", &CommandExecutor::new(), script.path(), &[], &mut out)
            .unwrap()
            .unwrap();
        assert!(record.nanos >= 200_000_000);
    }

    #[test]
    fn test_failure_writes_nothing() {
        let script = script("echo link failed >&2\nexit 1");
        let mut out = Vec::new();

        let err = run_timed("BenchmarkFail", &CommandExecutor::new(), script.path(), &[], &mut out)
            .unwrap_err();
        assert!(format!("{err:#}").contains("link failed"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let script = script(&format!("touch {}", marker.display()));
        let executor = CommandExecutor::builder().dry_run(true).build().unwrap();
        let mut out = Vec::new();

        let record = run_timed("BenchmarkDry", &executor, script.path(), &[], &mut out).unwrap();
        assert!(record.is_none());
        assert!(out.is_empty());
        assert!(!marker.exists());
    }
}
