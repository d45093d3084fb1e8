use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Suffix for benchmarks of the stripped-symbol phase
pub const WITHOUT_DEBUG_SUFFIX: &str = "-WithoutDebug";

/// One measurement in the textual micro-benchmark format read by benchstat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchRecord {
    /// Benchmark name, e.g. `BenchmarkRelinkKubelet`
    pub name: String,
    /// Wall-clock duration of the single iteration in nanoseconds
    pub nanos: u128,
}

impl BenchRecord {
    pub fn new(name: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            nanos: elapsed.as_nanos(),
        }
    }
}

impl fmt::Display for BenchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 1 {} ns/op", self.name, self.nanos)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Benchmark name for a phase and target, e.g. `relink` + `kubelet`
/// gives `BenchmarkRelinkKubelet`
pub fn benchmark_name(phase: &str, target: &str) -> String {
    format!("Benchmark{}{}", capitalize(phase), capitalize(target))
}

/// Records written for one benchmark name
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub benchmark: String,
    pub records: usize,
}

/// Everything a finished variant produced
#[derive(Debug, Clone, Serialize)]
pub struct VariantOutcome {
    pub tag: String,
    pub revision: String,
    /// Results file, `None` in dry-run mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub phases: Vec<PhaseOutcome>,
}

impl VariantOutcome {
    pub fn total_records(&self) -> usize {
        self.phases.iter().map(|p| p.records).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_format() {
        let record = BenchRecord::new("BenchmarkFooKubelet", Duration::from_nanos(14_500_000_123));
        assert_eq!(record.to_string(), "BenchmarkFooKubelet 1 14500000123 ns/op");
    }

    #[test]
    fn test_benchmark_name() {
        assert_eq!(benchmark_name("relink", "kubelet"), "BenchmarkRelinkKubelet");
        assert_eq!(benchmark_name("rebuild", "kubelet"), "BenchmarkRebuildKubelet");
        assert_eq!(
            format!("{}{}", benchmark_name("relink", "kubelet"), WITHOUT_DEBUG_SUFFIX),
            "BenchmarkRelinkKubelet-WithoutDebug"
        );
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_total_records() {
        let outcome = VariantOutcome {
            tag: "master".to_string(),
            revision: "abc".to_string(),
            output: None,
            phases: vec![
                PhaseOutcome {
                    benchmark: "BenchmarkRelinkKubelet".to_string(),
                    records: 3,
                },
                PhaseOutcome {
                    benchmark: "BenchmarkRelinkKubelet-WithoutDebug".to_string(),
                    records: 3,
                },
            ],
        };
        assert_eq!(outcome.total_records(), 6);
    }
}
