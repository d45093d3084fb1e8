mod env_overlay;
pub use env_overlay::with_parallelism;
mod export;
pub use export::RunManifest;
mod results;
pub use results::{benchmark_name, BenchRecord, PhaseOutcome, VariantOutcome, WITHOUT_DEBUG_SUFFIX};
mod revision;
pub use revision::{FixedRevision, GitRevision, RevisionSource};
mod runner;
pub use runner::Runner;
mod script;
pub use script::{ScriptFile, ScriptFiles, ScriptGenerator, STRIP_DEBUG_FLAGS, WARMUP_ARG};
mod timer;
pub use timer::run_timed;
