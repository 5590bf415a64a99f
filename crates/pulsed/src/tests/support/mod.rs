//! Test harness utilities for the lifecycle behavioural suite.

mod doubles;
mod lifecycle_world;
mod reporter;

pub use doubles::{RecordingSignaller, ScriptedSignals, TestDaemonizer, TestLauncher};
pub use lifecycle_world::{LifecycleWorld, StepResult, own_pid};
pub use reporter::{HealthEvent, RecordingHealthReporter};
