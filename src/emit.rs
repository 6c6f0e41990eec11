//! Fail-fast versus lenient failure propagation.
//!
//! One-shot builds want the first compile error to stop the process. A watch
//! loop must survive a broken file and keep watching. Tasks carry the mode in
//! their [`TaskContext`](crate::build::TaskContext); the process-wide switch
//! below exists for drivers that toggle it once before kicking off tasks.

use std::sync::atomic::{AtomicBool, Ordering};

/// Failure propagation policy for gated stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitMode {
    /// Stage failures propagate and halt the pipeline.
    Emitting,
    /// Stage failures are reported through the notifier and the pipeline continues.
    #[default]
    Suppressed,
}

impl EmitMode {
    /// Build a mode from a fail-fast switch.
    pub fn from_fail_fast(fail_fast: bool) -> Self {
        if fail_fast {
            EmitMode::Emitting
        } else {
            EmitMode::Suppressed
        }
    }

    /// Whether gated failures halt the pipeline.
    pub fn is_fail_fast(self) -> bool {
        matches!(self, EmitMode::Emitting)
    }
}

impl std::fmt::Display for EmitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitMode::Emitting => write!(f, "emitting"),
            EmitMode::Suppressed => write!(f, "suppressed"),
        }
    }
}

static FAIL_FAST: AtomicBool = AtomicBool::new(false);

/// Make gated stage failures fatal for tasks built from now on.
pub fn enable_fail_fast() {
    FAIL_FAST.store(true, Ordering::SeqCst);
}

/// Make gated stage failures report-only for tasks built from now on.
pub fn disable_fail_fast() {
    FAIL_FAST.store(false, Ordering::SeqCst);
}

/// The process-wide mode. Starts out [`EmitMode::Suppressed`].
pub fn current_mode() -> EmitMode {
    EmitMode::from_fail_fast(FAIL_FAST.load(Ordering::SeqCst))
}
