use std::io;
use thiserror::Error;

/// Faults the engine itself can hit. Learner-attributable outcomes
/// (compile errors, crashes, timeouts, wrong output) are verdict states,
/// not errors; everything here is either a misconfigured challenge or a
/// host problem, and is never phrased as the learner's fault.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The challenge definition asked the harness generator for something
    /// it cannot render. Caught before any compiler invocation.
    #[error("harness generation failed: {0}")]
    Harness(String),

    /// The host could not launch a subprocess (compiler or learner binary).
    #[error("failed to spawn {what}: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// A toolchain subprocess blew through its own deadline. Attributed to
    /// the environment, not the submission.
    #[error("{what} did not finish within {timeout_ms}ms")]
    ToolchainHang { what: &'static str, timeout_ms: u64 },

    /// Workspace filesystem operations failed.
    #[error("workspace error: {0}")]
    Workspace(#[from] io::Error),
}

impl EngineError {
    pub fn spawn(what: &'static str, source: io::Error) -> Self {
        Self::Spawn { what, source }
    }

    /// True when the challenge definition, rather than the host, is at
    /// fault. Steers the learner-facing feedback message.
    pub fn is_structural(&self) -> bool {
        matches!(self, EngineError::Harness(_))
    }
}
