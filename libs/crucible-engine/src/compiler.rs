//! Compiler invocation and per-submission workspace lifecycle.
//!
//! Each submission gets its own working directory, named after the
//! submission id, under the configured work root. The directory is owned
//! exclusively by that submission and removed on every exit path via the
//! `Workspace` drop guard.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crucible_common::config::CompilerConfig;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::EngineError;

/// Scoped ownership of one submission's working directory. Dropping the
/// workspace removes the whole tree, best-effort.
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Create the working directory for a submission. The name is derived
    /// from the submission id, so it is structurally unique rather than
    /// merely probabilistically so.
    pub fn create(work_root: &Path, submission_id: Uuid) -> Result<Self, EngineError> {
        let dir = work_root.join(format!("submission-{}", submission_id));
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.join("code.c")
    }

    pub fn binary_path(&self) -> PathBuf {
        self.dir.join("program")
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %e, "failed to remove workspace");
            }
        }
    }
}

#[derive(Debug)]
pub enum CompileOutcome {
    /// Binary is ready at `Workspace::binary_path`.
    Success,
    /// Compiler rejected the source; stderr is surfaced verbatim to the
    /// learner.
    Failure { stderr: String },
}

/// Write the source into the workspace and invoke the C compiler, bounded
/// by the compile timeout. A hung or unlaunchable compiler is an
/// infrastructure fault, never attributed to the submission.
pub async fn compile(
    workspace: &Workspace,
    source: &str,
    config: &CompilerConfig,
) -> Result<CompileOutcome, EngineError> {
    let source_path = workspace.source_path();
    let binary_path = workspace.binary_path();
    tokio::fs::write(&source_path, source).await?;

    let mut cmd = Command::new(&config.cc);
    cmd.arg(&source_path)
        .arg("-o")
        .arg(&binary_path)
        .args(&config.extra_args)
        .current_dir(workspace.dir())
        .kill_on_drop(true);

    debug!(
        cc = %config.cc,
        source = %source_path.display(),
        "invoking compiler"
    );

    let output = match tokio::time::timeout(
        Duration::from_millis(config.compile_timeout_ms),
        cmd.output(),
    )
    .await
    {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(EngineError::spawn("compiler", e)),
        Err(_) => {
            return Err(EngineError::ToolchainHang {
                what: "compiler",
                timeout_ms: config.compile_timeout_ms,
            })
        }
    };

    if output.status.success() {
        Ok(CompileOutcome::Success)
    } else {
        Ok(CompileOutcome::Failure {
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
