//! Image optimization collaborators.
//!
//! An optimizer only ever offers smaller replacement bytes. Ingestion treats
//! any failure as "keep the original".

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::process::Command;

/// Default wall-clock limit for one optimizer run.
pub const DEFAULT_OPTIMIZER_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ImageOptimizer: Send + Sync {
    /// Returns replacement bytes, or `None` to keep the input unchanged.
    async fn optimize(&self, data: &[u8], extension: &str) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Leaves every image as uploaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOptimizer;

#[async_trait]
impl ImageOptimizer for NoopOptimizer {
    async fn optimize(&self, _data: &[u8], _extension: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Runs an external binary as `<program> <input> <output>`.
///
/// The output is adopted only when the process exits successfully and
/// produced a non-empty file smaller than the input.
#[derive(Debug, Clone)]
pub struct CommandOptimizer {
    program: PathBuf,
    timeout: Duration,
}

impl CommandOptimizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_OPTIMIZER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ImageOptimizer for CommandOptimizer {
    #[tracing::instrument(skip(self, data), fields(program = %self.program.display(), size_bytes = data.len()))]
    async fn optimize(&self, data: &[u8], extension: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let workdir = tempfile::tempdir().context("Failed to create optimizer workdir")?;
        let input = workdir.path().join(format!("input.{}", extension));
        let output = workdir.path().join(format!("output.{}", extension));

        tokio::fs::write(&input, data)
            .await
            .context("Failed to write optimizer input")?;

        let start = Instant::now();
        let child = Command::new(&self.program)
            .arg(&input)
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program.display()))?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .with_context(|| format!("Optimizer timed out after {:?}", self.timeout))?
            .context("Failed to wait for optimizer")?;

        if !result.status.success() {
            bail!(
                "Optimizer exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        let optimized = match tokio::fs::read(&output).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read optimizer output"),
        };

        tracing::debug!(
            original_bytes = data.len(),
            optimized_bytes = optimized.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Optimizer finished"
        );

        if optimized.is_empty() || optimized.len() >= data.len() {
            return Ok(None);
        }
        Ok(Some(optimized))
    }
}
