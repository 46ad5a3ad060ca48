//! Raster engine backed by an external program.
//!
//! Each operation runs `<command> <operation> <target>` with the request as
//! JSON on stdin. A zero exit status with a path on the last non-empty line
//! of stdout is success; anything else is a `RasterError`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use skreddata_pipeline::{
    CrossSectionRequest, ElevationRequest, FetchRequest, RasterEngine, RasterError,
};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub(crate) struct CommandRasterEngine {
    program: String,
    args: Vec<String>,
}

impl CommandRasterEngine {
    /// `command` is split on whitespace into a program and leading arguments.
    pub fn new(command: &str) -> Result<Self, String> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| "raster command is empty".to_string())?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    async fn invoke<T: Serialize + Sync>(
        &self,
        operation: &str,
        target: &Path,
        request: &T,
    ) -> Result<PathBuf, RasterError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| RasterError::Failed(format!("serialize {operation} request: {e}")))?;

        debug!(
            program = %self.program,
            operation,
            target = %target.display(),
            "running raster command"
        );
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(operation)
            .arg(target)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RasterError::Unavailable(format!("could not start '{}': {e}", self.program))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that ignores its input may exit before reading it;
            // the exit status decides the outcome then.
            match stdin.write_all(&body).await {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(RasterError::Failed(format!("write {operation} request: {e}")));
                }
                _ => {}
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RasterError::Failed(format!("wait for '{}': {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RasterError::Failed(format!(
                "{operation} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| RasterError::Failed(format!("{operation} printed no output path")))
    }
}

#[async_trait]
impl RasterEngine for CommandRasterEngine {
    async fn fetch_scene(&self, request: &FetchRequest) -> Result<PathBuf, RasterError> {
        self.invoke("fetch", &request.scene_dir, request).await
    }

    async fn render_cross_section(
        &self,
        request: &CrossSectionRequest,
        target: &Path,
    ) -> Result<PathBuf, RasterError> {
        self.invoke("cross-section", target, request).await
    }

    async fn render_elevation(
        &self,
        request: &ElevationRequest,
        target: &Path,
    ) -> Result<PathBuf, RasterError> {
        self.invoke("elevation", target, request).await
    }
}
