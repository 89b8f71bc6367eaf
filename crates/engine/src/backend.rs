//! Command-backed inference adapters
//!
//! Detection and OCR models run out of process: the frame is written to
//! a temp file and handed to a configured command, which prints its
//! results as JSON on stdout. This keeps heavyweight model runtimes
//! (and their failure modes) out of the orchestrator's address space;
//! a crashed model is just a non-zero exit status.

use crate::detect::{Detector, RawDetection};
use crate::ocr::{TextFragment, TextRecognizer};
use async_trait::async_trait;
use image::DynamicImage;
use reelcheck_common::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Object detection via an external command.
///
/// Invoked as `program [args..] <frame.png>`; expected to print a JSON
/// array of raw detections on stdout.
pub struct CommandDetector {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Detector for CommandDetector {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        run_inference(&self.program, &self.args, image).await
    }
}

/// OCR via an external command, same invocation contract as the
/// detector but yielding positioned text fragments.
pub struct CommandRecognizer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl TextRecognizer for CommandRecognizer {
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextFragment>> {
        run_inference(&self.program, &self.args, image).await
    }
}

async fn run_inference<T: DeserializeOwned>(
    program: &PathBuf,
    args: &[String],
    image: &DynamicImage,
) -> Result<Vec<T>> {
    let dir = tempfile::tempdir().map_err(|e| Error::Adapter(format!("tempdir: {}", e)))?;
    let frame_path = dir.path().join("frame.png");
    image
        .save(&frame_path)
        .map_err(|e| Error::Adapter(format!("failed to write frame: {}", e)))?;

    debug!(program = %program.display(), frame = %frame_path.display(), "invoking inference command");
    let output = Command::new(program)
        .args(args)
        .arg(&frame_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Adapter(format!("failed to spawn {}: {}", program.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Adapter(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::Adapter(format!("malformed output from {}: {}", program.display(), e)))
}
