use crate::commands::{probe_codec_args, probe_duration_args};
use crate::error::PipelineError;
use crate::process::{CapturedOutput, ProcessLauncher};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn selector(self) -> &'static str {
        match self {
            Self::Video => "v:0",
            Self::Audio => "a:0",
        }
    }
}

/// Thin wrapper over the prober executable.
pub struct Prober<'a> {
    launcher: &'a dyn ProcessLauncher,
    program: &'a Path,
}

impl<'a> Prober<'a> {
    pub fn new(launcher: &'a dyn ProcessLauncher, program: &'a Path) -> Self {
        Self { launcher, program }
    }

    /// Codec name of the first stream of `kind`, e.g. `h264`.
    pub async fn codec(&self, file: &Path, kind: StreamKind) -> Result<String, PipelineError> {
        let output = self.query(&probe_codec_args(file, kind.selector())).await?;
        let codec = first_value(&output.stdout)
            .ok_or_else(|| PipelineError::ProbeFailed(format!("no {kind:?} stream reported")))?;
        debug!(file = %file.display(), ?kind, codec, "probed codec");
        Ok(codec.to_string())
    }

    /// Container duration in seconds. Anything unparseable or non-positive
    /// counts as unavailable.
    pub async fn duration(&self, file: &Path) -> Result<f64, PipelineError> {
        let output = self
            .query(&probe_duration_args(file))
            .await
            .map_err(|_| PipelineError::DurationUnavailable)?;
        parse_duration(&output.stdout).ok_or(PipelineError::DurationUnavailable)
    }

    async fn query(&self, args: &[String]) -> Result<CapturedOutput, PipelineError> {
        let output = self
            .launcher
            .capture(self.program, args)
            .await
            .map_err(|error| PipelineError::ProbeFailed(error.to_string()))?;
        if !output.success() {
            return Err(PipelineError::ProbeFailed(format!(
                "exit code {}: {}",
                output.code,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

fn first_value(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .map(|line| line.trim().trim_end_matches(','))
        .find(|line| !line.is_empty())
}

pub fn parse_duration(stdout: &str) -> Option<f64> {
    let seconds: f64 = first_value(stdout)?.parse().ok()?;
    (seconds.is_finite() && seconds > 0.0).then_some(seconds)
}
