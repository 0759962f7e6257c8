use crate::models::ToolKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Terminal failure of a pipeline run. The `Display` text is what the
/// listener receives in `on_finished(false, ..)`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{} not found", .0.label())]
    ToolNotFound(ToolKind),

    #[error("{} exited with code {code}", exit_label(.tool))]
    ProcessExited { tool: ToolKind, code: i32 },

    #[error("cancelled")]
    Cancelled,

    #[error("no output file")]
    NoOutputFile,

    #[error("file not found after download: {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("cannot determine duration")]
    DurationUnavailable,

    #[error("probe failed: {0}")]
    ProbeFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn exit_label(tool: &ToolKind) -> &'static str {
    match tool {
        ToolKind::Downloader => "tool",
        ToolKind::Transcoder => "transcoder",
        ToolKind::Prober => "prober",
    }
}
