//! Download → resolve → (convert) orchestration for a single request.

use crate::commands::{downloader_args, transcoder_args};
use crate::error::PipelineError;
use crate::listener::PipelineListener;
use crate::models::{ConversionTarget, DownloadRequest, Phase, QualitySelector, ToolKind};
use crate::parser::{DownloaderEvent, TranscoderEvent, parse_downloader_line, parse_transcoder_line};
use crate::platform::PlatformContext;
use crate::probe::{Prober, StreamKind};
use crate::process::{ProcessHandle, ProcessLauncher};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Highest percentage shown while downloading; the rest belongs to the
/// resolve/convert tail.
pub const DOWNLOAD_PROGRESS_CEILING: u8 = 99;

#[derive(Clone)]
pub struct Pipeline {
    platform: PlatformContext,
    launcher: Arc<dyn ProcessLauncher>,
}

/// Control side of a started run.
pub struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RunHandle {
    /// Request cancellation. Repeated calls are no-ops.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the listener has received `on_finished`.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

impl Pipeline {
    pub fn new(platform: PlatformContext, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { platform, launcher }
    }

    /// Spawn a worker task for `request`. Each call gets fresh run state and
    /// its own cancellation token.
    pub fn start(
        &self,
        request: DownloadRequest,
        listener: Arc<dyn PipelineListener>,
    ) -> RunHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let pipeline = self.clone();
        let task = tokio::spawn(async move {
            let worker_listener = Arc::clone(&listener);
            let worker = tokio::spawn(async move {
                pipeline.run(request, worker_listener.as_ref(), &token).await;
            });
            if let Err(error) = worker.await {
                listener.on_finished(false, &format!("worker failed: {error}"));
            }
        });
        RunHandle { cancel, task }
    }

    /// Drive one run to completion. Exactly one `on_finished` is emitted.
    pub async fn run(
        &self,
        request: DownloadRequest,
        listener: &dyn PipelineListener,
        cancel: &CancellationToken,
    ) {
        let mut run = Run {
            platform: &self.platform,
            launcher: self.launcher.as_ref(),
            listener,
            cancel,
            state: RunState::default(),
        };
        let outcome = run.execute(&request).await;
        run.enter(Phase::Done);
        match outcome {
            Ok(path) => {
                info!(path = %path.display(), "run finished");
                listener.on_log("Download and conversion completed successfully!");
                listener.on_finished(true, &path.display().to_string());
            }
            Err(error) => {
                if error.is_cancelled() {
                    info!("run cancelled");
                } else {
                    warn!("run failed: {error}");
                    listener.on_log(&format!("Error: {error}"));
                }
                listener.on_finished(false, &error.to_string());
            }
        }
    }
}

#[derive(Debug)]
struct RunState {
    phase: Phase,
    last_percent: Option<u8>,
    final_file: Option<PathBuf>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: Phase::Downloading,
            last_percent: None,
            final_file: None,
        }
    }
}

struct ToolPaths {
    downloader: PathBuf,
    transcoder: PathBuf,
    prober: PathBuf,
}

#[derive(Debug, Clone, Copy)]
enum LineHandler {
    Downloader,
    Transcoder { total_seconds: f64 },
}

enum NextLine {
    Line(String),
    Closed,
    Cancelled,
}

struct Run<'a> {
    platform: &'a PlatformContext,
    launcher: &'a dyn ProcessLauncher,
    listener: &'a dyn PipelineListener,
    cancel: &'a CancellationToken,
    state: RunState,
}

impl Run<'_> {
    async fn execute(&mut self, request: &DownloadRequest) -> Result<PathBuf, PipelineError> {
        validate(request)?;
        let tools = self.resolve_tools()?;

        self.enter(Phase::Downloading);
        self.check_cancelled()?;
        let args = downloader_args(
            &request.url,
            &request.output_dir,
            request.quality,
            &tools.transcoder,
        );
        self.supervise(ToolKind::Downloader, &tools.downloader, &args, LineHandler::Downloader)
            .await?;

        self.enter(Phase::Resolving);
        self.check_cancelled()?;
        let source = self.locate_output(&request.output_dir)?;
        if !self.needs_conversion(&source, request.quality, &tools.prober).await {
            self.check_cancelled()?;
            info!(file = %source.display(), "already in requested format");
            self.report_progress(100);
            return Ok(source);
        }

        self.enter(Phase::Converting);
        self.check_cancelled()?;
        let output = self
            .convert(&source, &ConversionTarget::CANONICAL_VIDEO, &tools)
            .await?;
        self.check_cancelled()?;
        self.report_progress(100);
        Ok(output)
    }

    fn resolve_tools(&self) -> Result<ToolPaths, PipelineError> {
        for kind in [ToolKind::Downloader, ToolKind::Transcoder, ToolKind::Prober] {
            let tool = self.platform.tool(kind);
            if !tool.exists() {
                self.listener
                    .on_log(&format!("Error: {} not found.", tool.path.display()));
                return Err(PipelineError::ToolNotFound(tool.kind));
            }
        }
        Ok(ToolPaths {
            downloader: self.platform.tool(ToolKind::Downloader).path,
            transcoder: self.platform.tool(ToolKind::Transcoder).path,
            prober: self.platform.tool(ToolKind::Prober).path,
        })
    }

    /// Launch one tool and stream its output until it exits or the run is
    /// cancelled.
    async fn supervise(
        &mut self,
        tool: ToolKind,
        program: &Path,
        args: &[String],
        handler: LineHandler,
    ) -> Result<(), PipelineError> {
        self.listener
            .on_log(&format!("Running command: {}", render_command(program, args)));
        info!(tool = tool.label(), "launching");
        let mut process = self.launcher.launch(program, args).await?;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => NextLine::Cancelled,
                line = process.next_line() => line.map_or(NextLine::Closed, NextLine::Line),
            };
            match next {
                NextLine::Line(line) if !self.cancel.is_cancelled() => {
                    self.handle_line(handler, &line);
                }
                NextLine::Line(_) | NextLine::Cancelled => {
                    return self.abort(process.as_mut(), tool).await;
                }
                NextLine::Closed => break,
            }
        }

        let code = process.wait().await?;
        debug!(tool = tool.label(), code, "process exited");
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        if code != 0 {
            let error = PipelineError::ProcessExited { tool, code };
            self.listener
                .on_log(&format!("{} exited with code {code}", tool.label()));
            return Err(error);
        }
        Ok(())
    }

    async fn abort(
        &self,
        process: &mut dyn ProcessHandle,
        tool: ToolKind,
    ) -> Result<(), PipelineError> {
        process.terminate();
        if let Err(error) = process.wait().await {
            debug!("wait after terminate failed: {error}");
        }
        let message = match tool {
            ToolKind::Transcoder => "Conversion cancelled.",
            _ => "Download cancelled.",
        };
        self.listener.on_log(message);
        Err(PipelineError::Cancelled)
    }

    fn handle_line(&mut self, handler: LineHandler, line: &str) {
        self.listener.on_log(line);
        match handler {
            LineHandler::Downloader => match parse_downloader_line(line) {
                DownloaderEvent::DestinationFound(path) => {
                    self.listener
                        .on_log(&format!("Downloading to: {}", path.display()));
                }
                DownloaderEvent::Progress(percent) => {
                    self.report_progress(percent.min(DOWNLOAD_PROGRESS_CEILING));
                }
                DownloaderEvent::FinalFileFound(path) => self.record_final_file(path),
                DownloaderEvent::LogLine(_) => {}
            },
            LineHandler::Transcoder { total_seconds } => {
                if let TranscoderEvent::Progress(percent) =
                    parse_transcoder_line(line, total_seconds)
                {
                    self.report_progress(percent);
                }
            }
        }
    }

    /// The first announced final file sticks for the rest of the download.
    fn record_final_file(&mut self, path: PathBuf) {
        if let Some(existing) = &self.state.final_file {
            if *existing != path {
                debug!(ignored = %path.display(), "final file already known");
            }
            return;
        }
        self.listener
            .on_log(&format!("Merged file: {}", path.display()));
        self.state.final_file = Some(path);
    }

    fn locate_output(&mut self, output_dir: &Path) -> Result<PathBuf, PipelineError> {
        if let Some(path) = &self.state.final_file {
            if !path.is_file() {
                return Err(PipelineError::OutputMissing(path.clone()));
            }
            return Ok(path.clone());
        }

        self.listener
            .on_log("No merged file found, looking for downloaded files...");
        let newest = newest_file(output_dir)?.ok_or(PipelineError::NoOutputFile)?;
        self.listener
            .on_log(&format!("Found file: {}", newest.display()));
        self.state.final_file = Some(newest.clone());
        Ok(newest)
    }

    /// Probe failures count as "needs conversion".
    async fn needs_conversion(&self, file: &Path, quality: QualitySelector, prober: &Path) -> bool {
        self.listener
            .on_log(&format!("Processing file: {}", file.display()));
        let extension = lowercase_extension(file);
        if let Some(audio) = quality.audio_format() {
            return extension.as_deref() != Some(audio.extension());
        }
        if extension.as_deref() != Some(ConversionTarget::CANONICAL_VIDEO.extension) {
            return true;
        }

        let prober = Prober::new(self.launcher, prober);
        let codecs = match prober.codec(file, StreamKind::Video).await {
            Ok(video) => prober
                .codec(file, StreamKind::Audio)
                .await
                .map(|audio| (video, audio)),
            Err(error) => Err(error),
        };
        match codecs {
            Ok((video, audio)) => {
                debug!(video = %video, audio = %audio, "probed codecs");
                !(video == ConversionTarget::CANONICAL_VIDEO_CODEC
                    && audio == ConversionTarget::CANONICAL_AUDIO_CODEC)
            }
            Err(error) => {
                warn!("codec check failed: {error}");
                self.listener
                    .on_log(&format!("Error checking codecs: {error}"));
                true
            }
        }
    }

    async fn convert(
        &mut self,
        source: &Path,
        target: &ConversionTarget,
        tools: &ToolPaths,
    ) -> Result<PathBuf, PipelineError> {
        self.listener
            .on_log(&format!("Getting duration for file: {}", source.display()));
        let total_seconds = match Prober::new(self.launcher, &tools.prober)
            .duration(source)
            .await
        {
            Ok(seconds) => seconds,
            Err(error) => {
                self.listener.on_log(&format!("Error getting duration: {error}"));
                return Err(error);
            }
        };
        self.check_cancelled()?;

        let output = source.with_extension(target.extension);
        // The transcoder cannot write over its own input.
        let staging = if output == source {
            staging_path(&output, target)
        } else {
            output.clone()
        };

        self.listener.on_log(&format!(
            "Converting {} to {}",
            source.display(),
            output.display()
        ));
        self.report_progress(0);
        let args = transcoder_args(source, &staging, target);
        let handler = LineHandler::Transcoder { total_seconds };
        if let Err(error) = self
            .supervise(ToolKind::Transcoder, &tools.transcoder, &args, handler)
            .await
        {
            discard_partial(&staging);
            return Err(error);
        }

        if staging != output {
            fs::rename(&staging, &output)?;
            self.listener
                .on_log(&format!("Replaced original file: {}", output.display()));
        } else if source.exists() {
            fs::remove_file(source)?;
            self.listener
                .on_log(&format!("Deleted original file: {}", source.display()));
        }
        self.state.final_file = Some(output.clone());
        Ok(output)
    }

    fn enter(&mut self, phase: Phase) {
        if self.state.phase != phase {
            info!(from = ?self.state.phase, to = ?phase, "phase change");
        }
        self.state.phase = phase;
        self.state.last_percent = None;
    }

    /// Emits only values above the last one reported in this phase.
    fn report_progress(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.state.last_percent.is_some_and(|last| percent <= last) {
            return;
        }
        self.state.last_percent = Some(percent);
        self.listener.on_progress(percent);
    }

    fn check_cancelled(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }
}

fn validate(request: &DownloadRequest) -> Result<(), PipelineError> {
    if request.url.trim().is_empty() {
        return Err(PipelineError::InvalidRequest("url is empty".to_string()));
    }
    if !request.output_dir.is_dir() {
        return Err(PipelineError::InvalidRequest(format!(
            "output directory {} does not exist",
            request.output_dir.display()
        )));
    }
    Ok(())
}

fn render_command(program: &Path, args: &[String]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_lowercase())
}

fn staging_path(output: &Path, target: &ConversionTarget) -> PathBuf {
    output.with_extension(format!("converting.{}", target.extension))
}

/// Removes whatever a failed or cancelled transcoder left at `path`.
fn discard_partial(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial output"),
        Err(error) => warn!("could not remove partial output {}: {error}", path.display()),
    }
}

/// Most recently modified regular file directly inside `dir`.
fn newest_file(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)?.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if newest.as_ref().is_none_or(|(time, _)| modified > *time) {
            newest = Some((modified, entry.path()));
        }
    }
    Ok(newest.map(|(_, path)| path))
}
