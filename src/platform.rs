use crate::models::{ExternalTool, ToolKind};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    MacOs,
    Linux,
}

impl HostPlatform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    /// Name of the per-platform folder under `assets/`.
    pub fn asset_folder(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "darwin",
            Self::Linux => "linux",
        }
    }

    pub fn executable_name(self, kind: ToolKind) -> &'static str {
        match (self, kind) {
            (Self::Windows, ToolKind::Downloader) => "yt-dlp.exe",
            (Self::MacOs, ToolKind::Downloader) => "yt-dlp_macos",
            (Self::Linux, ToolKind::Downloader) => "yt-dlp",
            (Self::Windows, ToolKind::Transcoder) => "ffmpeg.exe",
            (_, ToolKind::Transcoder) => "ffmpeg",
            (Self::Windows, ToolKind::Prober) => "ffprobe.exe",
            (_, ToolKind::Prober) => "ffprobe",
        }
    }
}

/// Where the bundled tools live. Built once at startup and handed to the
/// pipeline; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PlatformContext {
    host: HostPlatform,
    assets_dir: PathBuf,
}

impl PlatformContext {
    pub fn new(host: HostPlatform, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            host,
            assets_dir: assets_dir.into(),
        }
    }

    /// `<app dir>/assets/<platform>`, where the app dir holds the running
    /// executable.
    pub fn detect() -> Result<Self> {
        let exe = std::env::current_exe().context("Failed to locate running executable")?;
        let app_dir = exe
            .parent()
            .context("Executable path has no parent directory")?;
        Ok(Self::for_app_dir(app_dir))
    }

    pub fn for_app_dir(app_dir: &Path) -> Self {
        let host = HostPlatform::current();
        Self::new(host, app_dir.join("assets").join(host.asset_folder()))
    }

    pub fn host(&self) -> HostPlatform {
        self.host
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn tool(&self, kind: ToolKind) -> ExternalTool {
        ExternalTool {
            kind,
            path: self.assets_dir.join(self.host.executable_name(kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_tools_inside_assets_dir() {
        let ctx = PlatformContext::new(HostPlatform::MacOs, "/app/assets/darwin");
        assert_eq!(
            ctx.tool(ToolKind::Downloader).path,
            PathBuf::from("/app/assets/darwin/yt-dlp_macos")
        );
        assert_eq!(
            ctx.tool(ToolKind::Prober).path,
            PathBuf::from("/app/assets/darwin/ffprobe")
        );
    }

    #[test]
    fn windows_tools_carry_exe_suffix() {
        let ctx = PlatformContext::new(HostPlatform::Windows, "C:/app/assets/windows");
        for kind in [ToolKind::Downloader, ToolKind::Transcoder, ToolKind::Prober] {
            assert!(ctx.tool(kind).path.to_string_lossy().ends_with(".exe"));
        }
    }

    #[test]
    fn app_dir_layout() {
        let ctx = PlatformContext::for_app_dir(Path::new("/opt/media-fetch"));
        assert!(ctx.assets_dir().starts_with("/opt/media-fetch/assets"));
        assert!(ctx.assets_dir().ends_with(ctx.host().asset_folder()));
    }
}
