use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualitySelector {
    #[default]
    Best,
    #[value(name = "4k")]
    #[serde(rename = "4k")]
    Uhd2160,
    #[value(name = "2k")]
    #[serde(rename = "2k")]
    Qhd1440,
    #[value(name = "1080p")]
    #[serde(rename = "1080p")]
    Fhd1080,
    #[value(name = "720p")]
    #[serde(rename = "720p")]
    Hd720,
    #[value(name = "480p")]
    #[serde(rename = "480p")]
    Sd480,
    #[value(name = "360p")]
    #[serde(rename = "360p")]
    Sd360,
    AudioMp3,
    AudioWav,
    AudioM4a,
}

impl QualitySelector {
    pub fn label(self) -> &'static str {
        match self {
            Self::Best => "Best",
            Self::Uhd2160 => "4K (2160p)",
            Self::Qhd1440 => "2K (1440p)",
            Self::Fhd1080 => "1080p",
            Self::Hd720 => "720p",
            Self::Sd480 => "480p",
            Self::Sd360 => "360p",
            Self::AudioMp3 => "Audio (MP3)",
            Self::AudioWav => "Audio (WAV)",
            Self::AudioM4a => "Audio (M4A)",
        }
    }

    /// Video height cap, `None` for `Best` and the audio kinds.
    pub fn max_height(self) -> Option<u32> {
        match self {
            Self::Uhd2160 => Some(2160),
            Self::Qhd1440 => Some(1440),
            Self::Fhd1080 => Some(1080),
            Self::Hd720 => Some(720),
            Self::Sd480 => Some(480),
            Self::Sd360 => Some(360),
            _ => None,
        }
    }

    pub fn audio_format(self) -> Option<AudioFormat> {
        match self {
            Self::AudioMp3 => Some(AudioFormat::Mp3),
            Self::AudioWav => Some(AudioFormat::Wav),
            Self::AudioM4a => Some(AudioFormat::M4a),
            _ => None,
        }
    }

}

impl fmt::Display for QualitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    M4a,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::M4a => "m4a",
        }
    }
}

/// Container and codec pair a converted file ends up in. Every conversion,
/// audio selectors included, targets the canonical video form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionTarget {
    pub video_codec: &'static str,
    pub audio_codec: &'static str,
    pub extension: &'static str,
}

impl ConversionTarget {
    pub const CANONICAL_VIDEO: ConversionTarget = ConversionTarget {
        video_codec: "libx264",
        audio_codec: "aac",
        extension: "mp4",
    };

    /// Codec names the prober reports for files that need no re-encode.
    pub const CANONICAL_VIDEO_CODEC: &'static str = "h264";
    pub const CANONICAL_AUDIO_CODEC: &'static str = "aac";
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub quality: QualitySelector,
}

impl DownloadRequest {
    pub fn new(
        url: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        quality: QualitySelector,
    ) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            quality,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Downloader,
    Transcoder,
    Prober,
}

impl ToolKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Downloader => "yt-dlp",
            Self::Transcoder => "ffmpeg",
            Self::Prober => "ffprobe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub kind: ToolKind,
    pub path: PathBuf,
}

impl ExternalTool {
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Downloading,
    Resolving,
    Converting,
    Done,
}

/// Outward notification of a run, as delivered over a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Progress(u8),
    Log(String),
    Finished { success: bool, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_caps_follow_labels() {
        let selectors = [
            QualitySelector::Best,
            QualitySelector::Uhd2160,
            QualitySelector::Qhd1440,
            QualitySelector::Fhd1080,
            QualitySelector::Hd720,
            QualitySelector::Sd480,
            QualitySelector::Sd360,
            QualitySelector::AudioMp3,
            QualitySelector::AudioWav,
            QualitySelector::AudioM4a,
        ];
        let caps: Vec<_> = selectors.iter().map(|q| q.max_height()).collect();
        assert_eq!(
            caps,
            vec![
                None,
                Some(2160),
                Some(1440),
                Some(1080),
                Some(720),
                Some(480),
                Some(360),
                None,
                None,
                None
            ]
        );
    }

    #[test]
    fn audio_selectors_map_to_their_extension() {
        assert_eq!(QualitySelector::AudioWav.audio_format(), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::M4a.extension(), "m4a");
        assert_eq!(QualitySelector::Hd720.audio_format(), None);
    }

    #[test]
    fn selector_serializes_with_cli_names() {
        let json = serde_json::to_string(&QualitySelector::Uhd2160).unwrap();
        assert_eq!(json, "\"4k\"");
        let parsed: QualitySelector = serde_json::from_str("\"audio-m4a\"").unwrap();
        assert_eq!(parsed, QualitySelector::AudioM4a);
    }
}
