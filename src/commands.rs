//! Argument lists for the three external tools.

use crate::models::{ConversionTarget, QualitySelector};
use std::path::Path;

pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Format-selection arguments for one quality selector.
pub fn format_args(quality: QualitySelector) -> Vec<String> {
    if let Some(audio) = quality.audio_format() {
        return vec![
            "-x".to_string(),
            "--audio-format".to_string(),
            audio.extension().to_string(),
        ];
    }
    let selector = match quality.max_height() {
        Some(height) => {
            format!("bestvideo[height<={height}]+bestaudio/best[height<={height}]")
        }
        None => "bestvideo+bestaudio/best".to_string(),
    };
    vec!["-f".to_string(), selector]
}

pub fn downloader_args(
    url: &str,
    output_dir: &Path,
    quality: QualitySelector,
    ffmpeg: &Path,
) -> Vec<String> {
    let mut args = vec![
        "--no-warnings".to_string(),
        "--ffmpeg-location".to_string(),
        ffmpeg.display().to_string(),
        "--output".to_string(),
        output_dir.join(OUTPUT_TEMPLATE).display().to_string(),
        "--no-keep-video".to_string(),
    ];
    args.extend(format_args(quality));
    args.push(url.to_string());
    args
}

/// Codec name of the first stream of one type; `stream` is `v:0` or `a:0`.
pub fn probe_codec_args(file: &Path, stream: &str) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        stream.to_string(),
        "-show_entries".to_string(),
        "stream=codec_name".to_string(),
        "-of".to_string(),
        "csv=p=0".to_string(),
        file.display().to_string(),
    ]
}

pub fn probe_duration_args(file: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "csv=p=0".to_string(),
        file.display().to_string(),
    ]
}

/// `-i <input> -c:v <v> -c:a <a> -y <output>`
pub fn transcoder_args(input: &Path, output: &Path, target: &ConversionTarget) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.display().to_string(),
        "-c:v".to_string(),
        target.video_codec.to_string(),
        "-c:a".to_string(),
        target.audio_codec.to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]
}
