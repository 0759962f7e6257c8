use crate::models::QualitySelector;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "media-fetch")]
#[command(
    author,
    version,
    about = "Download media with yt-dlp and normalize it with ffmpeg",
    long_about = None
)]
pub struct Args {
    /// Media URL
    pub url: String,

    /// Output directory (default: saved setting, then the system download folder)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target quality
    #[arg(short, long, value_enum)]
    pub quality: Option<QualitySelector>,

    /// Directory holding the yt-dlp/ffmpeg/ffprobe binaries
    /// (default: <exe dir>/assets/<platform>)
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,

    /// Save the output directory and quality as new defaults
    #[arg(long)]
    pub remember: bool,

    /// Print every line the external tools write
    #[arg(short, long)]
    pub verbose: bool,
}
