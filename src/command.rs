//! yt-dlp argument lists. Pure functions, no I/O.

use crate::model::{ContainerFormat, DownloadOptions, Framerate, Quality};

/// Which kind of yt-dlp run to build arguments for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Single JSON metadata document, nothing written to disk
    Info,
    /// Actual download with line-buffered progress
    Download,
}

/// Arguments (without the program itself) for the requested run
pub fn build(options: &DownloadOptions, mode: Mode) -> Vec<String> {
    match mode {
        Mode::Info => info_args(options.url()),
        Mode::Download => download_args(options),
    }
}

pub fn info_args(url: &str) -> Vec<String> {
    vec![
        "--dump-json".to_owned(),
        "--no-playlist".to_owned(),
        url.to_owned(),
    ]
}

pub fn version_args() -> Vec<String> {
    vec!["--version".to_owned()]
}

pub fn download_args(options: &DownloadOptions) -> Vec<String> {
    let template = options.output_dir().join("%(title)s.%(ext)s");

    let mut args = vec![
        "-o".to_owned(),
        template.to_string_lossy().into_owned(),
        "--newline".to_owned(),
        "--progress".to_owned(),
    ];

    match audio_extraction(options.quality(), options.format()) {
        Some(audio_format) => {
            args.push("-f".to_owned());
            args.push("bestaudio".to_owned());
            args.push("-x".to_owned());
            args.push("--audio-format".to_owned());
            args.push(audio_format.extension().to_owned());
        }
        None => {
            args.push("-f".to_owned());
            args.push(format_selector(options.quality(), options.framerate()));
        }
    }

    args.push(options.url().to_owned());
    args
}

/// Target audio container when the run should extract audio only.
///
/// An audio container always wins; "Audio Only" with a video container
/// falls back to mp3.
fn audio_extraction(quality: Quality, format: ContainerFormat) -> Option<ContainerFormat> {
    if format.is_audio() {
        Some(format)
    } else if quality == Quality::AudioOnly {
        Some(ContainerFormat::Mp3)
    } else {
        None
    }
}

/// Video+audio selector: best video under the filters merged with best
/// audio, falling back to the best single stream under the same filters.
pub fn format_selector(quality: Quality, framerate: Framerate) -> String {
    let mut filters = String::new();
    if let Some(height) = quality.height_cap() {
        filters.push_str(&format!("[height<={height}]"));
    }
    filters.push_str(framerate_filter(framerate));

    format!("bestvideo{filters}+bestaudio/best{filters}")
}

fn framerate_filter(framerate: Framerate) -> &'static str {
    match framerate {
        Framerate::Auto => "",
        Framerate::Highest => "[fps>30]",
        Framerate::Fps60 => "[fps=60]",
        Framerate::Fps30 => "[fps=30]",
        Framerate::Fps24 => "[fps=24]",
    }
}
