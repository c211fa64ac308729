use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::RequestError;

/// Resolution choice offered to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quality {
    /// No height cap
    Best,
    Res1080,
    Res720,
    Res480,
    Res360,
    /// Audio stream only, no video
    AudioOnly,
}

impl Quality {
    pub const ALL: [Quality; 6] = [
        Quality::Best,
        Quality::Res1080,
        Quality::Res720,
        Quality::Res480,
        Quality::Res360,
        Quality::AudioOnly,
    ];

    /// Label shown in the quality dropdown
    pub fn label(self) -> &'static str {
        match self {
            Quality::Best => "Best Quality (Highest Bitrate)",
            Quality::Res1080 => "1080p",
            Quality::Res720 => "720p",
            Quality::Res480 => "480p",
            Quality::Res360 => "360p",
            Quality::AudioOnly => "Audio Only",
        }
    }

    /// Maximum video height, read from labels of the form `<N>p`
    pub fn height_cap(self) -> Option<u32> {
        self.label().strip_suffix('p')?.parse().ok()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Framerate preference applied to the video stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framerate {
    Auto,
    /// Anything above 30 fps
    Highest,
    Fps60,
    Fps30,
    Fps24,
}

impl Framerate {
    pub const ALL: [Framerate; 5] = [
        Framerate::Auto,
        Framerate::Highest,
        Framerate::Fps60,
        Framerate::Fps30,
        Framerate::Fps24,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Framerate::Auto => "Auto",
            Framerate::Highest => "Highest",
            Framerate::Fps60 => "60",
            Framerate::Fps30 => "30",
            Framerate::Fps24 => "24",
        }
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Container the downloaded media ends up in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp4,
    Webm,
    Mkv,
    Avi,
    Flv,
    Wav,
    Mp3,
    M4a,
    Flac,
}

impl ContainerFormat {
    pub const ALL: [ContainerFormat; 9] = [
        ContainerFormat::Mp4,
        ContainerFormat::Webm,
        ContainerFormat::Mkv,
        ContainerFormat::Avi,
        ContainerFormat::Flv,
        ContainerFormat::Wav,
        ContainerFormat::Mp3,
        ContainerFormat::M4a,
        ContainerFormat::Flac,
    ];

    /// File extension, also the value passed to `--audio-format`
    pub fn extension(self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Webm => "webm",
            ContainerFormat::Mkv => "mkv",
            ContainerFormat::Avi => "avi",
            ContainerFormat::Flv => "flv",
            ContainerFormat::Wav => "wav",
            ContainerFormat::Mp3 => "mp3",
            ContainerFormat::M4a => "m4a",
            ContainerFormat::Flac => "flac",
        }
    }

    pub fn is_audio(self) -> bool {
        matches!(
            self,
            ContainerFormat::Wav | ContainerFormat::Mp3 | ContainerFormat::M4a | ContainerFormat::Flac
        )
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Snapshot of the user's choices for one download.
///
/// Built once when the user clicks Download and moved into the worker task,
/// so later edits in the form never reach a run in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadOptions {
    url: String,
    quality: Quality,
    framerate: Framerate,
    format: ContainerFormat,
    output_dir: PathBuf,
}

impl DownloadOptions {
    /// Trims the URL and rejects it when nothing is left
    pub fn new(
        url: &str,
        quality: Quality,
        framerate: Framerate,
        format: ContainerFormat,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, RequestError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RequestError::EmptyUrl);
        }
        Ok(Self {
            url: url.to_owned(),
            quality,
            framerate,
            format,
            output_dir: output_dir.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn framerate(&self) -> Framerate {
        self.framerate
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// One decoded progress line from yt-dlp
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    /// Percentage complete, 0.0 to 100.0
    pub percent: f32,
    /// Transfer rate in KB/s, 0.0 when the line carried none
    pub speed_kbps: f64,
    /// Remaining time as printed by the tool (`MM:SS` or `H:MM`)
    pub eta: Option<String>,
}

impl ProgressEvent {
    /// Event pushed once a download exits cleanly
    pub fn finished() -> Self {
        Self {
            percent: 100.0,
            speed_kbps: 0.0,
            eta: None,
        }
    }
}

/// How a download run ended. Exactly one is queued per started run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Stopped on request, whatever the exit code was
    Stopped,
    /// Tool exited unsuccessfully; `None` when it died from a signal
    Failed(Option<i32>),
    /// Launch or read failure
    Error(String),
}

impl RunOutcome {
    pub fn status(&self) -> Status {
        match self {
            RunOutcome::Completed => Status::Completed,
            RunOutcome::Stopped => Status::Stopped,
            RunOutcome::Failed(_) => Status::Failed,
            RunOutcome::Error(_) => Status::Error,
        }
    }
}

/// Status line text shown above the progress bar
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ready,
    FetchingInfo,
    Downloading,
    Stopping,
    Stopped,
    Completed,
    Failed,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ready => "Ready",
            Status::FetchingInfo => "Fetching video information...",
            Status::Downloading => "Downloading...",
            Status::Stopping => "Stopping...",
            Status::Stopped => "Stopped",
            Status::Completed => "Completed",
            Status::Failed => "Failed",
            Status::Error => "Error",
        })
    }
}
