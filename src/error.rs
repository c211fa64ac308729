use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Failures of a background yt-dlp invocation.
///
/// None of these cross into the UI thread as errors: the worker turns each
/// one into queued log/status messages.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("yt-dlp not found! Please install yt-dlp first.")]
    NotFound,
    #[error("yt-dlp not found or not working properly! ({status})")]
    Unusable { status: ExitStatus },
    /// `task` names what was being waited for, e.g. "fetching video info"
    #[error("Timeout while {task} (gave up after {after:?})")]
    Timeout { task: &'static str, after: Duration },
    #[error("Invalid response from yt-dlp: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("Failed to fetch video info ({status}): {stderr}")]
    NonZeroExit { status: ExitStatus, stderr: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ToolError {
    /// Maps a spawn failure, keeping "binary missing" distinct from other I/O
    pub fn from_spawn(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            ToolError::NotFound
        } else {
            ToolError::Io(err)
        }
    }
}

/// Requests refused before any work is scheduled
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Please enter a video URL")]
    EmptyUrl,
    #[error("A download is already running")]
    AlreadyRunning,
}
