//! Download orchestration behind the desktop front-end: yt-dlp argument
//! building, progress parsing, process supervision and the event queue the
//! UI drains.

// yt-dlp argument lists
pub mod command;
// Environment-driven settings
pub mod config;
// Process supervision for info fetches and downloads
pub mod downloader;
// Error types
pub mod error;
// Worker -> UI message queue
pub mod events;
// `--dump-json` document and its summary
pub mod info;
// Options, progress and outcome types
pub mod model;
// Progress line parsing
pub mod progress;
