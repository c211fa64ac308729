use std::collections::BTreeSet;

use serde::Deserialize;

/// The subset of yt-dlp's `--dump-json` document the app shows
#[derive(Debug, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub formats: Vec<FormatEntry>,
}

#[derive(Debug, Deserialize)]
pub struct FormatEntry {
    #[serde(default)]
    pub fps: Option<f64>,
}

impl VideoInfo {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Distinct whole frame rates across all formats, highest first
    pub fn framerates(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self
            .formats
            .iter()
            .filter_map(|f| f.fps)
            .filter(|fps| *fps > 0.0)
            .map(|fps| fps as u32)
            .collect();
        set.into_iter().rev().collect()
    }

    /// Log lines printed after a successful fetch
    pub fn summary_lines(&self) -> Vec<String> {
        let framerates = self.framerates();
        let framerates = if framerates.is_empty() {
            "Not detected".to_owned()
        } else {
            let list: Vec<String> = framerates.iter().map(u32::to_string).collect();
            format!("{} fps", list.join(", "))
        };

        vec![
            "=".repeat(50),
            format!("📹 Title: {}", self.title),
            format!("👤 Uploader: {}", self.uploader.as_deref().unwrap_or("Unknown Uploader")),
            format!("⏱️ Duration: {}", format_duration(self.duration)),
            format!("👁️ Views: {}", format_views(self.view_count.unwrap_or(0))),
            format!("🎬 Available Framerates: {framerates}"),
        ]
    }
}

/// `H:MM:SS` past an hour, `M:SS` below, `Unknown` for missing or zero
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(s) if s >= 1.0 => s as u64,
        _ => return "Unknown".to_owned(),
    };
    let (hrs, rem) = (total / 3600, total % 3600);
    let (mins, secs) = (rem / 60, rem % 60);
    if hrs > 0 {
        format!("{hrs}:{mins:02}:{secs:02}")
    } else {
        format!("{mins}:{secs:02}")
    }
}

pub fn format_views(views: u64) -> String {
    if views > 1_000_000 {
        format!("{:.1}M", views as f64 / 1_000_000.0)
    } else if views > 1_000 {
        format!("{:.1}K", views as f64 / 1_000.0)
    } else {
        views.to_string()
    }
}
