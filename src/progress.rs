use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::ProgressEvent;

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.?\d*)%").expect("percent regex"));
static SPEED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.?\d*)([KM]?)iB/s").expect("speed regex"));
static ETA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ETA\s+(\d+:\d+)").expect("eta regex"));

/// Pulls percent, speed and ETA out of one `--newline` progress line.
///
/// Lines without a `<number>%` token carry no progress and yield `None`.
/// Speed and ETA are optional; token order does not matter.
pub fn parse_progress_from_line(line: &str) -> Option<ProgressEvent> {
    let percent: f32 = PERCENT_RE.captures(line)?.get(1)?.as_str().parse().ok()?;

    let speed_kbps = SPEED_RE
        .captures(line)
        .and_then(|caps| {
            let value: f64 = caps.get(1)?.as_str().parse().ok()?;
            Some(match caps.get(2).map_or("", |m| m.as_str()) {
                "M" => value * 1024.0,
                "K" => value,
                _ => value / 1024.0,
            })
        })
        .unwrap_or(0.0);

    let eta = ETA_RE.captures(line).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_owned());

    Some(ProgressEvent {
        percent: percent.clamp(0.0, 100.0),
        speed_kbps,
        eta,
    })
}

/// `Speed: 1.5 MB/s` style label for a rate in KB/s
pub fn format_speed(speed_kbps: f64) -> String {
    if speed_kbps >= 1024.0 {
        format!("Speed: {:.1} MB/s", speed_kbps / 1024.0)
    } else {
        format!("Speed: {:.1} KB/s", speed_kbps)
    }
}

pub fn format_eta(eta: Option<&str>) -> String {
    format!("ETA: {}", eta.unwrap_or("--:--"))
}
