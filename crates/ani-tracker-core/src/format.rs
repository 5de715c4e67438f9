//! Terminal rendering of playback state.

use crate::models::PlaybackSnapshot;

/// Clear-line prefix: carriage return plus ANSI "erase to end of line".
pub const CLEAR_LINE: &str = "\r\x1b[K";

/// Format seconds as `HH:MM:SS`, or `MM:SS` when under one hour.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Like [`format_time`] but renders a missing value as `N/A`.
pub fn format_time_opt(seconds: Option<f64>) -> String {
    seconds.map(format_time).unwrap_or_else(|| "N/A".into())
}

/// Render the single overwritten status line for one tick.
pub fn status_line(snapshot: &PlaybackSnapshot) -> String {
    if !snapshot.has_timing() {
        return format!("{CLEAR_LINE}Waiting for playback data...");
    }

    let state = if snapshot.is_paused() {
        "⏸ PAUSED"
    } else {
        "▶ PLAYING"
    };
    let name = snapshot.file_name.as_deref().unwrap_or("N/A");
    let percent = snapshot.effective_percent().unwrap_or(0.0);

    format!(
        "{CLEAR_LINE}{state} | name: {name} | Time: {} / {} ({percent:.1}%) | Remaining: {}",
        format_time_opt(snapshot.position_seconds),
        format_time_opt(snapshot.duration_seconds),
        format_time_opt(snapshot.remaining_seconds()),
    )
}
