use serde::{Deserialize, Serialize};

/// One poll tick's view of the player.
///
/// Every field is optional: the player reports nothing useful until media
/// is loaded, and each property is read independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub duration_seconds: Option<f64>,
    pub position_seconds: Option<f64>,
    pub percent_complete: Option<f64>,
    pub paused: Option<bool>,
    pub file_name: Option<String>,
}

impl PlaybackSnapshot {
    /// Whether position and a non-zero duration are known.
    ///
    /// mpv reports a duration of 0 while the file is still loading.
    pub fn has_timing(&self) -> bool {
        self.duration_seconds.is_some_and(|d| d > 0.0) && self.position_seconds.is_some()
    }

    /// Seconds left until the end of the file, never negative.
    pub fn remaining_seconds(&self) -> Option<f64> {
        let duration = self.duration_seconds?;
        let position = self.position_seconds?;
        Some((duration - position).max(0.0))
    }

    /// Percent reported by the player, or derived from position/duration.
    pub fn effective_percent(&self) -> Option<f64> {
        if let Some(percent) = self.percent_complete {
            return Some(percent);
        }
        let duration = self.duration_seconds?;
        let position = self.position_seconds?;
        if duration <= 0.0 {
            return None;
        }
        Some(position / duration * 100.0)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(duration: f64, position: f64) -> PlaybackSnapshot {
        PlaybackSnapshot {
            duration_seconds: Some(duration),
            position_seconds: Some(position),
            ..Default::default()
        }
    }

    #[test]
    fn test_remaining() {
        assert_eq!(snapshot(1230.0, 1200.0).remaining_seconds(), Some(30.0));
    }

    #[test]
    fn test_remaining_clamped() {
        // mpv can briefly report a position past the duration at EOF.
        assert_eq!(snapshot(100.0, 100.4).remaining_seconds(), Some(0.0));
    }

    #[test]
    fn test_remaining_needs_both() {
        let s = PlaybackSnapshot {
            duration_seconds: Some(100.0),
            ..Default::default()
        };
        assert!(s.remaining_seconds().is_none());
        assert!(!s.has_timing());
    }

    #[test]
    fn test_zero_duration_is_not_timing() {
        assert!(!snapshot(0.0, 0.0).has_timing());
        assert!(snapshot(1440.0, 0.0).has_timing());
    }

    #[test]
    fn test_effective_percent_prefers_reported() {
        let s = PlaybackSnapshot {
            percent_complete: Some(42.5),
            ..snapshot(100.0, 10.0)
        };
        assert_eq!(s.effective_percent(), Some(42.5));
    }

    #[test]
    fn test_effective_percent_derived() {
        assert_eq!(snapshot(200.0, 160.0).effective_percent(), Some(80.0));
        assert!(snapshot(0.0, 0.0).effective_percent().is_none());
        assert!(PlaybackSnapshot::default().effective_percent().is_none());
    }
}
