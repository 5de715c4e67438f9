//! Service-agnostic view of a tracking service.
//!
//! The progress sync only needs two operations: resolve a title to a media
//! record, and save list progress for it.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// A tracking service that can resolve titles and store episode progress.
pub trait TrackerService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up an anime by title. Does not require authentication.
    fn lookup_media(
        &self,
        title: &str,
    ) -> impl Future<Output = Result<MediaRecord, Self::Error>> + Send;

    /// Save list progress. Requires authentication.
    fn save_progress(
        &self,
        update: &ProgressUpdate,
    ) -> impl Future<Output = Result<SavedEntry, Self::Error>> + Send;
}

/// Catalog entry resolved from a title lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub media_id: u64,
    /// `None` while the episode count is unknown (e.g. still airing).
    pub total_episodes: Option<u32>,
}

impl MediaRecord {
    pub fn is_final_episode(&self, episode: u32) -> bool {
        self.total_episodes == Some(episode)
    }
}

/// The list update to send.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProgressUpdate {
    /// Progress only; the list status is left as it is.
    Progress { media_id: u64, progress: u32 },
    /// Final episode: progress, a 0-10 score, and status COMPLETED.
    Completed {
        media_id: u64,
        progress: u32,
        score: f32,
    },
}

impl ProgressUpdate {
    pub fn media_id(&self) -> u64 {
        match *self {
            Self::Progress { media_id, .. } | Self::Completed { media_id, .. } => media_id,
        }
    }

    pub fn progress(&self) -> u32 {
        match *self {
            Self::Progress { progress, .. } | Self::Completed { progress, .. } => progress,
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// The list entry as stored by the service after an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEntry {
    pub id: u64,
    pub progress: Option<u32>,
    /// 0-10 scale.
    pub score: Option<f32>,
    pub status: Option<String>,
}

impl std::fmt::Display for SavedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry {}", self.id)?;
        if let Some(progress) = self.progress {
            write!(f, ", progress {progress}")?;
        }
        if let Some(score) = self.score {
            write!(f, ", score {score}")?;
        }
        if let Some(status) = &self.status {
            write!(f, ", status {status}")?;
        }
        Ok(())
    }
}
