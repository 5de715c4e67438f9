use serde::Deserialize;

use crate::traits::{MediaRecord, SavedEntry};

// ── GraphQL response wrappers ────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

// ── Title lookup ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MediaLookupResponse {
    #[serde(rename = "Media")]
    pub media: LookupMedia,
}

#[derive(Debug, Deserialize)]
pub struct LookupMedia {
    pub id: u64,
    pub episodes: Option<u32>,
}

// ── SaveMediaListEntry ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SaveEntryResponse {
    #[serde(rename = "SaveMediaListEntry")]
    pub entry: MediaListEntry,
}

#[derive(Debug, Deserialize)]
pub struct MediaListEntry {
    pub id: u64,
    pub progress: Option<u32>,
    pub score: Option<f32>,
    pub status: Option<String>,
}

// ── Conversions ──────────────────────────────────────────────────

impl From<LookupMedia> for MediaRecord {
    fn from(media: LookupMedia) -> Self {
        MediaRecord {
            media_id: media.id,
            total_episodes: media.episodes,
        }
    }
}

impl From<MediaListEntry> for SavedEntry {
    fn from(entry: MediaListEntry) -> Self {
        SavedEntry {
            id: entry.id,
            progress: entry.progress,
            score: entry.score,
            status: entry.status,
        }
    }
}
