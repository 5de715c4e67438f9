pub mod anilist;
pub mod sync;
pub mod traits;

pub use sync::{LinePrompt, ProgressSync, ScorePrompt, SyncError, SyncOutcome};
pub use traits::{MediaRecord, ProgressUpdate, SavedEntry, TrackerService};
