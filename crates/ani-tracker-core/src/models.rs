mod playback;
mod tracked;

pub use playback::PlaybackSnapshot;
pub use tracked::TrackedTitle;
