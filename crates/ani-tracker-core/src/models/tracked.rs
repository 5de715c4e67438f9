use serde::{Deserialize, Serialize};

use crate::title;

/// The show and episode a session is tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTitle {
    pub display_title: String,
    pub target_episode: u32,
}

impl TrackedTitle {
    pub fn new(display_title: impl Into<String>, target_episode: u32) -> Self {
        Self {
            display_title: display_title.into(),
            target_episode,
        }
    }

    /// Title to search the remote catalog with.
    pub fn lookup_title(&self) -> String {
        title::strip_qualifiers(&self.display_title)
    }
}
