//! Two-phase progress sync: resolve the title, then save list progress.
//!
//! Watching the final episode asks for a score and marks the entry
//! COMPLETED in the same mutation; any other episode only moves progress.
//! Nothing is retried, and a failed lookup never leads to a mutation.

use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

use ani_tracker_core::models::TrackedTitle;
use thiserror::Error;
use tracing::{info, warn};

use crate::traits::{MediaRecord, ProgressUpdate, SavedEntry, TrackerService};

#[derive(Debug, Error)]
pub enum SyncError<E: std::error::Error + 'static> {
    #[error("lookup failed: {0}")]
    Lookup(#[source] E),

    #[error("score prompt failed: {0}")]
    Prompt(#[from] io::Error),

    #[error("no score entered, update skipped")]
    NoScore,

    #[error("update failed: {0}")]
    Update(#[source] E),
}

/// Result of one successful sync attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub media: MediaRecord,
    pub update: ProgressUpdate,
    pub saved: SavedEntry,
}

/// Source of the 0-10 score for a completed show.
pub trait ScorePrompt {
    /// `Ok(None)` when input ended without a valid score.
    fn ask_score(&mut self) -> io::Result<Option<f32>>;
}

/// Line-based prompt that re-asks until it reads a valid score.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl LinePrompt<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> ScorePrompt for LinePrompt<R, W> {
    fn ask_score(&mut self) -> io::Result<Option<f32>> {
        loop {
            write!(self.output, "Score (0-10): ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            match parse_score(&line) {
                Some(score) => return Ok(Some(score)),
                None => writeln!(self.output, "Please enter a number between 0 and 10.")?,
            }
        }
    }
}

/// Parse a 0-10 score, allowing decimals.
pub fn parse_score(input: &str) -> Option<f32> {
    let score: f32 = input.trim().parse().ok()?;
    (score.is_finite() && (0.0..=10.0).contains(&score)).then_some(score)
}

/// Runs sync attempts against a [`TrackerService`].
pub struct ProgressSync<S, P> {
    service: S,
    prompt: P,
}

impl<S: TrackerService, P: ScorePrompt> ProgressSync<S, P> {
    pub fn new(service: S, prompt: P) -> Self {
        Self { service, prompt }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// One lookup followed by at most one mutation.
    pub async fn sync(&mut self, title: &TrackedTitle) -> Result<SyncOutcome, SyncError<S::Error>> {
        let search = title.lookup_title();
        info!(
            title = %search,
            episode = title.target_episode,
            "Syncing progress"
        );

        let media = self
            .service
            .lookup_media(&search)
            .await
            .map_err(|e| {
                warn!(title = %search, error = %e, "Lookup failed, no update sent");
                SyncError::Lookup(e)
            })?;

        let update = self.plan_update(&media, title.target_episode)?;

        let saved = self
            .service
            .save_progress(&update)
            .await
            .map_err(|e| {
                warn!(media_id = media.media_id, error = %e, "Update failed");
                SyncError::Update(e)
            })?;

        info!(media_id = media.media_id, completed = update.is_completion(), "Progress saved");
        Ok(SyncOutcome {
            media,
            update,
            saved,
        })
    }

    fn plan_update(
        &mut self,
        media: &MediaRecord,
        episode: u32,
    ) -> Result<ProgressUpdate, SyncError<S::Error>> {
        if !media.is_final_episode(episode) {
            return Ok(ProgressUpdate::Progress {
                media_id: media.media_id,
                progress: episode,
            });
        }

        let score = self.prompt.ask_score()?.ok_or(SyncError::NoScore)?;
        Ok(ProgressUpdate::Completed {
            media_id: media.media_id,
            progress: episode,
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct FakeError(String);

    /// In-memory service recording every call.
    struct FakeService {
        media: Option<MediaRecord>,
        lookups: Mutex<Vec<String>>,
        updates: Mutex<Vec<ProgressUpdate>>,
    }

    impl FakeService {
        fn with_episodes(total: Option<u32>) -> Self {
            Self {
                media: Some(MediaRecord {
                    media_id: 16498,
                    total_episodes: total,
                }),
                lookups: Mutex::default(),
                updates: Mutex::default(),
            }
        }

        fn missing_media() -> Self {
            Self {
                media: None,
                lookups: Mutex::default(),
                updates: Mutex::default(),
            }
        }
    }

    impl TrackerService for FakeService {
        type Error = FakeError;

        async fn lookup_media(&self, title: &str) -> Result<MediaRecord, FakeError> {
            self.lookups.lock().unwrap().push(title.to_string());
            self.media
                .ok_or_else(|| FakeError(r#"{"data":{}}"#.to_string()))
        }

        async fn save_progress(&self, update: &ProgressUpdate) -> Result<SavedEntry, FakeError> {
            self.updates.lock().unwrap().push(*update);
            Ok(SavedEntry {
                id: 1,
                progress: Some(update.progress()),
                score: None,
                status: None,
            })
        }
    }

    /// Prompt that counts how often it was asked.
    struct CountingPrompt {
        asked: u32,
        answer: Option<f32>,
    }

    impl ScorePrompt for CountingPrompt {
        fn ask_score(&mut self) -> io::Result<Option<f32>> {
            self.asked += 1;
            Ok(self.answer)
        }
    }

    fn prompt(answer: Option<f32>) -> CountingPrompt {
        CountingPrompt { asked: 0, answer }
    }

    #[tokio::test]
    async fn test_final_episode_completes_with_score() {
        let mut sync = ProgressSync::new(FakeService::with_episodes(Some(12)), prompt(Some(9.0)));

        let outcome = sync.sync(&TrackedTitle::new("Frieren", 12)).await.unwrap();

        assert_eq!(
            outcome.update,
            ProgressUpdate::Completed {
                media_id: 16498,
                progress: 12,
                score: 9.0
            }
        );
        assert_eq!(sync.prompt.asked, 1);
        assert_eq!(sync.service().updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_middle_episode_is_progress_only() {
        let mut sync = ProgressSync::new(FakeService::with_episodes(Some(12)), prompt(Some(9.0)));

        let outcome = sync.sync(&TrackedTitle::new("Frieren", 5)).await.unwrap();

        assert_eq!(
            outcome.update,
            ProgressUpdate::Progress {
                media_id: 16498,
                progress: 5
            }
        );
        assert_eq!(sync.prompt.asked, 0);
        assert_eq!(outcome.saved.progress, Some(5));
    }

    #[tokio::test]
    async fn test_unknown_episode_count_is_progress_only() {
        let mut sync = ProgressSync::new(FakeService::with_episodes(None), prompt(Some(9.0)));
        let outcome = sync.sync(&TrackedTitle::new("Airing Show", 3)).await.unwrap();
        assert!(!outcome.update.is_completion());
        assert_eq!(sync.prompt.asked, 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_sends_no_mutation() {
        let mut sync = ProgressSync::new(FakeService::missing_media(), prompt(Some(9.0)));

        let err = sync.sync(&TrackedTitle::new("Nothing", 1)).await.unwrap_err();

        assert!(matches!(err, SyncError::Lookup(_)));
        assert!(err.to_string().contains(r#"{"data":{}}"#));
        assert!(sync.service().updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_uses_stripped_title() {
        let mut sync = ProgressSync::new(FakeService::with_episodes(Some(25)), prompt(None));
        sync.sync(&TrackedTitle::new("Attack on Titan (2013)", 3))
            .await
            .unwrap();
        assert_eq!(
            *sync.service().lookups.lock().unwrap(),
            vec!["Attack on Titan".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_score_skips_update() {
        let mut sync = ProgressSync::new(FakeService::with_episodes(Some(12)), prompt(None));
        let err = sync.sync(&TrackedTitle::new("Frieren", 12)).await.unwrap_err();
        assert!(matches!(err, SyncError::NoScore));
        assert!(sync.service().updates.lock().unwrap().is_empty());
    }

    #[test]
    fn test_line_prompt_reasks_until_valid() {
        let mut output = Vec::new();
        let score = LinePrompt::new(Cursor::new("11\nabc\n8.5\n"), &mut output)
            .ask_score()
            .unwrap();
        assert_eq!(score, Some(8.5));

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.matches("Score (0-10): ").count(), 3);
        assert_eq!(output.matches("Please enter a number").count(), 2);
    }

    #[test]
    fn test_line_prompt_end_of_input() {
        let score = LinePrompt::new(Cursor::new("nope\n"), io::sink())
            .ask_score()
            .unwrap();
        assert!(score.is_none());
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(" 7 \n"), Some(7.0));
        assert_eq!(parse_score("0"), Some(0.0));
        assert_eq!(parse_score("10"), Some(10.0));
        assert!(parse_score("-1").is_none());
        assert!(parse_score("10.5").is_none());
        assert!(parse_score("NaN").is_none());
        assert!(parse_score("").is_none());
    }
}
