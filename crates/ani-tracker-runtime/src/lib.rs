//! Session orchestration: wait for the player, monitor playback and sync
//! progress once the episode counts as watched.

use std::io::Write;

use ani_tracker_api::{ProgressSync, ScorePrompt, SyncOutcome, TrackerService};
use ani_tracker_core::config::AppConfig;
use ani_tracker_core::models::TrackedTitle;
use ani_tracker_core::{CoreError, Credentials};
use ani_tracker_mpv::{ControlChannel, MonitorExit, PollError, Poller, PollerConfig};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("ACCESS_TOKEN is not set, run `ani-tracker get-token` first")]
    MissingToken,
    #[error("player endpoint is not configured")]
    MissingEndpoint,
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("sync failed: {0}")]
    Sync(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// How a monitored session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Synced(SyncOutcome),
    Cancelled,
}

/// Check everything a session needs before touching the network or socket.
pub fn validate_session(credentials: &Credentials, config: &AppConfig) -> Result<(), RuntimeError> {
    if credentials.bearer_token().is_none() {
        return Err(RuntimeError::MissingToken);
    }
    if config.player.endpoint.trim().is_empty() {
        return Err(RuntimeError::MissingEndpoint);
    }
    Ok(())
}

/// Close `channel` without monitoring.
pub fn kill<C: ControlChannel, W: Write>(channel: &mut C, out: &mut W) {
    let _ = writeln!(out, "Killing mpv connection...");
    channel.close();
    info!("Player connection closed on request");
}

/// Couples a [`Poller`] with a [`ProgressSync`] for one tracked episode.
pub struct Orchestrator<C, S, P, W> {
    poller: Poller<C, W>,
    sync: ProgressSync<S, P>,
}

impl<C, S, P, W> Orchestrator<C, S, P, W>
where
    C: ControlChannel,
    S: TrackerService,
    P: ScorePrompt,
    W: Write,
{
    pub fn new(channel: C, service: S, prompt: P, config: PollerConfig, out: W) -> Self {
        Self {
            poller: Poller::new(channel, config, out),
            sync: ProgressSync::new(service, prompt),
        }
    }

    pub fn poller(&self) -> &Poller<C, W> {
        &self.poller
    }

    pub fn service(&self) -> &S {
        self.sync.service()
    }

    /// Run one full session. The channel is closed on every exit path.
    pub async fn run(
        &mut self,
        title: &TrackedTitle,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<SessionOutcome, RuntimeError> {
        info!(
            title = %title.display_title,
            episode = title.target_episode,
            "Starting session"
        );
        let result = self.drive(title, cancel).await;
        self.poller.close();
        result
    }

    /// Sync immediately, without waiting for playback.
    pub async fn update_now(&mut self, title: &TrackedTitle) -> Result<SyncOutcome, RuntimeError> {
        self.sync_once(title).await
    }

    async fn drive(
        &mut self,
        title: &TrackedTitle,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<SessionOutcome, RuntimeError> {
        self.say("Waiting for mpv to start...");
        match self.poller.wait_for_player(cancel).await {
            Ok(()) => {}
            Err(PollError::Cancelled) => {
                self.say("\nStopped waiting");
                return Ok(SessionOutcome::Cancelled);
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.poller.connect().await {
            self.say("Failed to connect to mpv");
            return Err(e.into());
        }
        self.say("Connected to mpv!\n");
        self.say("Monitoring mpv playback... (Ctrl+C to stop)\n");

        match self.poller.monitor(cancel).await {
            MonitorExit::Cancelled => {
                self.say("\n\nStopped monitoring");
                Ok(SessionOutcome::Cancelled)
            }
            MonitorExit::ThresholdReached(_) => {
                self.say("\nUpdating AniList...");
                self.sync_once(title).await.map(SessionOutcome::Synced)
            }
        }
    }

    async fn sync_once(&mut self, title: &TrackedTitle) -> Result<SyncOutcome, RuntimeError> {
        self.say(&format!(
            "Updating '{}' to episode {}...",
            title.lookup_title(),
            title.target_episode
        ));

        match self.sync.sync(title).await {
            Ok(outcome) => {
                self.say(&format!("Saved {}", outcome.saved));
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Sync attempt failed");
                Err(RuntimeError::Sync(Box::new(e)))
            }
        }
    }

    fn say(&mut self, message: &str) {
        let out = self.poller.output_mut();
        let _ = writeln!(out, "{message}").and_then(|_| out.flush());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;
    use std::sync::Mutex;

    use ani_tracker_api::{MediaRecord, ProgressUpdate, SavedEntry};
    use ani_tracker_mpv::ChannelError;
    use serde_json::Value;

    /// Player stuck at a fixed percent of a 24 minute episode.
    #[derive(Default)]
    struct FakeChannel {
        percent: f64,
        fail_connects: u32,
        connect_calls: u32,
        reads: u32,
        close_calls: u32,
    }

    impl FakeChannel {
        fn at(percent: f64) -> Self {
            Self {
                percent,
                ..Default::default()
            }
        }
    }

    impl ControlChannel for FakeChannel {
        fn is_available(&self) -> bool {
            true
        }

        fn is_connected(&self) -> bool {
            self.connect_calls > self.fail_connects && self.close_calls == 0
        }

        async fn connect(&mut self) -> Result<(), ChannelError> {
            self.connect_calls += 1;
            if self.connect_calls <= self.fail_connects {
                return Err(ChannelError::Connect {
                    endpoint: "fake".into(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                });
            }
            Ok(())
        }

        async fn get_property(&mut self, name: &str) -> Option<Value> {
            self.reads += 1;
            match name {
                "duration" => Some(Value::from(1440.0)),
                "time-pos" => Some(Value::from(14.4 * self.percent)),
                "percent-pos" => Some(Value::from(self.percent)),
                "pause" => Some(Value::from(false)),
                "filename" => Some(Value::from("ep12.mkv")),
                _ => None,
            }
        }

        fn close(&mut self) {
            self.close_calls += 1;
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct FakeError(String);

    struct FakeService {
        found: bool,
        updates: Mutex<Vec<ProgressUpdate>>,
    }

    impl FakeService {
        fn new(found: bool) -> Self {
            Self {
                found,
                updates: Mutex::default(),
            }
        }

        fn update_count(&self) -> usize {
            self.updates.lock().unwrap().len()
        }
    }

    impl TrackerService for FakeService {
        type Error = FakeError;

        async fn lookup_media(&self, _title: &str) -> Result<MediaRecord, FakeError> {
            if !self.found {
                return Err(FakeError("no Media in response".into()));
            }
            Ok(MediaRecord {
                media_id: 154587,
                total_episodes: Some(28),
            })
        }

        async fn save_progress(&self, update: &ProgressUpdate) -> Result<SavedEntry, FakeError> {
            self.updates.lock().unwrap().push(*update);
            Ok(SavedEntry {
                id: 3,
                progress: Some(update.progress()),
                score: None,
                status: Some("CURRENT".into()),
            })
        }
    }

    struct NoPrompt;

    impl ScorePrompt for NoPrompt {
        fn ask_score(&mut self) -> io::Result<Option<f32>> {
            Ok(None)
        }
    }

    type TestOrchestrator = Orchestrator<FakeChannel, FakeService, NoPrompt, Vec<u8>>;

    fn orchestrator(channel: FakeChannel, service: FakeService) -> TestOrchestrator {
        Orchestrator::new(channel, service, NoPrompt, PollerConfig::default(), Vec::new())
    }

    fn title() -> TrackedTitle {
        TrackedTitle::new("Frieren (2023)", 12)
    }

    fn output(orch: &TestOrchestrator) -> String {
        String::from_utf8_lossy(orch.poller().output()).into_owned()
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_syncs_once_and_closes() {
        let mut orch = orchestrator(FakeChannel::at(85.0), FakeService::new(true));
        let (_tx, mut rx) = watch::channel(false);

        let outcome = orch.run(&title(), &mut rx).await.unwrap();

        match outcome {
            SessionOutcome::Synced(synced) => assert_eq!(
                synced.update,
                ProgressUpdate::Progress {
                    media_id: 154587,
                    progress: 12
                }
            ),
            other => panic!("Expected Synced, got {other:?}"),
        }
        assert_eq!(orch.service().update_count(), 1);
        assert_eq!(orch.poller().channel().close_calls, 1);

        let out = output(&orch);
        assert!(out.contains("Connected to mpv!"));
        assert!(out.contains("Updating AniList..."));
        assert!(out.contains("Updating 'Frieren' to episode 12..."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_player_settles() {
        let mut orch = orchestrator(FakeChannel::at(85.0), FakeService::new(true));
        let (_tx, mut rx) = watch::channel(true);

        let outcome = orch.run(&title(), &mut rx).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(orch.poller().channel().connect_calls, 0);
        assert_eq!(orch.poller().channel().close_calls, 1);
        assert_eq!(orch.service().update_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_monitoring() {
        let mut orch = orchestrator(FakeChannel::at(10.0), FakeService::new(true));
        let (tx, mut rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            let _ = tx.send(true);
        });

        let outcome = orch.run(&title(), &mut rx).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert!(orch.poller().channel().reads > 0);
        assert_eq!(orch.poller().channel().close_calls, 1);
        assert_eq!(orch.service().update_count(), 0);
        assert!(output(&orch).contains("Stopped monitoring"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_never_monitors() {
        let channel = FakeChannel {
            fail_connects: u32::MAX,
            ..FakeChannel::at(85.0)
        };
        let mut orch = orchestrator(channel, FakeService::new(true));
        let (_tx, mut rx) = watch::channel(false);

        let err = orch.run(&title(), &mut rx).await.unwrap_err();

        assert!(matches!(
            err,
            RuntimeError::Poll(PollError::ConnectExhausted { attempts: 10, .. })
        ));
        assert_eq!(orch.poller().channel().reads, 0);
        assert_eq!(orch.poller().channel().close_calls, 1);
        assert_eq!(orch.service().update_count(), 0);
        assert!(output(&orch).contains("Failed to connect to mpv"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_failure_still_closes() {
        let mut orch = orchestrator(FakeChannel::at(90.0), FakeService::new(false));
        let (_tx, mut rx) = watch::channel(false);

        let err = orch.run(&title(), &mut rx).await.unwrap_err();

        assert!(matches!(err, RuntimeError::Sync(_)));
        assert!(err.to_string().contains("no Media in response"));
        assert_eq!(orch.poller().channel().close_calls, 1);
        assert_eq!(orch.service().update_count(), 0);
    }

    #[tokio::test]
    async fn test_update_now_skips_player() {
        let mut orch = orchestrator(FakeChannel::at(0.0), FakeService::new(true));

        let outcome = orch.update_now(&TrackedTitle::new("Frieren", 4)).await.unwrap();

        assert_eq!(outcome.update.progress(), 4);
        assert_eq!(orch.poller().channel().connect_calls, 0);
        assert_eq!(orch.poller().channel().reads, 0);
    }

    #[test]
    fn test_validate_session() {
        let mut config = AppConfig::default();
        let mut credentials = Credentials::default();
        assert!(matches!(
            validate_session(&credentials, &config),
            Err(RuntimeError::MissingToken)
        ));

        credentials.access_token = "tok".into();
        assert!(validate_session(&credentials, &config).is_ok());

        config.player.endpoint = " ".into();
        assert!(matches!(
            validate_session(&credentials, &config),
            Err(RuntimeError::MissingEndpoint)
        ));
    }

    #[test]
    fn test_kill_closes_unconnected_channel() {
        let mut channel = FakeChannel::default();
        let mut out = Vec::new();
        kill(&mut channel, &mut out);
        kill(&mut channel, &mut out);
        assert_eq!(channel.close_calls, 2);
        assert!(String::from_utf8(out).unwrap().starts_with("Killing mpv connection..."));
    }
}
