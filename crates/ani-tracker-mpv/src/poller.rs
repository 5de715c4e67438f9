//! Playback poller: waits for the player, connects, samples it once per
//! tick and reports the first tick past the completion threshold.
//!
//! ```text
//! AwaitingPlayer -> Connecting -> Monitoring -> Terminated
//! ```

use std::io::Write;
use std::time::Duration;

use ani_tracker_core::config::AppConfig;
use ani_tracker_core::format;
use ani_tracker_core::models::PlaybackSnapshot;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, ControlChannel, PlayerProperty};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to connect to the player after {attempts} attempts")]
    ConnectExhausted {
        attempts: u32,
        #[source]
        last_error: Option<ChannelError>,
    },

    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    AwaitingPlayer,
    Connecting,
    Monitoring,
    Terminated,
}

/// Why monitoring stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorExit {
    /// First tick at or past the threshold, with the snapshot that crossed it.
    ThresholdReached(PlaybackSnapshot),
    Cancelled,
}

/// Timing and threshold settings for one poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub wait_interval: Duration,
    /// Extra pause after the socket appears, before the first connect.
    pub settle_delay: Duration,
    pub connect_attempts: u32,
    pub connect_retry: Duration,
    pub poll_interval: Duration,
    pub threshold_percent: f64,
}

impl PollerConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            wait_interval: config.player.wait_interval(),
            settle_delay: config.player.wait_interval(),
            connect_attempts: config.player.connect_attempts,
            connect_retry: config.player.connect_retry(),
            poll_interval: config.player.poll_interval(),
            threshold_percent: config.sync.threshold_percent,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Edge trigger that fires once, on the first percent at or above the
/// threshold, and never re-arms.
#[derive(Debug, Clone)]
pub struct ThresholdTrigger {
    threshold: f64,
    fired: bool,
}

impl ThresholdTrigger {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            fired: false,
        }
    }

    /// Returns `true` exactly once per trigger.
    pub fn observe(&mut self, percent: Option<f64>) -> bool {
        if self.fired {
            return false;
        }
        match percent {
            Some(p) if p >= self.threshold => {
                self.fired = true;
                true
            }
            _ => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

/// Drives a [`ControlChannel`] through one playback session, rendering the
/// status line to `out`.
pub struct Poller<C, W> {
    channel: C,
    config: PollerConfig,
    out: W,
    state: PollerState,
    trigger: ThresholdTrigger,
}

impl<C: ControlChannel, W: Write> Poller<C, W> {
    pub fn new(channel: C, config: PollerConfig, out: W) -> Self {
        let trigger = ThresholdTrigger::new(config.threshold_percent);
        Self {
            channel,
            config,
            out,
            state: PollerState::AwaitingPlayer,
            trigger,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Block until the channel endpoint shows up, then let the player settle.
    pub async fn wait_for_player(
        &mut self,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(), PollError> {
        self.state = PollerState::AwaitingPlayer;
        let mut checks = 0u64;
        while !self.channel.is_available() {
            checks += 1;
            if checks == 1 {
                debug!("Player endpoint not present yet");
            }
            if sleep_or_cancel(self.config.wait_interval, cancel).await {
                self.state = PollerState::Terminated;
                return Err(PollError::Cancelled);
            }
        }
        debug!(checks, "Player endpoint available");

        if sleep_or_cancel(self.config.settle_delay, cancel).await {
            self.state = PollerState::Terminated;
            return Err(PollError::Cancelled);
        }
        Ok(())
    }

    /// Try to connect, up to the configured attempt budget.
    pub async fn connect(&mut self) -> Result<(), PollError> {
        self.state = PollerState::Connecting;
        let attempts = self.config.connect_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.channel.connect().await {
                Ok(()) => {
                    info!(attempt, "Connected to player");
                    return Ok(());
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Connect attempt failed");
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.connect_retry).await;
            }
        }

        warn!(attempts, "Giving up on player connection");
        self.state = PollerState::Terminated;
        Err(PollError::ConnectExhausted {
            attempts,
            last_error,
        })
    }

    /// Read every tick property, in order, into a fresh snapshot.
    pub async fn sample(&mut self) -> PlaybackSnapshot {
        let duration_seconds = self.read(PlayerProperty::Duration).await.and_then(|v| v.as_f64());
        let position_seconds = self.read(PlayerProperty::TimePos).await.and_then(|v| v.as_f64());
        let percent_complete = self.read(PlayerProperty::PercentPos).await.and_then(|v| v.as_f64());
        let paused = self.read(PlayerProperty::Pause).await.and_then(|v| v.as_bool());
        let file_name = self
            .read(PlayerProperty::Filename)
            .await
            .and_then(|v| v.as_str().map(str::to_string));

        PlaybackSnapshot {
            duration_seconds,
            position_seconds,
            percent_complete,
            paused,
            file_name,
        }
    }

    /// Poll until the threshold is crossed or `cancel` is raised.
    ///
    /// Ticks without duration or position only render a waiting line.
    pub async fn monitor(
        &mut self,
        cancel: &mut watch::Receiver<bool>,
    ) -> MonitorExit {
        self.state = PollerState::Monitoring;
        loop {
            if *cancel.borrow() {
                debug!("Monitoring cancelled");
                return MonitorExit::Cancelled;
            }

            let snapshot = self.sample().await;
            self.render(&snapshot);

            if snapshot.has_timing() && self.trigger.observe(snapshot.effective_percent()) {
                info!(
                    percent = snapshot.effective_percent(),
                    file = ?snapshot.file_name,
                    "Completion threshold reached"
                );
                return MonitorExit::ThresholdReached(snapshot);
            }

            if sleep_or_cancel(self.config.poll_interval, cancel).await {
                debug!("Monitoring cancelled");
                return MonitorExit::Cancelled;
            }
        }
    }

    /// Close the channel and finish the session.
    pub fn close(&mut self) {
        self.channel.close();
        self.state = PollerState::Terminated;
    }

    async fn read(&mut self, property: PlayerProperty) -> Option<Value> {
        self.channel.get_property(property.name()).await
    }

    fn render(&mut self, snapshot: &PlaybackSnapshot) {
        let line = format::status_line(snapshot);
        if let Err(e) = write!(self.out, "{line}").and_then(|_| self.out.flush()) {
            debug!(error = %e, "Failed to render status line");
        }
    }
}

/// Sleep for `duration`; returns `true` if cancelled first.
async fn sleep_or_cancel(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if *cancel.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        Ok(_) = cancel.wait_for(|stop| *stop) => true,
    }
}
