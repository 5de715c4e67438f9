//! The control-channel capability the poller is written against.
//!
//! Implementations must keep at most one request in flight per channel.
//! A reply that arrives after its request timed out must not be handed to
//! a later request.

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

/// Errors from opening a control channel.
///
/// Reads never produce these; a failed read is an absent value.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported endpoint: {0}")]
    Unsupported(String),
}

/// A request/response connection to a running player.
pub trait ControlChannel: Send {
    /// Whether the endpoint looks reachable yet (e.g. the socket file exists).
    fn is_available(&self) -> bool;

    fn is_connected(&self) -> bool;

    /// Open the connection. Replaces any existing one.
    fn connect(&mut self) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Best-effort property read. `None` on timeout, transport failure or a
    /// player-side error.
    fn get_property(&mut self, name: &str) -> impl Future<Output = Option<Value>> + Send;

    /// Release the connection. Safe to call repeatedly or before `connect`.
    fn close(&mut self);
}

/// Player properties sampled on each poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerProperty {
    Duration,
    TimePos,
    PercentPos,
    Pause,
    Filename,
}

impl PlayerProperty {
    /// Sampling order within one tick.
    pub const TICK_ORDER: &[PlayerProperty] = &[
        Self::Duration,
        Self::TimePos,
        Self::PercentPos,
        Self::Pause,
        Self::Filename,
    ];

    /// mpv property name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Duration => "duration",
            Self::TimePos => "time-pos",
            Self::PercentPos => "percent-pos",
            Self::Pause => "pause",
            Self::Filename => "filename",
        }
    }
}

impl std::fmt::Display for PlayerProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
