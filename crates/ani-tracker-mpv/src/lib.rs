//! mpv JSON IPC client and the playback poller built on top of it.

pub mod channel;
pub mod ipc;
pub mod poller;

pub use channel::{ChannelError, ControlChannel, PlayerProperty};
pub use ipc::{Endpoint, MpvIpcClient};
pub use poller::{MonitorExit, PollError, Poller, PollerConfig, PollerState, ThresholdTrigger};
