//! Run with: cargo run -p ani-tracker-mpv --example probe [endpoint]
//!
//! Connects to a running mpv and prints one playback snapshot.

use std::time::Duration;

use ani_tracker_core::format;
use ani_tracker_mpv::{ControlChannel, Endpoint, MpvIpcClient, Poller, PollerConfig};

#[tokio::main]
async fn main() {
    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/mpvsocket".to_string());
    let channel = MpvIpcClient::new(Endpoint::parse(&endpoint), Duration::from_secs(1));

    if !channel.is_available() {
        println!("No mpv socket at {endpoint}. Start mpv with --input-ipc-server={endpoint}");
        return;
    }

    let mut poller = Poller::new(channel, PollerConfig::default(), std::io::sink());
    if let Err(e) = poller.connect().await {
        println!("{e}");
        return;
    }

    let snapshot = poller.sample().await;
    poller.close();

    println!("File:      {}", snapshot.file_name.as_deref().unwrap_or("N/A"));
    println!("Position:  {}", format::format_time_opt(snapshot.position_seconds));
    println!("Duration:  {}", format::format_time_opt(snapshot.duration_seconds));
    println!("Remaining: {}", format::format_time_opt(snapshot.remaining_seconds()));
    match snapshot.effective_percent() {
        Some(p) => println!("Percent:   {p:.1}%"),
        None => println!("Percent:   N/A"),
    }
    println!("Paused:    {}", snapshot.is_paused());
}
