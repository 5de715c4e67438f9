//! mpv JSON IPC over a Unix socket (or a TCP bridge to one).
//!
//! Wire format: one JSON object per line in each direction.
//!
//! ```text
//! -> {"command":["get_property","time-pos"],"request_id":3}
//! <- {"data":612.48,"request_id":3,"error":"success"}
//! ```
//!
//! mpv also pushes `{"event": ...}` lines to every client; those are skipped
//! while waiting for a reply.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use ani_tracker_core::config::PlayerConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::channel::{ChannelError, ControlChannel};

const TCP_PREFIX: &str = "tcp://";
const READ_CHUNK: usize = 4096;

/// Where the player's IPC server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    /// `host:port` of a TCP bridge (e.g. socat) in front of the socket.
    Tcp(String),
}

impl Endpoint {
    /// `tcp://host:port` selects TCP; anything else is a socket path.
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix(TCP_PREFIX) {
            Some(addr) => Self::Tcp(addr.to_string()),
            None => Self::Unix(PathBuf::from(s)),
        }
    }

    fn is_available(&self) -> bool {
        match self {
            Self::Unix(path) => path.exists(),
            Self::Tcp(_) => true,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp(addr) => write!(f, "{TCP_PREFIX}{addr}"),
        }
    }
}

/// Outgoing IPC command.
#[derive(Debug, Serialize)]
pub struct ChannelRequest {
    pub command: Vec<Value>,
    pub request_id: u64,
}

/// Incoming IPC line: either a command reply or an unsolicited event.
#[derive(Debug, Deserialize)]
pub struct ChannelResponse {
    #[serde(default)]
    pub request_id: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub event: Option<String>,
}

impl ChannelResponse {
    pub fn is_success(&self) -> bool {
        self.error.as_deref() == Some("success")
    }

    /// Payload of a successful reply. `null` counts as absent.
    pub fn into_data(self) -> Option<Value> {
        if !self.is_success() || self.data.is_null() {
            return None;
        }
        Some(self.data)
    }
}

trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Control channel speaking mpv's JSON IPC protocol.
pub struct MpvIpcClient {
    endpoint: Endpoint,
    read_timeout: Duration,
    stream: Option<Box<dyn Transport>>,
    /// Bytes received past the last complete line.
    pending: Vec<u8>,
    last_request_id: u64,
}

impl MpvIpcClient {
    pub fn new(endpoint: Endpoint, read_timeout: Duration) -> Self {
        Self {
            endpoint,
            read_timeout,
            stream: None,
            pending: Vec::new(),
            last_request_id: 0,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(Endpoint::parse(&config.endpoint), config.read_timeout())
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send one command and wait for its reply.
    pub async fn command(&mut self, command: Vec<Value>) -> Option<ChannelResponse> {
        let Self {
            stream,
            pending,
            read_timeout,
            last_request_id,
            ..
        } = self;
        let stream = stream.as_mut()?;

        *last_request_id += 1;
        let request_id = *last_request_id;
        let request = ChannelRequest {
            command,
            request_id,
        };
        let mut line = serde_json::to_vec(&request).ok()?;
        line.push(b'\n');

        if let Err(e) = stream.write_all(&line).await {
            debug!(request_id, error = %e, "IPC write failed");
            return None;
        }

        match tokio::time::timeout(*read_timeout, read_reply(stream, pending, request_id)).await {
            Ok(Ok(Some(reply))) => {
                if reply.request_id.is_some_and(|id| id != request_id) {
                    debug!(
                        request_id,
                        reply_id = ?reply.request_id,
                        "IPC reply id does not match request"
                    );
                }
                Some(reply)
            }
            Ok(Ok(None)) => {
                debug!(request_id, "IPC stream closed or sent garbage");
                None
            }
            Ok(Err(e)) => {
                debug!(request_id, error = %e, "IPC read failed");
                None
            }
            Err(_) => {
                trace!(request_id, "IPC read timed out");
                pending.clear();
                None
            }
        }
    }
}

impl ControlChannel for MpvIpcClient {
    fn is_available(&self) -> bool {
        self.endpoint.is_available()
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        self.close();

        let stream: Box<dyn Transport> = match &self.endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => Box::new(
                tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(|source| ChannelError::Connect {
                        endpoint: self.endpoint.to_string(),
                        source,
                    })?,
            ),
            #[cfg(not(unix))]
            Endpoint::Unix(path) => {
                return Err(ChannelError::Unsupported(format!(
                    "unix sockets are not available on this platform: {}",
                    path.display()
                )));
            }
            Endpoint::Tcp(addr) => Box::new(
                tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|source| ChannelError::Connect {
                        endpoint: self.endpoint.to_string(),
                        source,
                    })?,
            ),
        };

        debug!(endpoint = %self.endpoint, "IPC connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn get_property(&mut self, name: &str) -> Option<Value> {
        let reply = self
            .command(vec![Value::from("get_property"), Value::from(name)])
            .await?;
        if !reply.is_success() {
            trace!(property = name, error = ?reply.error, "Property unavailable");
        }
        reply.into_data()
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(endpoint = %self.endpoint, "IPC connection closed");
        }
        self.pending.clear();
        self.last_request_id = 0;
    }
}

/// Read lines until the reply to `request_id` arrives.
///
/// Events and late replies to earlier, timed-out requests are skipped.
/// Replies without an id are accepted. `Ok(None)` means EOF or an
/// unparseable line.
async fn read_reply<S>(
    stream: &mut S,
    pending: &mut Vec<u8>,
    request_id: u64,
) -> std::io::Result<Option<ChannelResponse>>
where
    S: AsyncRead + Unpin,
{
    loop {
        let Some(line) = next_line(stream, pending).await? else {
            return Ok(None);
        };
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<ChannelResponse>(&line) {
            Ok(reply) if reply.event.is_some() => {
                trace!(event = ?reply.event, "Skipping mpv event");
            }
            Ok(reply) if reply.request_id.is_some_and(|id| id < request_id) => {
                debug!(
                    request_id,
                    stale_id = ?reply.request_id,
                    "Discarding late IPC reply"
                );
            }
            Ok(reply) => return Ok(Some(reply)),
            Err(e) => {
                debug!(error = %e, "Malformed IPC line");
                return Ok(None);
            }
        }
    }
}

async fn next_line<S>(stream: &mut S, pending: &mut Vec<u8>) -> std::io::Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(pos) = pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = pending.drain(..=pos).collect();
            line.pop();
            return Ok(Some(line));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        pending.extend_from_slice(&chunk[..n]);
    }
}
