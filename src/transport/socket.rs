// MIT License - Copyright (c) 2021 TJForc
// AlarmDecoder TCP socket (ser2sock) transport

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{BridgeError, Result};
use crate::panel::CommandSink;

/// [`CommandSink`] that queues keystrokes for the socket writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl CommandSink for ChannelSink {
    fn send(&self, keys: &str) -> Result<()> {
        self.tx
            .send(keys.to_string())
            .map_err(|_| BridgeError::ChannelClosed)
    }
}

/// A line-oriented connection to an AlarmDecoder exposed over TCP.
///
/// The device emits one message per line; keystrokes are written back
/// unframed.
pub struct SocketConnection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    sink: ChannelSink,
    writer_handle: JoinHandle<()>,
}

impl SocketConnection {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        info!("Connecting to AlarmDecoder at {}:{}", host, port);
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            error!("TCP connect failed: {}", e);
            BridgeError::Io(e)
        })?;
        debug!("TCP socket connected");

        let (reader, mut writer) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer_handle = tokio::spawn(async move {
            while let Some(keys) = rx.recv().await {
                if let Err(e) = writer.write_all(keys.as_bytes()).await {
                    error!("Failed to write to AlarmDecoder: {}", e);
                    break;
                }
            }
            debug!("Socket writer stopped");
        });

        Ok(Self {
            lines: BufReader::new(reader).lines(),
            sink: ChannelSink::new(tx),
            writer_handle,
        })
    }

    /// Sink for sending keystrokes on this connection.
    pub fn sink(&self) -> ChannelSink {
        self.sink.clone()
    }

    /// Next non-empty line with line endings removed, or `None` when the
    /// device closes the connection.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim_end_matches('\r');
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
        Ok(None)
    }
}

impl Drop for SocketConnection {
    fn drop(&mut self) {
        self.writer_handle.abort();
    }
}
