//! Newline-delimited JSON over TCP.
//!
//! Each inbound line is one [`ClientEvent`]; each outbound line is one
//! [`ServerEvent`]. A line that is not UTF-8 or does not parse is dropped
//! without a reply.
//! Per connection, a reader loop feeds the server and a writer task drains
//! the connection's event queue onto the socket.

use std::sync::Arc;

use anyhow::Result;
use log::{debug, trace, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::logutil::escape_log;
use crate::server::protocol::{ClientEvent, ServerEvent};
use crate::server::GameServer;

/// Longest accepted line, newline excluded; anything longer closes the
/// connection before more than this much is buffered.
const MAX_LINE_BYTES: usize = 16 * 1024;

/// Accept connections until the listener fails.
pub async fn serve(server: Arc<GameServer>, listener: TcpListener) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let server = server.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(server, stream, Some(peer.to_string())).await {
                debug!("connection {} ended with error: {}", peer, e);
            }
        });
    }
}

/// Parse one inbound line. `None` for blank or malformed input.
pub fn decode_line(line: &str) -> Option<ClientEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("dropping malformed line ({}): {}", e, escape_log(line));
            None
        }
    }
}

/// Render one outbound event as a JSON line, newline included.
pub fn encode_event(event: &ServerEvent) -> Result<String> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<ServerEvent>) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        trace!("-> {}", event.name());
        let line = encode_event(&event)?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

async fn handle_connection(
    server: Arc<GameServer>,
    stream: TcpStream,
    peer: Option<String>,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let (mut session, rx) = server.connect(peer);
    let writer = tokio::spawn(write_loop(write_half, rx));

    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(512);
    let result: Result<()> = async {
        loop {
            buf.clear();
            let n = (&mut reader)
                .take(MAX_LINE_BYTES as u64 + 1)
                .read_until(b'\n', &mut buf)
                .await?;
            if n == 0 {
                return Ok(());
            }
            let terminated = buf.last() == Some(&b'\n');
            if !terminated && buf.len() > MAX_LINE_BYTES {
                warn!("{} sent an oversized line; closing", session.label());
                return Ok(());
            }
            match std::str::from_utf8(&buf) {
                Ok(line) => {
                    if let Some(event) = decode_line(line) {
                        if let Err(e) = server.handle_event(&mut session, event).await {
                            warn!("event from {} failed: {:#}", session.label(), e);
                        }
                    }
                }
                Err(e) => debug!("dropping non-UTF-8 line from {}: {}", session.label(), e),
            }
            // An unterminated line within the limit means the peer closed mid-line.
            if !terminated {
                return Ok(());
            }
        }
    }
    .await;

    // Dropping the presence entry closes the queue, so the writer drains and exits.
    server.disconnect(&session);
    let _ = writer.await;
    result
}
