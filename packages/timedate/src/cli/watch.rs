//! `timedate watch`: follow a server's time stream from the terminal.

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;
use tracing::debug;

use crate::models::TimeFormat;
use crate::ws::{ClientMessage, ServerMessage};

pub const STREAM_PATH: &str = "/ws/time";

/// Accept `host:port`, `http(s)://host:port` or a full `ws(s)://` URL.
/// A URL without a path gets the stream endpoint appended.
pub fn stream_url(target: &str) -> String {
    let target = target.trim_end_matches('/');
    let (scheme, rest) = match target.split_once("://") {
        Some(("https", rest)) | Some(("wss", rest)) => ("wss", rest),
        Some((_, rest)) => ("ws", rest),
        None => ("ws", target),
    };
    if rest.contains('/') {
        format!("{}://{}", scheme, rest)
    } else {
        format!("{}://{}{}", scheme, rest, STREAM_PATH)
    }
}

/// One terminal line per update.
pub fn render_update(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::TimeUpdate { data, .. } => {
            format!("{}  {} ({})", data.formatted, data.date, data.timezone)
        }
    }
}

pub async fn watch_command(
    target: &str,
    timezone: Option<String>,
    format: Option<TimeFormat>,
    count: Option<u64>,
) -> Result<()> {
    if count == Some(0) {
        return Ok(());
    }

    let url = stream_url(target);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    let (mut ws_write, mut ws_read) = ws_stream.split();

    if timezone.is_some() || format.is_some() {
        let cmd = ClientMessage::subscribe(timezone.as_deref(), format.map(|f| f.name()));
        let json = serde_json::to_string(&cmd)?;
        ws_write
            .send(tungstenite::Message::Text(json.into()))
            .await
            .context("Failed to send subscribe command")?;
    }

    let mut received = 0u64;
    while let Some(frame) = ws_read.next().await {
        match frame.context("WebSocket receive failed")? {
            tungstenite::Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                Ok(msg) => {
                    println!("{}", render_update(&msg));
                    received += 1;
                    if count.is_some_and(|n| received >= n) {
                        let _ = ws_write.close().await;
                        return Ok(());
                    }
                }
                Err(e) => debug!("Ignoring unexpected message: {}", e),
            },
            tungstenite::Message::Close(_) => break,
            _ => {}
        }
    }

    if received == 0 {
        bail!("Server closed the stream before sending any update");
    }
    eprintln!("[timedate: stream closed]");
    Ok(())
}
