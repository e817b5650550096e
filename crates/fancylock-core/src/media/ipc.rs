//! Player IPC: asking mpv which file it is showing

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Request for the `path` property, newline terminated
pub const CURRENT_PATH_REQUEST: &[u8] = b"{\"command\": [\"get_property\", \"path\"]}\n";

/// Lines read before giving up on a reply (mpv may interleave events)
const MAX_REPLY_LINES: usize = 8;

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Extract the file path from one reply line such as
/// `{"data":"/media/a.mp4","request_id":0,"error":"success"}`.
///
/// Returns `None` for events, errors, non-string data and malformed input.
pub fn parse_reply(line: &[u8]) -> Option<String> {
    let reply: Reply = serde_json::from_slice(line).ok()?;
    match reply.data? {
        serde_json::Value::String(path) if !path.is_empty() => Some(path),
        _ => None,
    }
}

/// Query the player listening on `socket` for its current file.
///
/// Every failure (no socket yet, timeout, bad reply) yields `None`.
pub async fn query_current_path(socket: &Path, timeout: Duration) -> Option<PathBuf> {
    tokio::time::timeout(timeout, query(socket))
        .await
        .ok()
        .flatten()
}

async fn query(socket: &Path) -> Option<PathBuf> {
    let mut stream = UnixStream::connect(socket).await.ok()?;
    stream.write_all(CURRENT_PATH_REQUEST).await.ok()?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    for _ in 0..MAX_REPLY_LINES {
        line.clear();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        if let Some(path) = parse_reply(line.trim_end().as_bytes()) {
            return Some(PathBuf::from(path));
        }
    }
    None
}
