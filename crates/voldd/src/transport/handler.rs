//! Request handling for command socket clients.
//!
//! A client writes one JSON request line and reads JSON reply lines until an
//! `exit` record carrying the command status:
//!
//! ```text
//! > {"command":"volume_list"}
//! < {"kind":"volume","label":"sdcard1","mount_point":"/storage/sdcard1",...}
//! < {"kind":"exit","status":0}
//! ```

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::subsystems::VolumeRegistry;
use crate::volume::VolumeInfo;

use super::LISTENER_TARGET;

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: UnixStream);
}

const MAX_REQUEST_BYTES: usize = 64 * 1024;
const VOLUME_LIST: &str = "volume_list";

#[derive(Debug, Deserialize)]
struct Request {
    command: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Reply<'a> {
    Volume(&'a VolumeInfo),
    Error { message: String },
    Exit { status: i32 },
}

/// Answers read-only queries against the volume registry.
pub(crate) struct VolumeListHandler {
    registry: Arc<dyn VolumeRegistry>,
}

impl VolumeListHandler {
    pub(crate) fn new(registry: Arc<dyn VolumeRegistry>) -> Self {
        Self { registry }
    }

    fn respond<S: Read + Write>(&self, stream: &mut S) -> io::Result<()> {
        let Some(line) = read_request_line(stream)? else {
            return Ok(());
        };
        let status = match serde_json::from_slice::<Request>(&line) {
            Ok(request) if request.command == VOLUME_LIST => {
                let volumes = self.registry.volumes();
                for volume in &volumes {
                    write_reply(stream, &Reply::Volume(volume))?;
                }
                0
            }
            Ok(request) => {
                let message = format!("unknown command '{}'", request.command);
                write_reply(stream, &Reply::Error { message })?;
                1
            }
            Err(error) => {
                let message = format!("malformed request: {error}");
                write_reply(stream, &Reply::Error { message })?;
                1
            }
        };
        debug!(target: LISTENER_TARGET, status, "command handled");
        write_reply(stream, &Reply::Exit { status })?;
        stream.flush()
    }
}

impl ConnectionHandler for VolumeListHandler {
    fn handle(&self, mut stream: UnixStream) {
        if let Err(error) = self.respond(&mut stream) {
            warn!(
                target: LISTENER_TARGET,
                error = %error,
                "connection handler error"
            );
        }
    }
}

fn write_reply<W: Write>(stream: &mut W, reply: &Reply<'_>) -> io::Result<()> {
    let mut line = serde_json::to_vec(reply).map_err(io::Error::other)?;
    line.push(b'\n');
    stream.write_all(&line)
}

fn read_request_line<R: Read>(stream: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let bytes_read = read_chunk_with_retry(stream, &mut chunk)?;
        if bytes_read == 0 {
            return Ok((!buffer.is_empty()).then_some(buffer));
        }
        if let Some(pos) = chunk[..bytes_read].iter().position(|byte| *byte == b'\n') {
            buffer.extend_from_slice(&chunk[..pos]);
            enforce_request_limit(buffer.len())?;
            return Ok(Some(buffer));
        }
        buffer.extend_from_slice(&chunk[..bytes_read]);
        enforce_request_limit(buffer.len())?;
    }
}

fn read_chunk_with_retry<R: Read>(stream: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

fn enforce_request_limit(size: usize) -> io::Result<()> {
    if size > MAX_REQUEST_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "request exceeds maximum size",
        ));
    }
    Ok(())
}
