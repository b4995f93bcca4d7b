//! Unix socket command listener.
//!
//! The listener is the last subsystem started: clients are only accepted once
//! coldboot has settled and the volume registry reflects the devices present
//! at boot. Each connection is served on its own thread.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use vold_config::prepare_socket_directory;

use crate::subsystems::{CommandServer, SubsystemKind, SubsystemStartError, VolumeRegistry};

mod errors;
mod handler;
mod listener;

pub use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, VolumeListHandler};
pub(crate) use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Command server answering volume queries over a Unix socket.
pub struct CommandListener {
    socket: Utf8PathBuf,
    registry: Arc<dyn VolumeRegistry>,
    handle: Option<ListenerHandle>,
}

impl CommandListener {
    /// Builds a server for `socket` backed by `registry`.
    #[must_use]
    pub fn new(socket: &Utf8Path, registry: Arc<dyn VolumeRegistry>) -> Self {
        Self {
            socket: socket.to_path_buf(),
            registry,
            handle: None,
        }
    }

    fn failure(
        message: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> SubsystemStartError {
        SubsystemStartError::with_source(SubsystemKind::CommandServer, message, source)
    }
}

impl CommandServer for CommandListener {
    fn start_listener(&mut self) -> Result<(), SubsystemStartError> {
        if self.handle.is_some() {
            return Err(SubsystemStartError::new(
                SubsystemKind::CommandServer,
                "listener already started",
            ));
        }
        prepare_socket_directory(&self.socket)
            .map_err(|source| Self::failure("failed to prepare socket directory", source))?;
        let listener = SocketListener::bind(self.socket.as_std_path())
            .map_err(|source| Self::failure("failed to bind command socket", source))?;
        let handler = Arc::new(VolumeListHandler::new(Arc::clone(&self.registry)));
        let handle = listener
            .start(handler)
            .map_err(|source| Self::failure("failed to start command listener", source))?;
        self.handle = Some(handle);
        Ok(())
    }
}

impl Drop for CommandListener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
            // A panicked accept loop has already stopped serving.
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;

    use rstest::rstest;

    use super::*;
    use crate::manager::VolumeManager;

    #[rstest]
    fn serves_volume_list_over_socket() {
        let dir = tempfile::tempdir().expect("temp dir");
        let socket = Utf8PathBuf::from_path_buf(dir.path().join("socket").join("vold"))
            .expect("utf8 path");
        let registry = Arc::new(VolumeManager::new(&vold_config::Config::default()));
        let mut server = CommandListener::new(&socket, registry);
        server.start_listener().expect("listener should start");

        let mut client = UnixStream::connect(socket.as_std_path()).expect("connect client");
        client
            .write_all(b"{\"command\":\"volume_list\"}\n")
            .expect("write request");
        let mut reply = String::new();
        BufReader::new(&mut client)
            .read_line(&mut reply)
            .expect("read reply");
        assert_eq!(reply.trim_end(), "{\"kind\":\"exit\",\"status\":0}");

        let error = server.start_listener().expect_err("second start fails");
        assert_eq!(error.kind, SubsystemKind::CommandServer);
        drop(server);
        assert!(!socket.exists(), "socket removed on drop");
    }
}
