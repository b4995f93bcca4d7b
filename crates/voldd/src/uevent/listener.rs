//! Background thread receiving kernel uevents.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nix::sys::socket::{
    AddressFamily, MsgFlags, NetlinkAddr, SockFlag, SockProtocol, SockType, bind, recv,
    setsockopt, socket, sockopt,
};
use tracing::{debug, info, warn};

use crate::coldboot::ArrivalCounter;
use crate::subsystems::{EventListener, SubsystemKind, SubsystemStartError};

use super::{BlockEventHandler, UEVENT_TARGET, Uevent, UeventAction, UeventParseError};

const UEVENT_BUFFER_SIZE: usize = 64 * 1024;
const RECEIVE_BUFFER_BYTES: usize = 256 * 1024;
const KERNEL_GROUPS: u32 = 0xffff_ffff;
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const THREAD_NAME: &str = "uevent-listener";

/// Supplies raw uevent datagrams.
///
/// A read of zero bytes means the source is exhausted and ends the listener
/// thread. The coldboot waiter is released at that point, since no further
/// arrivals can be reported.
pub trait UeventSource: Send + 'static {
    /// Receives one datagram into `buffer`, returning its length.
    fn receive(&mut self, buffer: &mut [u8]) -> io::Result<usize>;
}

/// Kernel object uevent netlink socket.
#[derive(Debug)]
pub struct NetlinkSocket {
    fd: OwnedFd,
}

impl NetlinkSocket {
    /// Opens a socket subscribed to every kernel uevent multicast group.
    pub fn open() -> io::Result<Self> {
        let fd = socket(
            AddressFamily::Netlink,
            SockType::Datagram,
            SockFlag::SOCK_CLOEXEC,
            SockProtocol::NetlinkKObjectUEvent,
        )?;
        setsockopt(&fd, sockopt::RcvBuf, &RECEIVE_BUFFER_BYTES)?;
        bind(fd.as_raw_fd(), &NetlinkAddr::new(0, KERNEL_GROUPS))?;
        Ok(Self { fd })
    }
}

impl UeventSource for NetlinkSocket {
    fn receive(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        Ok(recv(self.fd.as_raw_fd(), buffer, MsgFlags::empty())?)
    }
}

type Connector<S> = Box<dyn FnOnce() -> io::Result<S> + Send>;

/// Listener that decodes uevents on a dedicated thread.
///
/// Block events are handed to the [`BlockEventHandler`]; every block `add`
/// is then recorded on the coldboot arrival counter.
pub struct NetlinkEventListener<S = NetlinkSocket> {
    handler: Arc<dyn BlockEventHandler>,
    connect: Option<Connector<S>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl NetlinkEventListener<NetlinkSocket> {
    /// Builds a listener over the kernel netlink socket.
    #[must_use]
    pub fn new(handler: Arc<dyn BlockEventHandler>) -> Self {
        Self::with_connector(handler, NetlinkSocket::open)
    }
}

impl<S> NetlinkEventListener<S>
where
    S: UeventSource,
{
    /// Builds a listener whose source is opened by `connect` when started.
    #[must_use]
    pub fn with_connector(
        handler: Arc<dyn BlockEventHandler>,
        connect: impl FnOnce() -> io::Result<S> + Send + 'static,
    ) -> Self {
        Self {
            handler,
            connect: Some(Box::new(connect)),
            thread: None,
        }
    }

    /// Waits for the listener thread to drain its source.
    #[cfg(test)]
    pub(crate) fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            thread.join().expect("uevent listener thread panicked");
        }
    }
}

impl<S> EventListener for NetlinkEventListener<S>
where
    S: UeventSource,
{
    fn start(&mut self, counter: Arc<ArrivalCounter>) -> Result<(), SubsystemStartError> {
        let connect = self.connect.take().ok_or_else(|| {
            SubsystemStartError::new(SubsystemKind::EventListener, "listener already started")
        })?;
        let source = connect().map_err(|source| {
            SubsystemStartError::with_source(
                SubsystemKind::EventListener,
                "failed to open uevent socket",
                source,
            )
        })?;
        let handler = Arc::clone(&self.handler);
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || run_receive_loop(source, handler, counter))
            .map_err(|source| {
                SubsystemStartError::with_source(
                    SubsystemKind::EventListener,
                    "failed to spawn listener thread",
                    source,
                )
            })?;
        self.thread = Some(thread);
        Ok(())
    }
}

fn run_receive_loop<S: UeventSource>(
    mut source: S,
    handler: Arc<dyn BlockEventHandler>,
    counter: Arc<ArrivalCounter>,
) {
    info!(target: UEVENT_TARGET, "uevent listener active");
    let mut buffer = vec![0_u8; UEVENT_BUFFER_SIZE];
    let mut last_error = None::<io::ErrorKind>;
    loop {
        match source.receive(&mut buffer) {
            Ok(0) => break,
            Ok(length) => {
                last_error = None;
                if let Some(datagram) = buffer.get(..length) {
                    dispatch(datagram, handler.as_ref(), &counter);
                }
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: UEVENT_TARGET,
                        error = %error,
                        "uevent receive error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: UEVENT_TARGET, "uevent source closed");
    counter.release();
}

fn dispatch(datagram: &[u8], handler: &dyn BlockEventHandler, counter: &ArrivalCounter) {
    let event = match Uevent::parse(datagram) {
        Ok(event) => event,
        Err(UeventParseError::Libudev) => return,
        Err(error) => {
            debug!(target: UEVENT_TARGET, error = %error, "discarding uevent");
            return;
        }
    };
    if !event.is_block() {
        return;
    }

    let claimed = handler.handle_block_event(&event);
    debug!(
        target: UEVENT_TARGET,
        action = %event.action(),
        devpath = event.devpath(),
        claimed,
        "block event"
    );
    if *event.action() == UeventAction::Add {
        counter.record_arrival();
    }
}
