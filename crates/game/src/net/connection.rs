use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::command::{Command, TransportCommand};

use super::framing::{read_frame, write_frame};
use super::stats::{ConnectionStats, NetworkStats};
use super::{CommandInbox, NetworkError, PeerId};

/// An encoded command, shared between every connection it fans out to.
pub type Frame = Arc<[u8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
    Disposed,
}

#[derive(Debug)]
struct Shared {
    peer: PeerId,
    socket: TcpStream,
    inbox: CommandInbox,
    closed: AtomicBool,
    disposed: AtomicBool,
    loss_reported: AtomicBool,
    stats: ConnectionStats,
}

impl Shared {
    /// Marks the link dead. The first failure on a link that was not disposed
    /// posts exactly one `ConnectionLost` to the inbox.
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.socket.shutdown(Shutdown::Both);

        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if !self.loss_reported.swap(true, Ordering::SeqCst) {
            self.inbox
                .post_from(self.peer, TransportCommand::ConnectionLost { peer: self.peer });
        }
    }
}

/// A framed TCP link to one peer. Outgoing frames are written by a dedicated
/// sender thread in enqueue order; incoming frames are decoded by a reader
/// thread and posted to the inbox tagged with the peer.
#[derive(Debug)]
pub struct Connection {
    remote_addr: SocketAddr,
    outbound: Mutex<Option<Sender<Frame>>>,
    shared: Arc<Shared>,
    threads: Vec<JoinHandle<()>>,
}

impl Connection {
    pub fn open(
        peer: PeerId,
        stream: TcpStream,
        inbox: CommandInbox,
        nodelay: bool,
    ) -> Result<Self, NetworkError> {
        stream.set_nodelay(nodelay)?;
        let remote_addr = stream.peer_addr()?;
        let reader = stream.try_clone()?;
        let writer = stream.try_clone()?;

        let shared = Arc::new(Shared {
            peer,
            socket: stream,
            inbox,
            closed: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            loss_reported: AtomicBool::new(false),
            stats: ConnectionStats::default(),
        });
        let (tx, rx) = mpsc::channel();

        let send_thread = thread::Builder::new()
            .name(format!("send-{peer}"))
            .spawn({
                let shared = Arc::clone(&shared);
                move || send_loop(writer, rx, &shared)
            })?;
        let read_thread = thread::Builder::new()
            .name(format!("read-{peer}"))
            .spawn({
                let shared = Arc::clone(&shared);
                move || read_loop(reader, &shared)
            })?;

        log::debug!("{peer} connected from {remote_addr}");

        Ok(Self {
            remote_addr,
            outbound: Mutex::new(Some(tx)),
            shared,
            threads: vec![send_thread, read_thread],
        })
    }

    pub fn peer(&self) -> PeerId {
        self.shared.peer
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn state(&self) -> ConnectionState {
        if self.shared.disposed.load(Ordering::SeqCst) {
            ConnectionState::Disposed
        } else if self.shared.closed.load(Ordering::SeqCst) {
            ConnectionState::Closed
        } else {
            ConnectionState::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn stats(&self) -> NetworkStats {
        self.shared.stats.snapshot()
    }

    pub fn send(&self, command: &Command) -> Result<(), NetworkError> {
        let frame: Frame = command.encode()?.into();
        self.send_frame(frame);
        Ok(())
    }

    /// Queues an encoded frame. Frames for a closed or disposed link are
    /// dropped.
    pub fn send_frame(&self, frame: Frame) {
        if !self.is_open() {
            log::debug!("{}: dropping frame on closed connection", self.peer());
            return;
        }
        if let Some(tx) = self.outbound().as_ref()
            && tx.send(frame).is_err()
        {
            log::debug!("{}: sender thread already stopped", self.peer());
        }
    }

    /// Closes the socket and stops both threads. Safe to call repeatedly and
    /// never reports the link as lost.
    pub fn dispose(&mut self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.outbound().take();
        self.shared.closed.store(true, Ordering::SeqCst);
        let _ = self.shared.socket.shutdown(Shutdown::Both);

        let peer = self.shared.peer;
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::error!("{peer}: connection thread panicked");
            }
        }
        log::debug!("{peer} disposed");
    }

    fn outbound(&self) -> MutexGuard<'_, Option<Sender<Frame>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn send_loop(stream: TcpStream, frames: Receiver<Frame>, shared: &Shared) {
    let mut writer = BufWriter::new(stream);
    for frame in frames {
        if shared.disposed.load(Ordering::SeqCst) {
            break;
        }
        if let Err(e) = write_frame(&mut writer, &frame) {
            log::warn!("{}: send failed: {e}", shared.peer);
            shared.close();
            break;
        }
        shared.stats.record_sent(frame.len());
    }
}

fn read_loop(stream: TcpStream, shared: &Shared) {
    let mut reader = BufReader::new(stream);
    loop {
        let frame = match read_frame(&mut reader) {
            Ok(frame) => frame,
            Err(e) => {
                if !shared.disposed.load(Ordering::SeqCst) {
                    log::info!("{}: connection closed: {e}", shared.peer);
                }
                break;
            }
        };
        shared.stats.record_received(frame.len());

        match Command::decode(&frame) {
            Ok(command) => shared.inbox.post_from(shared.peer, command),
            Err(e) => {
                log::warn!("{}: undecodable frame, closing: {e}", shared.peer);
                break;
            }
        }
    }
    shared.close();
}
