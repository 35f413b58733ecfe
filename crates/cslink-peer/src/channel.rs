//! Client side of the link: a channel that keeps itself connected.
//!
//! [`Channel::spawn`] starts two threads. The connection thread dials the
//! endpoint, dispatches inbound messages and redials after any failure. The
//! writer thread drains the outbound queue onto whatever connection is
//! current. Messages queued while disconnected wait for the next connection
//! and go out in the order they were queued.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cslink_frame::{encode, FrameConfig, FrameError, Message, MessageWriter, HEADER_SIZE};
use cslink_transport::IpcStream;
use tracing::{debug, info, trace, warn};

use crate::connection::{dial, pump, Connection, Dispatcher};
use crate::error::{ChannelError, Result};

/// Channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Pause between a failed or dropped connection and the next attempt.
    pub reconnect_interval: Duration,
    /// How often blocked threads wake to check for shutdown.
    pub read_poll: Duration,
    /// Frame limits. `read_timeout` is replaced by `read_poll`.
    pub frame: FrameConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(1),
            read_poll: Duration::from_millis(100),
            frame: FrameConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// Shut down; no further connection attempts.
    Closed,
}

impl ChannelState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}

struct Shared {
    endpoint: PathBuf,
    config: ChannelConfig,
    state: Mutex<ChannelState>,
    changed: Condvar,
    writer: Mutex<Option<MessageWriter<IpcStream>>>,
    stop: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn state(&self) -> ChannelState {
        *lock(&self.state)
    }

    fn set_state(&self, next: ChannelState) {
        let mut state = lock(&self.state);
        if *state != next {
            debug!(endpoint = ?self.endpoint, from = state.name(), to = next.name(), "channel state");
            *state = next;
            self.changed.notify_all();
        }
    }

    fn wait_for(&self, wanted: ChannelState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.state);
        while *state != wanted {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Sleep up to `timeout`, waking early on shutdown.
    fn pause(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.state);
        while !self.stopping() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return;
            }
            state = self
                .changed
                .wait_timeout(state, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Drop the current writer and close its stream so the reader sees EOF.
    fn drop_writer(&self) {
        if let Some(writer) = lock(&self.writer).take() {
            let _ = writer.get_ref().shutdown();
        }
    }

    fn connect(&self) -> Result<Connection> {
        let stream = dial(&self.endpoint)?;
        let frame = FrameConfig {
            read_timeout: Some(self.config.read_poll),
            ..self.config.frame.clone()
        };
        Connection::from_stream(self.endpoint.display().to_string(), stream, &frame)
    }
}

/// Entry point for reconnecting channels.
pub struct Channel;

impl Channel {
    /// Start a channel to `endpoint` that dispatches inbound messages to
    /// `dispatcher`. Replies are queued like any other outbound message.
    pub fn spawn<D: Dispatcher>(
        endpoint: impl Into<PathBuf>,
        dispatcher: D,
        config: ChannelConfig,
    ) -> Result<ChannelHandle> {
        let shared = Arc::new(Shared {
            endpoint: endpoint.into(),
            config,
            state: Mutex::new(ChannelState::Disconnected),
            changed: Condvar::new(),
            writer: Mutex::new(None),
            stop: AtomicBool::new(false),
        });
        let (outbound, queue) = mpsc::channel();

        let writer = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("cslink-channel-writer".into())
                .spawn(move || write_loop(&shared, &queue))
                .map_err(|source| ChannelError::Spawn {
                    what: "writer",
                    source,
                })?
        };

        let connection = {
            let shared = Arc::clone(&shared);
            let replies = outbound.clone();
            thread::Builder::new()
                .name("cslink-channel".into())
                .spawn(move || connection_loop(&shared, &dispatcher, &replies))
        };
        let connection = match connection {
            Ok(handle) => handle,
            Err(source) => {
                shared.stop.store(true, Ordering::Release);
                let _ = writer.join();
                return Err(ChannelError::Spawn {
                    what: "connection",
                    source,
                });
            }
        };

        Ok(ChannelHandle {
            sender: ChannelSender { outbound, shared },
            threads: vec![connection, writer],
        })
    }
}

fn connection_loop(shared: &Shared, dispatcher: &dyn Dispatcher, replies: &Sender<Message>) {
    while !shared.stopping() {
        shared.set_state(ChannelState::Connecting);
        match shared.connect() {
            Ok(conn) => {
                let (id, mut reader, writer) = conn.into_parts();
                *lock(&shared.writer) = Some(writer);
                shared.set_state(ChannelState::Connected);
                info!(endpoint = %id, "channel connected");

                let result = pump(&mut reader, &id, &shared.stop, |message| {
                    trace!(endpoint = %id, code = ?message.code(), "dispatching");
                    if let Some(reply) = dispatcher.dispatch(&id, message) {
                        // The receiver lives as long as the writer thread.
                        let _ = replies.send(reply);
                    }
                    Ok(())
                });

                shared.drop_writer();
                shared.set_state(ChannelState::Disconnected);
                match result {
                    Ok(()) => info!(endpoint = %id, "channel disconnected"),
                    Err(err) => warn!(endpoint = %id, error = %err, "channel dropped"),
                }
            }
            Err(err) => {
                shared.set_state(ChannelState::Disconnected);
                debug!(endpoint = ?shared.endpoint, error = %err, "connect failed");
            }
        }
        shared.pause(shared.config.reconnect_interval);
    }
    shared.drop_writer();
}

fn write_loop(shared: &Shared, queue: &Receiver<Message>) {
    let mut pending: Option<Message> = None;
    loop {
        if pending.is_none() {
            match queue.recv_timeout(shared.config.read_poll) {
                Ok(message) => pending = Some(message),
                Err(RecvTimeoutError::Timeout) if shared.stopping() => break,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        let Some(message) = pending.as_ref() else {
            continue;
        };

        let mut slot = lock(&shared.writer);
        let Some(writer) = slot.as_mut() else {
            drop(slot);
            if shared.stopping() {
                break;
            }
            shared.wait_for(ChannelState::Connected, shared.config.read_poll);
            continue;
        };
        match writer.write_message(message) {
            Ok(()) => {
                trace!(code = ?message.code(), "sent");
                pending = None;
            }
            Err(err) if is_stream_failure(&err) => {
                // Keep the message for the next connection.
                warn!(error = %err, "write failed, dropping connection");
                if let Some(writer) = slot.take() {
                    let _ = writer.get_ref().shutdown();
                }
            }
            Err(err) => {
                warn!(code = ?message.code(), error = %err, "dropping unsendable message");
                pending = None;
            }
        }
    }

    let unsent = usize::from(pending.is_some()) + queue.try_iter().count();
    if unsent > 0 {
        debug!(unsent, "channel closed with messages still queued");
    }
}

/// True when the stream itself failed and the message may go out on the next
/// connection. Anything else fails the same way on every connection.
fn is_stream_failure(err: &FrameError) -> bool {
    matches!(err, FrameError::Io(_) | FrameError::ConnectionClosed)
}

/// Cloneable sending half of a channel.
#[derive(Clone)]
pub struct ChannelSender {
    outbound: Sender<Message>,
    shared: Arc<Shared>,
}

impl ChannelSender {
    /// Queue a message. It is written once a connection is available.
    ///
    /// A message whose payload exceeds the channel's frame limit is rejected
    /// here with `FrameError::PayloadTooLarge` and never queued.
    pub fn send(&self, message: impl Into<Message>) -> Result<()> {
        if self.shared.stopping() {
            return Err(ChannelError::Closed);
        }
        let message = message.into();
        let size = encode(&message)?.len() - HEADER_SIZE;
        let max = self.shared.config.frame.max_payload_size;
        if size > max {
            return Err(FrameError::PayloadTooLarge { size, max }.into());
        }
        self.outbound.send(message).map_err(|_| ChannelError::Closed)
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    pub fn endpoint(&self) -> &Path {
        &self.shared.endpoint
    }
}

impl std::fmt::Debug for ChannelSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSender")
            .field("endpoint", &self.shared.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

/// Owner of a running channel. Dropping it shuts the channel down.
pub struct ChannelHandle {
    sender: ChannelSender,
    threads: Vec<JoinHandle<()>>,
}

impl ChannelHandle {
    pub fn send(&self, message: impl Into<Message>) -> Result<()> {
        self.sender.send(message)
    }

    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    pub fn state(&self) -> ChannelState {
        self.sender.state()
    }

    /// Block until the channel reaches `state` or `timeout` passes.
    pub fn wait_for(&self, state: ChannelState, timeout: Duration) -> bool {
        self.sender.shared.wait_for(state, timeout)
    }

    /// Stop both threads and close the connection. Idempotent.
    pub fn shutdown(&mut self) {
        let shared = &self.sender.shared;
        if !shared.stop.swap(true, Ordering::AcqRel) {
            info!(endpoint = ?shared.endpoint, "channel shutting down");
        }
        shared.drop_writer();
        {
            let _state = lock(&shared.state);
            shared.changed.notify_all();
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("channel thread panicked");
            }
        }
        shared.set_state(ChannelState::Closed);
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};

    use cslink_frame::{
        GetConnStatusRequest, GetConnStatusResponse, Notify, UpdateSystemInfo,
    };

    use super::*;
    use crate::listener::ChannelListener;
    use crate::test_support::make_sock_path;

    fn fast() -> ChannelConfig {
        ChannelConfig {
            reconnect_interval: Duration::from_millis(30),
            read_poll: Duration::from_millis(20),
            frame: FrameConfig::default(),
        }
    }

    fn info(n: u8) -> Message {
        UpdateSystemInfo {
            addr: SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, n), 0),
            version: format!("1.0.{n}"),
        }
        .into()
    }

    fn ignore(_: &str, _: Message) -> Option<Message> {
        None
    }

    fn cleanup(path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn default_config() {
        let config = ChannelConfig::default();
        assert_eq!(config.reconnect_interval, Duration::from_secs(1));
        assert!(config.frame.read_timeout.is_none());
    }

    #[test]
    fn queued_messages_delivered_in_order_after_listener_appears() {
        let sock_path = make_sock_path("late-listener");
        let mut channel = Channel::spawn(&sock_path, ignore, fast()).expect("channel should spawn");

        for n in 1..=3 {
            channel.send(info(n)).expect("send should queue");
        }
        assert_ne!(channel.state(), ChannelState::Connected);

        let listener = ChannelListener::bind(&sock_path).expect("listener should bind");
        let mut conn = listener.accept().expect("listener should accept");
        for n in 1..=3 {
            assert_eq!(conn.recv().expect("message should arrive"), info(n));
        }
        assert!(channel.wait_for(ChannelState::Connected, Duration::from_secs(2)));

        channel.shutdown();
        assert_eq!(channel.state(), ChannelState::Closed);
        cleanup(&sock_path);
    }

    #[test]
    fn reconnects_after_peer_drops() {
        let sock_path = make_sock_path("reconnect");
        let listener = ChannelListener::bind(&sock_path).expect("listener should bind");
        let channel = Channel::spawn(&sock_path, ignore, fast()).expect("channel should spawn");

        let first = listener.accept().expect("first accept should succeed");
        first.shutdown().expect("shutdown should succeed");
        drop(first);

        let mut second = listener.accept().expect("channel should reconnect");
        assert_eq!(second.id(), "conn-2");
        channel.send(info(7)).expect("send should queue");
        assert_eq!(second.recv().expect("message should arrive"), info(7));

        drop(channel);
        cleanup(&sock_path);
    }

    #[test]
    fn inbound_messages_are_dispatched_and_replies_sent() {
        let sock_path = make_sock_path("dispatch");
        let listener = ChannelListener::bind(&sock_path).expect("listener should bind");
        let (seen_tx, seen_rx) = mpsc::channel::<Message>();
        let seen_tx = Mutex::new(seen_tx);

        let dispatcher = move |_: &str, message: Message| {
            let reply = match &message {
                Message::GetConnStatusRequest(_) => {
                    Some(Message::from(GetConnStatusResponse { status: 1 }))
                }
                _ => None,
            };
            let _ = lock(&seen_tx).send(message);
            reply
        };
        let _channel = Channel::spawn(&sock_path, dispatcher, fast()).expect("channel should spawn");

        let mut conn = listener.accept().expect("listener should accept");
        let notify = Notify {
            timestamp: 1_700_000_000,
            code: 3,
            params: vec!["HDMI-1".into()],
        };
        conn.send(&notify.clone().into()).expect("notify should send");
        let reply = conn
            .request(&GetConnStatusRequest.into())
            .expect("channel should reply");
        assert_eq!(reply, Message::from(GetConnStatusResponse { status: 1 }));

        let first = seen_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("notify should be dispatched");
        assert_eq!(first, Message::from(notify));
        cleanup(&sock_path);
    }

    #[test]
    fn garbage_from_peer_tears_down_and_reconnects() {
        let sock_path = make_sock_path("garbage");
        let listener = ChannelListener::bind(&sock_path).expect("listener should bind");
        let channel = Channel::spawn(&sock_path, ignore, fast()).expect("channel should spawn");

        let first = listener.accept().expect("first accept should succeed");
        let (_, _, mut raw) = first.into_parts();
        std::io::Write::write_all(raw.get_mut(), b"XXXXXXXXXXXX").expect("raw write should succeed");

        let mut second = listener.accept().expect("channel should reconnect");
        channel.send(info(9)).expect("send should queue");
        assert_eq!(second.recv().expect("message should arrive"), info(9));

        drop(channel);
        cleanup(&sock_path);
    }

    #[test]
    fn oversized_message_is_rejected_and_later_messages_flow() {
        let sock_path = make_sock_path("oversized");
        let listener = ChannelListener::bind(&sock_path).expect("listener should bind");
        let config = ChannelConfig {
            frame: FrameConfig {
                max_payload_size: 64,
                ..FrameConfig::default()
            },
            ..fast()
        };
        let channel = Channel::spawn(&sock_path, ignore, config).expect("channel should spawn");

        let oversized = UpdateSystemInfo {
            addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1),
            version: "v".repeat(100),
        };
        assert!(matches!(
            channel.send(oversized),
            Err(ChannelError::Frame(FrameError::PayloadTooLarge { size: 206, max: 64 }))
        ));
        channel.send(info(4)).expect("small message should queue");

        let mut conn = listener.accept().expect("listener should accept");
        assert_eq!(conn.id(), "conn-1");
        assert_eq!(conn.recv().expect("small message should arrive"), info(4));
        assert_eq!(channel.state(), ChannelState::Connected);

        drop(channel);
        cleanup(&sock_path);
    }

    #[test]
    fn only_stream_failures_keep_the_message() {
        assert!(is_stream_failure(&FrameError::ConnectionClosed));
        assert!(is_stream_failure(&FrameError::Io(std::io::ErrorKind::BrokenPipe.into())));
        assert!(!is_stream_failure(&FrameError::PayloadTooLarge { size: 9, max: 4 }));
    }

    #[test]
    fn send_after_shutdown_is_rejected() {
        let sock_path = make_sock_path("closed");
        let mut channel = Channel::spawn(&sock_path, ignore, fast()).expect("channel should spawn");
        let sender = channel.sender();
        channel.shutdown();
        channel.shutdown();

        assert_eq!(sender.state(), ChannelState::Closed);
        assert!(matches!(sender.send(info(1)), Err(ChannelError::Closed)));
        cleanup(&sock_path);
    }
}
