use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use cslink_frame::FrameConfig;
use cslink_transport::UnixDomainSocket;
use tracing::{debug, info, warn};

use crate::connection::{Connection, Dispatcher};
use crate::error::{ChannelError, Result};

/// Listens for and accepts client connections.
pub struct ChannelListener {
    socket: UnixDomainSocket,
    frame_config: FrameConfig,
    next_conn_id: AtomicU64,
}

impl ChannelListener {
    /// Bind to a Unix domain socket path.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_socket(UnixDomainSocket::bind(path)?))
    }

    /// Bind to a named endpoint (see [`cslink_transport::endpoint_path`]).
    pub fn bind_endpoint(name: &str) -> Result<Self> {
        Ok(Self::from_socket(UnixDomainSocket::bind_endpoint(name)?))
    }

    fn from_socket(socket: UnixDomainSocket) -> Self {
        Self {
            socket,
            frame_config: FrameConfig::default(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Override frame limits and timeouts for accepted connections.
    pub fn with_frame_config(mut self, config: FrameConfig) -> Self {
        self.frame_config = config;
        self
    }

    /// Accept next connection and assign an auto-generated id.
    pub fn accept(&self) -> Result<Connection> {
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.accept_with_id(&format!("conn-{id}"))
    }

    /// Accept next connection and use an explicit id.
    pub fn accept_with_id(&self, id: &str) -> Result<Connection> {
        let stream = self.socket.accept()?;
        debug!(connection = id, "accepted connection");
        Connection::from_stream(id.to_string(), stream, &self.frame_config)
    }

    /// Accept connections forever, serving each on its own thread.
    ///
    /// Returns only when accepting fails.
    pub fn serve(&self, dispatcher: Arc<dyn Dispatcher>) -> Result<()> {
        info!(path = ?self.path(), "serving connections");
        loop {
            let conn = self.accept()?;
            let dispatcher = Arc::clone(&dispatcher);
            let name = format!("cslink-{}", conn.id());
            thread::Builder::new()
                .name(name)
                .spawn(move || {
                    let id = conn.id().to_string();
                    match conn.serve(dispatcher.as_ref()) {
                        Ok(()) => info!(connection = %id, "connection closed"),
                        Err(err) => warn!(connection = %id, error = %err, "connection dropped"),
                    }
                })
                .map_err(|source| ChannelError::Spawn {
                    what: "connection",
                    source,
                })?;
        }
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.socket.path()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use cslink_frame::{GetConnStatusRequest, GetConnStatusResponse, Message};

    use super::*;
    use crate::connector::connect;
    use crate::test_support::make_sock_path;

    #[test]
    fn accept_assigns_sequential_ids() {
        let sock_path = make_sock_path("accept");
        let listener = ChannelListener::bind(&sock_path).expect("listener should bind");

        let server = thread::spawn(move || {
            let first = listener.accept().expect("first accept should succeed");
            let second = listener.accept().expect("second accept should succeed");
            assert_eq!(first.id(), "conn-1");
            assert_eq!(second.id(), "conn-2");
        });

        let _c1 = connect(&sock_path).expect("first client should connect");
        let _c2 = connect(&sock_path).expect("second client should connect");
        server.join().expect("server thread should finish");

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn serve_handles_concurrent_clients() {
        let sock_path = make_sock_path("serve");
        let listener = ChannelListener::bind(&sock_path).expect("listener should bind");
        let (seen_tx, seen_rx) = mpsc::channel::<String>();
        let seen_tx = std::sync::Mutex::new(seen_tx);

        let dispatcher: Arc<dyn Dispatcher> = Arc::new(move |id: &str, message: Message| {
            let _ = seen_tx.lock().expect("lock").send(id.to_string());
            match message {
                Message::GetConnStatusRequest(_) => {
                    Some(Message::from(GetConnStatusResponse { status: 1 }))
                }
                _ => None,
            }
        });
        thread::spawn(move || {
            let _ = listener.serve(dispatcher);
        });

        let mut first = connect(&sock_path).expect("first client should connect");
        let mut second = connect(&sock_path).expect("second client should connect");
        for client in [&mut second, &mut first] {
            let reply = client
                .request(&GetConnStatusRequest.into())
                .expect("client should get a reply");
            assert_eq!(reply, Message::from(GetConnStatusResponse { status: 1 }));
        }

        let mut ids: Vec<String> = (0..2)
            .map(|_| {
                seen_rx
                    .recv_timeout(Duration::from_secs(2))
                    .expect("dispatch should be observed")
            })
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["conn-1".to_string(), "conn-2".to_string()]);

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }
}
