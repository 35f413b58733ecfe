//! Minimal GUI-shell stand-in: accepts clients on the well-known endpoint
//! and prints every message, answering connection status requests.
//!
//! Run with:
//!   cargo run --example gui-shell --features peer
//!
//! In another terminal:
//!   cargo run --features cli -- send --wait conn-status

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    shell::run()
}

#[cfg(not(unix))]
fn main() {
    eprintln!("gui-shell requires Unix domain sockets");
}

#[cfg(unix)]
mod shell {
    use std::sync::Arc;

    use cslink::frame::{GetConnStatusResponse, Message};
    use cslink::peer::{ChannelListener, Dispatcher};
    use cslink::transport::DEFAULT_ENDPOINT_NAME;

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let listener = ChannelListener::bind_endpoint(DEFAULT_ENDPOINT_NAME)?;
        eprintln!("Listening on {}", listener.path().display());

        let dispatcher: Arc<dyn Dispatcher> = Arc::new(|from: &str, message: Message| {
            eprintln!("{from}: {message:?}");
            match message {
                Message::GetConnStatusRequest(_) => {
                    Some(Message::from(GetConnStatusResponse { status: 1 }))
                }
                _ => None,
            }
        });

        listener.serve(dispatcher)?;
        Ok(())
    }
}
