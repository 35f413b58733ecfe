use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use cslink_frame::{GetConnStatusResponse, Message};
use cslink_peer::{ChannelListener, Dispatcher};
use tracing::{error, info};

use crate::cmd::{install_ctrlc_handler, ListenArgs};
use crate::exit::{channel_error, io_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_message, OutputFormat};

const TICK: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let path = args.endpoint.path();
    let listener = ChannelListener::bind(&path).map_err(|err| channel_error("bind failed", err))?;
    info!(path = %path.display(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::channel::<(String, Message)>();
    let tx = Mutex::new(tx);
    let status = args.status;
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(move |from: &str, message: Message| {
        let reply = reply_for(&message, status);
        let _ = tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send((from.to_string(), message));
        reply
    });

    thread::Builder::new()
        .name("cslink-listen".into())
        .spawn(move || {
            if let Err(err) = listener.serve(dispatcher) {
                error!(error = %err, "listener stopped");
            }
        })
        .map_err(|err| io_error("failed to start listener", err))?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let (from, message) = match rx.recv_timeout(TICK) {
            Ok(received) => received,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::new(TRANSPORT_ERROR, "listener stopped"));
            }
        };

        print_message(&message, &from, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

/// Answer what the GUI shell would answer; everything else is only printed.
fn reply_for(message: &Message, status: u8) -> Option<Message> {
    match message {
        Message::GetConnStatusRequest(_) => Some(GetConnStatusResponse { status }.into()),
        _ => None,
    }
}
