use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use cslink::relay::AuthRelay;
use cslink_ddc::{
    AuthConfig, AuthService, AuthState, AuthSubscriber, DrmEndpointSource, EndpointId,
    EndpointSource, HotplugEvent, TransportError,
};
use cslink_frame::{GetConnStatusResponse, Message};
use cslink_peer::{Channel, ChannelConfig};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, MonitorArgs};
use crate::exit::{channel_error, io_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_transition, OutputFormat};

const TICK: Duration = Duration::from_millis(100);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let config = AuthConfig {
        discovery_deadline: parse_duration(&args.discovery_deadline)?,
        poll_interval: parse_duration(&args.poll_interval)?,
        auth_index: args.auth_index,
        ..AuthConfig::default()
    };
    let rescan = parse_duration(&args.rescan)?;
    let channel_config = ChannelConfig {
        reconnect_interval: parse_duration(&args.reconnect)?,
        ..ChannelConfig::default()
    };

    let mut channel = Channel::spawn(args.endpoint.path(), answer, channel_config)
        .map_err(|err| channel_error("channel setup failed", err))?;
    let relay = AuthRelay::new(channel.sender(), config.auth_index);
    let subscriber = move |endpoint: &EndpointId, state: &AuthState| {
        print_transition(endpoint, state, format);
        relay.on_transition(endpoint, state);
    };

    let source = DrmEndpointSource::default();
    let scanner = source.clone();
    let service = AuthService::new(source, subscriber, config);
    let started = service
        .start()
        .map_err(|err| ddc_error("monitor enumeration failed", err))?;
    info!(started, "monitor discovery started");

    let (events, feed) = mpsc::channel();
    let watcher = service
        .watch(feed)
        .map_err(|err| io_error("failed to start hot-plug watcher", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut known = snapshot(&scanner);
    let mut next_scan = Instant::now() + rescan;
    while running.load(Ordering::SeqCst) {
        thread::sleep(TICK);
        if Instant::now() < next_scan {
            continue;
        }
        next_scan = Instant::now() + rescan;

        let current = snapshot(&scanner);
        for event in changes(&known, &current) {
            // The watcher lives until `events` is dropped below.
            let _ = events.send(event);
        }
        known = current;
    }

    info!("monitor shutting down");
    drop(events);
    for (endpoint, _) in service.endpoints() {
        service.stop_polling(&endpoint);
    }
    if !service.wait_idle(DRAIN_TIMEOUT) {
        warn!("authentication tasks still running at exit");
    }
    if watcher.join().is_err() {
        warn!("hot-plug watcher panicked");
    }
    channel.shutdown();

    Ok(SUCCESS)
}

fn answer(from: &str, message: Message) -> Option<Message> {
    match message {
        Message::GetConnStatusRequest(_) => Some(GetConnStatusResponse { status: 1 }.into()),
        other => {
            debug!(from, code = ?other.code(), "ignoring inbound message");
            None
        }
    }
}

fn snapshot(source: &DrmEndpointSource) -> BTreeSet<EndpointId> {
    match source.enumerate() {
        Ok(endpoints) => endpoints.into_iter().collect(),
        Err(err) => {
            debug!(error = %err, "monitor enumeration failed");
            BTreeSet::new()
        }
    }
}

/// Hot-plug events implied by the difference between two scans.
///
/// One event of each kind is enough: the service re-examines every endpoint.
fn changes(before: &BTreeSet<EndpointId>, after: &BTreeSet<EndpointId>) -> Vec<HotplugEvent> {
    let mut events = Vec::new();
    if let Some(added) = after.difference(before).next() {
        events.push(HotplugEvent::arrival(format!("display:{added}")));
    }
    if let Some(removed) = before.difference(after).next() {
        events.push(HotplugEvent::removal(format!("display:{removed}")));
    }
    events
}

fn ddc_error(context: &str, err: TransportError) -> CliError {
    CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
}
