//! Drives the authentication service against a simulated monitor and
//! relays every transition to the GUI shell.
//!
//! Run the `gui-shell` example first, then:
//!   cargo run --example relay-mock --features peer,ddc

use std::time::Duration;

use cslink::ddc::{
    AuthConfig, AuthService, AuthState, AuthSubscriber, EndpointId, EndpointSource, FeatureValue,
    RegisterTransport, Result as DdcResult, TransportError,
};
use cslink::frame::Message;
use cslink::peer::{Channel, ChannelConfig, ChannelState};
use cslink::relay::AuthRelay;
use cslink::transport::{endpoint_path, DEFAULT_ENDPOINT_NAME};

/// Identifies as 11:22:33:44:55:66 and grants slot 1.
struct SimulatedMonitor;

impl RegisterTransport for SimulatedMonitor {
    fn read_feature(&mut self, address: u8) -> DdcResult<FeatureValue> {
        match address {
            0xE0 => Ok(FeatureValue::new(0x0100, 0)),
            0xE1 => Ok(FeatureValue::new(0x1122, 0x3344)),
            0xE2 => Ok(FeatureValue::new(0x5566, 0)),
            0xE3 => Ok(FeatureValue::new(0x1101, 0)),
            _ => Err(TransportError::IoFailure(95)),
        }
    }

    fn write_feature(&mut self, _address: u8, _value: u32) -> DdcResult<()> {
        Ok(())
    }
}

struct Simulated;

impl EndpointSource for Simulated {
    type Transport = SimulatedMonitor;

    fn enumerate(&self) -> DdcResult<Vec<EndpointId>> {
        Ok(vec![EndpointId::from("sim-0")])
    }

    fn open(&self, _endpoint: &EndpointId) -> DdcResult<SimulatedMonitor> {
        Ok(SimulatedMonitor)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = endpoint_path(DEFAULT_ENDPOINT_NAME);
    let mut channel = Channel::spawn(
        &endpoint,
        |_: &str, _: Message| -> Option<Message> { None },
        ChannelConfig::default(),
    )?;
    if !channel.wait_for(ChannelState::Connected, Duration::from_secs(5)) {
        eprintln!("GUI shell not reachable at {}; notifications stay queued", endpoint.display());
    }

    let relay = AuthRelay::new(channel.sender(), 1);
    let service = AuthService::new(
        Simulated,
        move |endpoint: &EndpointId, state: &AuthState| {
            eprintln!("{endpoint}: {state}");
            relay.on_transition(endpoint, state);
        },
        AuthConfig::default(),
    );
    service.start()?;
    service.wait_idle(Duration::from_secs(10));

    // Let the writer drain before shutting down.
    std::thread::sleep(Duration::from_millis(200));
    channel.shutdown();
    Ok(())
}
