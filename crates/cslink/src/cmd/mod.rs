use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use cslink_transport::{endpoint_path, DEFAULT_ENDPOINT_NAME};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
#[cfg(unix)]
pub mod listen;
#[cfg(target_os = "linux")]
pub mod monitor;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bind the endpoint and print messages from every client.
    #[cfg(unix)]
    Listen(ListenArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Decode hex-encoded frames and print them.
    Decode(DecodeArgs),
    /// Authenticate connected monitors and relay their lifecycle.
    #[cfg(target_os = "linux")]
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        #[cfg(unix)]
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        #[cfg(target_os = "linux")]
        Command::Monitor(args) => monitor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Clone)]
pub struct EndpointArg {
    /// Endpoint name or socket path.
    #[arg(
        long,
        short = 'e',
        env = "CSLINK_ENDPOINT",
        default_value = DEFAULT_ENDPOINT_NAME
    )]
    pub endpoint: String,
}

impl EndpointArg {
    pub fn path(&self) -> PathBuf {
        endpoint_path(&self.endpoint)
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub endpoint: EndpointArg,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Status returned to connection status requests.
    #[arg(long, default_value_t = 1)]
    pub status: u8,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub endpoint: EndpointArg,
    /// Wait for one reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    #[command(subcommand)]
    pub message: MessageArgs,
}

#[derive(Subcommand, Debug)]
pub enum MessageArgs {
    /// Connection status request.
    ConnStatus,
    /// Client status notification.
    ClientStatus {
        #[arg(long)]
        client_id: String,
        #[arg(long, default_value_t = 1)]
        status: u8,
        /// Client address as IP:PORT.
        #[arg(long)]
        addr: SocketAddrV4,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// System information notification.
    SystemInfo {
        #[arg(long)]
        addr: SocketAddrV4,
        /// Client software version.
        #[arg(long = "system-version")]
        version: String,
    },
    /// Generic notification with text parameters.
    Notify {
        #[arg(long)]
        code: u8,
        /// Unix seconds. Default: now.
        #[arg(long)]
        timestamp: Option<u64>,
        params: Vec<String>,
    },
    /// File transfer progress notification.
    Progress {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        addr: SocketAddrV4,
        #[arg(long)]
        size: u64,
        #[arg(long)]
        sent: u64,
        #[arg(long)]
        path: String,
        /// Unix seconds. Default: now.
        #[arg(long)]
        timestamp: Option<u64>,
    },
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes in hex. Whitespace and ':' separators are ignored.
    #[arg(required = true, num_args = 1..)]
    pub hex: Vec<String>,
}

#[cfg(target_os = "linux")]
#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub endpoint: EndpointArg,
    /// How long discovery polls a monitor before giving up.
    #[arg(long, default_value = "90s")]
    pub discovery_deadline: String,
    /// Delay between identity reads during discovery.
    #[arg(long, default_value = "500ms")]
    pub poll_interval: String,
    /// Client slot requested during authorization.
    #[arg(long, default_value_t = 1)]
    pub auth_index: u8,
    /// How often connected monitors are re-enumerated.
    #[arg(long, default_value = "2s")]
    pub rescan: String,
    /// Pause between channel reconnect attempts.
    #[arg(long, default_value = "1s")]
    pub reconnect: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn install_ctrlc_handler(running: std::sync::Arc<std::sync::atomic::AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, std::sync::atomic::Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
