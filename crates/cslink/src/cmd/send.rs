use std::time::{SystemTime, UNIX_EPOCH};

use cslink_frame::{
    ClientId, ClientStatus, FrameConfig, GetConnStatusRequest, Message, Notify, UpdateProgress,
    UpdateSystemInfo,
};
use cslink_peer::connect_with_config;

use crate::cmd::{parse_duration, MessageArgs, SendArgs};
use crate::exit::{channel_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let message = build_message(&args.message)?;

    let config = FrameConfig {
        read_timeout: Some(wait_timeout),
        write_timeout: Some(wait_timeout),
        ..FrameConfig::default()
    };
    let mut conn = connect_with_config(args.endpoint.path(), &config)
        .map_err(|err| channel_error("connect failed", err))?;

    conn.send(&message)
        .map_err(|err| channel_error("send failed", err))?;

    if args.wait {
        let reply = conn
            .recv()
            .map_err(|err| channel_error("receive failed", err))?;
        print_message(&reply, conn.id(), format);
    }

    Ok(SUCCESS)
}

fn build_message(args: &MessageArgs) -> CliResult<Message> {
    let message: Message = match args {
        MessageArgs::ConnStatus => GetConnStatusRequest.into(),
        MessageArgs::ClientStatus {
            client_id,
            status,
            addr,
            name,
        } => ClientStatus {
            client_id: client_id_arg(client_id)?,
            status: *status,
            addr: *addr,
            name: name.clone(),
        }
        .into(),
        MessageArgs::SystemInfo { addr, version } => UpdateSystemInfo {
            addr: *addr,
            version: version.clone(),
        }
        .into(),
        MessageArgs::Notify {
            code,
            timestamp,
            params,
        } => Notify {
            timestamp: timestamp.unwrap_or_else(now_unix_seconds),
            code: *code,
            params: params.clone(),
        }
        .into(),
        MessageArgs::Progress {
            client_id,
            addr,
            size,
            sent,
            path,
            timestamp,
        } => UpdateProgress {
            addr: *addr,
            client_id: client_id_arg(client_id)?,
            size: *size,
            sent: *sent,
            timestamp: timestamp.unwrap_or_else(now_unix_seconds),
            path: path.clone(),
        }
        .into(),
    };
    Ok(message)
}

fn client_id_arg(value: &str) -> CliResult<ClientId> {
    ClientId::try_from(value).map_err(|err| CliError::new(USAGE, format!("--client-id: {err}")))
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
