use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use cslink_ddc::{AuthState, EndpointId, MacAddress};
use cslink_frame::{DeviceAuthNotify, Message};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'a str,
    frame_type: String,
    code: u8,
    code_name: &'a str,
    from: &'a str,
    fields: Value,
    timestamp: String,
}

pub fn print_message(message: &Message, from: &str, format: OutputFormat) {
    let fields = message_fields(message);
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind: kind(message),
                frame_type: format!("{:?}", message.frame_type()),
                code: message.code() as u8,
                code_name: message.code().name(),
                from,
                fields,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MESSAGE", "FROM", "FIELD", "VALUE"]);
            let Value::Object(map) = fields else {
                return;
            };
            if map.is_empty() {
                table.add_row(vec![kind(message), from, "", ""]);
            }
            for (i, (field, value)) in map.iter().enumerate() {
                let (name, peer) = if i == 0 { (kind(message), from) } else { ("", "") };
                table.add_row(vec![
                    name.to_string(),
                    peer.to_string(),
                    field.clone(),
                    plain(value),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let rendered: Vec<String> = match &fields {
                Value::Object(map) => map
                    .iter()
                    .map(|(field, value)| format!("{field}={}", plain(value)))
                    .collect(),
                _ => Vec::new(),
            };
            println!("{} from={} {}", kind(message), from, rendered.join(" "));
        }
    }
}

#[derive(Serialize)]
struct TransitionOutput<'a> {
    endpoint: &'a str,
    state: &'a str,
    mac: Option<String>,
    authorization: Option<u8>,
    timestamp: String,
}

pub fn print_transition(endpoint: &EndpointId, state: &AuthState, format: OutputFormat) {
    let identity = state.identity();
    match format {
        OutputFormat::Json => {
            let out = TransitionOutput {
                endpoint: endpoint.as_str(),
                state: state.name(),
                mac: identity.map(|id| id.mac.to_string()),
                authorization: identity.and_then(|id| id.authorization),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ENDPOINT", "STATE", "MAC"])
                .add_row(vec![
                    endpoint.to_string(),
                    state.name().to_string(),
                    identity.map(|id| id.mac.to_string()).unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{endpoint}: {state}"),
    }
}

pub fn kind(message: &Message) -> &'static str {
    match message {
        Message::GetConnStatusRequest(_) => "get-conn-status-request",
        Message::GetConnStatusResponse(_) => "get-conn-status-response",
        Message::ClientStatus(_) => "client-status",
        Message::SendFileRequest(_) => "send-file-request",
        Message::SendFileResponse(_) => "send-file-response",
        Message::UpdateProgress(_) => "update-progress",
        Message::UpdateSystemInfo(_) => "update-system-info",
        Message::Notify(_) => "notify",
        Message::DeviceAuthNotify(_) => "device-auth-notify",
    }
}

/// Message fields as a JSON object.
pub fn message_fields(message: &Message) -> Value {
    match message {
        Message::GetConnStatusRequest(_) => Value::Object(Map::new()),
        Message::GetConnStatusResponse(m) => json!({ "status": m.status }),
        Message::ClientStatus(m) => json!({
            "client_id": m.client_id.to_string(),
            "status": m.status,
            "addr": m.addr.to_string(),
            "name": m.name,
        }),
        Message::SendFileRequest(m) => json!({
            "addr": m.addr.to_string(),
            "client_id": m.client_id.to_string(),
            "size": m.size,
            "timestamp": m.timestamp,
            "path": m.path,
        }),
        Message::SendFileResponse(m) => json!({
            "status": m.status,
            "accepted": m.accepted(),
            "addr": m.addr.to_string(),
            "client_id": m.client_id.to_string(),
            "size": m.size,
            "timestamp": m.timestamp,
            "path": m.path,
        }),
        Message::UpdateProgress(m) => json!({
            "addr": m.addr.to_string(),
            "client_id": m.client_id.to_string(),
            "size": m.size,
            "sent": m.sent,
            "percent": m.percent(),
            "timestamp": m.timestamp,
            "path": m.path,
        }),
        Message::UpdateSystemInfo(m) => json!({
            "addr": m.addr.to_string(),
            "version": m.version,
        }),
        Message::Notify(m) => json!({
            "timestamp": m.timestamp,
            "code": m.code,
            "params": m.params,
        }),
        Message::DeviceAuthNotify(m) => device_fields(m),
    }
}

fn device_fields(notify: &DeviceAuthNotify) -> Value {
    match notify {
        DeviceAuthNotify::MacAddress(mac) => json!({
            "function": "mac-address",
            "mac": MacAddress(*mac).to_string(),
        }),
        DeviceAuthNotify::AuthRequest(index) => {
            json!({ "function": "auth-request", "index": index })
        }
        DeviceAuthNotify::AuthResult(result) => {
            json!({ "function": "auth-result", "result": result })
        }
        DeviceAuthNotify::SourcePortRequest => json!({ "function": "source-port-request" }),
        DeviceAuthNotify::SourcePortResult { source, port } => {
            json!({ "function": "source-port-result", "source": source, "port": port })
        }
        DeviceAuthNotify::ExtractDevice => json!({ "function": "extract-device" }),
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
