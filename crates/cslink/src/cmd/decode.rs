use cslink_frame::{decode, DecodeResult, DEFAULT_MAX_PAYLOAD};

use crate::cmd::DecodeArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex.concat())?;
    if bytes.is_empty() {
        return Err(CliError::new(USAGE, "no frame bytes given"));
    }

    let mut offset = 0;
    while offset < bytes.len() {
        match decode(&bytes[offset..], DEFAULT_MAX_PAYLOAD) {
            DecodeResult::Complete(message, consumed) => {
                print_message(&message, "decode", format);
                offset += consumed;
            }
            DecodeResult::Incomplete => {
                return Err(CliError::new(
                    DATA_INVALID,
                    format!(
                        "incomplete frame at byte {offset} ({} bytes left)",
                        bytes.len() - offset
                    ),
                ));
            }
            DecodeResult::Invalid(reason) => {
                return Err(CliError::new(
                    DATA_INVALID,
                    format!("invalid frame at byte {offset}: {reason}"),
                ));
            }
            DecodeResult::Malformed { error, .. } => {
                return Err(CliError::new(
                    DATA_INVALID,
                    format!("malformed payload at byte {offset}: {error}"),
                ));
            }
        }
    }

    Ok(SUCCESS)
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let input = input.strip_prefix("0x").unwrap_or(input);
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input has an odd number of digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|text| u8::from_str_radix(text, 16).ok())
                .ok_or_else(|| {
                    CliError::new(
                        USAGE,
                        format!("invalid hex byte {:?}", String::from_utf8_lossy(pair)),
                    )
                })
        })
        .collect()
}
