//! DDC/CI over Linux `i2c-dev`.
//!
//! The monitor answers at I2C address `0x37`. A request is
//! `[source 0x51, 0x80 | len, payload.., checksum]` where the checksum XORs
//! the destination byte `0x6E` with every byte written. Replies come from
//! `0x6F` and are checked against the virtual host address `0x50`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::register::{FeatureValue, RegisterTransport};

/// `ioctl` request binding an i2c-dev handle to a slave address.
const I2C_SLAVE: u64 = 0x0703;
/// 7-bit DDC/CI slave address.
pub const DDC_ADDRESS: u8 = 0x37;

const HOST_ADDRESS: u8 = 0x51;
const DEST_ADDRESS: u8 = 0x6E;
const REPLY_SOURCE: u8 = 0x6F;
const REPLY_CHECK_SEED: u8 = 0x50;

const GET_VCP: u8 = 0x01;
const GET_VCP_REPLY: u8 = 0x02;
const SET_VCP: u8 = 0x03;

/// Length of a Get VCP Feature reply, checksum included.
pub const GET_REPLY_LEN: usize = 11;

/// Timing for the DDC/CI exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cConfig {
    /// Wait between a request and reading its reply, and after a write.
    pub reply_delay: Duration,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            reply_delay: Duration::from_millis(40),
        }
    }
}

fn checksum(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |acc, b| acc ^ b)
}

fn protocol_error() -> TransportError {
    TransportError::IoFailure(libc::EBADMSG)
}

/// Build a Get VCP Feature request for `code`.
pub fn get_vcp_request(code: u8) -> [u8; 5] {
    let mut packet = [HOST_ADDRESS, 0x82, GET_VCP, code, 0];
    packet[4] = checksum(DEST_ADDRESS, &packet[..4]);
    packet
}

/// Build a Set VCP Feature request. Only the low 16 bits of `value` are sent.
pub fn set_vcp_request(code: u8, value: u32) -> [u8; 7] {
    let [hi, lo] = (value as u16).to_be_bytes();
    let mut packet = [HOST_ADDRESS, 0x84, SET_VCP, code, hi, lo, 0];
    packet[6] = checksum(DEST_ADDRESS, &packet[..6]);
    packet
}

/// Validate a Get VCP Feature reply and extract its fields.
pub fn parse_vcp_reply(reply: &[u8], code: u8) -> Result<FeatureValue> {
    let Some(reply) = reply.get(..GET_REPLY_LEN) else {
        return Err(protocol_error());
    };
    if reply[0] != REPLY_SOURCE || reply[1] != 0x88 || reply[2] != GET_VCP_REPLY {
        return Err(protocol_error());
    }
    if checksum(REPLY_CHECK_SEED, &reply[..GET_REPLY_LEN - 1]) != reply[GET_REPLY_LEN - 1] {
        return Err(protocol_error());
    }
    if reply[3] != 0 {
        // Result code 1: the monitor does not support this VCP code.
        return Err(TransportError::IoFailure(libc::EOPNOTSUPP));
    }
    if reply[4] != code {
        return Err(protocol_error());
    }
    Ok(FeatureValue {
        max: u32::from(u16::from_be_bytes([reply[6], reply[7]])),
        current: u32::from(u16::from_be_bytes([reply[8], reply[9]])),
    })
}

/// Register access to one monitor through `/dev/i2c-N`.
pub struct I2cDdcTransport {
    file: File,
    path: PathBuf,
    config: I2cConfig,
}

impl I2cDdcTransport {
    pub fn open(path: impl AsRef<Path>, config: I2cConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| TransportError::from_io(&err))?;

        // SAFETY: `file` owns a valid descriptor for the duration of the call.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), I2C_SLAVE as _, libc::c_ulong::from(DDC_ADDRESS)) };
        if rc < 0 {
            return Err(TransportError::from_io(&std::io::Error::last_os_error()));
        }

        debug!(?path, "opened DDC/CI channel");
        Ok(Self { file, path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn send(&mut self, packet: &[u8]) -> Result<()> {
        self.file
            .write_all(packet)
            .map_err(|err| TransportError::from_io(&err))?;
        std::thread::sleep(self.config.reply_delay);
        Ok(())
    }
}

impl RegisterTransport for I2cDdcTransport {
    fn read_feature(&mut self, address: u8) -> Result<FeatureValue> {
        self.send(&get_vcp_request(address))?;
        let mut reply = [0u8; GET_REPLY_LEN];
        self.file
            .read_exact(&mut reply)
            .map_err(|err| TransportError::from_io(&err))?;
        parse_vcp_reply(&reply, address)
    }

    fn write_feature(&mut self, address: u8, value: u32) -> Result<()> {
        self.send(&set_vcp_request(address, value))
    }
}
