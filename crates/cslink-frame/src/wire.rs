//! Field-level helpers shared by the payload layouts.
//!
//! Integers are big-endian. Text is UTF-16LE without a terminator. An
//! IPv4 endpoint is four address bytes followed by a big-endian port.

use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::{BufMut, BytesMut};

use crate::error::DecodeError;

/// Encoded size of an IPv4 address plus port.
pub const ADDR_LEN: usize = 6;

pub(crate) fn put_addr(dst: &mut BytesMut, addr: &SocketAddrV4) {
    dst.put_slice(&addr.ip().octets());
    dst.put_u16(addr.port());
}

pub(crate) fn put_utf16(dst: &mut BytesMut, text: &str) {
    dst.reserve(utf16_len(text));
    for unit in text.encode_utf16() {
        dst.put_u16_le(unit);
    }
}

pub(crate) fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count() * 2
}

pub(crate) fn decode_utf16(bytes: &[u8]) -> Result<String, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddTextLength(bytes.len()));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| DecodeError::InvalidText)
}

/// Cursor over a payload. Every read is bounds-checked against the payload.
pub(crate) struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos + n;
        let Some(slice) = self.buf.get(self.pos..end) else {
            return Err(DecodeError::Truncated {
                needed: end,
                available: self.buf.len(),
            });
        };
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub(crate) fn addr(&mut self) -> Result<SocketAddrV4, DecodeError> {
        let raw: [u8; ADDR_LEN] = self.array()?;
        Ok(SocketAddrV4::new(
            Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3]),
            u16::from_be_bytes([raw[4], raw[5]]),
        ))
    }

    /// Consume the open-ended text field that closes a payload.
    pub(crate) fn utf16_rest(&mut self) -> Result<String, DecodeError> {
        let rest = self.take(self.remaining())?;
        decode_utf16(rest)
    }

    /// Fixed layouts must consume the payload exactly.
    pub(crate) fn finish(self) -> Result<(), DecodeError> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(DecodeError::LengthMismatch {
                expected: self.pos,
                actual: self.buf.len(),
            })
        }
    }
}
