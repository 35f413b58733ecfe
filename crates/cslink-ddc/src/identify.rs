use std::fmt;

use tracing::debug;

use crate::error::Result;
use crate::register::RegisterTransport;
use crate::vcp;

/// Mask selecting the customer id bits of a theme code.
pub const CUSTOMER_ID_MASK: u32 = 0x3FF;

/// Six-byte physical address reported by a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Read the monitor's physical address from the two MAC registers.
///
/// Both reads must succeed; the first error is returned and no partial
/// address is ever produced.
pub fn read_identity<T: RegisterTransport + ?Sized>(t: &mut T) -> Result<MacAddress> {
    let p1 = t.read_feature(vcp::MAC_PART_1)?;
    let p2 = t.read_feature(vcp::MAC_PART_2)?;
    let mac = MacAddress([
        p1.max_hi(),
        p1.max_lo(),
        p1.current_hi(),
        p1.current_lo(),
        p2.max_hi(),
        p2.max_lo(),
    ]);
    debug!(%mac, "read monitor identity");
    Ok(mac)
}

/// Ask the monitor to authorize client slot `index`.
pub fn request_authorization<T: RegisterTransport + ?Sized>(t: &mut T, index: u8) -> Result<()> {
    t.write_feature(vcp::AUTH_DEVICE, u32::from(index) << 8)
}

/// Read back the authorization byte.
pub fn query_authorization<T: RegisterTransport + ?Sized>(t: &mut T) -> Result<u8> {
    Ok(t.read_feature(vcp::AUTH_DEVICE)?.max_hi())
}

/// Active input source and port, as `(source, port)`.
pub fn read_source_port<T: RegisterTransport + ?Sized>(t: &mut T) -> Result<(u8, u8)> {
    let value = t.read_feature(vcp::TV_SOURCE)?;
    Ok((value.max_hi(), value.max_lo()))
}

/// Theme code packed little-endian from `(hi max, lo max, hi cur, lo cur)`.
pub fn read_theme_code<T: RegisterTransport + ?Sized>(t: &mut T) -> Result<u32> {
    let value = t.read_feature(vcp::GET_THEME)?;
    Ok(u32::from_le_bytes([
        value.max_hi(),
        value.max_lo(),
        value.current_hi(),
        value.current_lo(),
    ]))
}

pub fn customer_id(theme_code: u32) -> u32 {
    theme_code & CUSTOMER_ID_MASK
}

/// Push screen size and cursor position, in that order.
///
/// Stops at the first failed write. Writes already made are not undone.
pub fn push_cursor_geometry<T: RegisterTransport + ?Sized>(
    t: &mut T,
    width: u32,
    height: u32,
    x: u32,
    y: u32,
) -> Result<()> {
    t.write_feature(vcp::SET_RES_W, width)?;
    t.write_feature(vcp::SET_RES_H, height)?;
    t.write_feature(vcp::SET_CURSOR_X, x)?;
    t.write_feature(vcp::SET_CURSOR_Y, y)
}
