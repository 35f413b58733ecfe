//! Vendor VCP register map used for monitor identification.

pub const AUTH_DEVICE: u8 = 0xE0;
pub const MAC_PART_1: u8 = 0xE1;
pub const MAC_PART_2: u8 = 0xE2;
pub const TV_SOURCE: u8 = 0xE3;
pub const SET_RES_W: u8 = 0xE4;
pub const SET_RES_H: u8 = 0xE5;
pub const SET_CURSOR_X: u8 = 0xE6;
pub const SET_CURSOR_Y: u8 = 0xE7;
pub const GET_THEME: u8 = 0xE8;

/// How an address is meant to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    /// Written to trigger an action, then read back for the result.
    SetThenGet,
}

/// Access mode for a vendor address, or `None` outside the map.
pub fn access(address: u8) -> Option<Access> {
    match address {
        AUTH_DEVICE => Some(Access::SetThenGet),
        MAC_PART_1 | MAC_PART_2 | TV_SOURCE | GET_THEME => Some(Access::ReadOnly),
        SET_RES_W | SET_RES_H | SET_CURSOR_X | SET_CURSOR_Y => Some(Access::WriteOnly),
        _ => None,
    }
}

pub fn name(address: u8) -> Option<&'static str> {
    Some(match address {
        AUTH_DEVICE => "AUTH_DEVICE",
        MAC_PART_1 => "MAC_PART_1",
        MAC_PART_2 => "MAC_PART_2",
        TV_SOURCE => "TV_SOURCE",
        SET_RES_W => "SET_RES_W",
        SET_RES_H => "SET_RES_H",
        SET_CURSOR_X => "SET_CURSOR_X",
        SET_CURSOR_Y => "SET_CURSOR_Y",
        GET_THEME => "GET_THEME",
        _ => return None,
    })
}
