//! Wire constants and memory map of the weather station

// USB identity of the station (Fine Offset WH1080-style consoles)
pub const VENDOR_ID: u16 = 0x1941;
pub const PRODUCT_ID: u16 = 0x8021;

pub const COMMAND_SIZE: usize = 8;
const READ_OPCODE: u8 = 0xA1;

/// Bytes the device returns for every read command
pub const DEVICE_READ_SIZE: usize = 0x20;

// Fixed block at the start of memory
pub const FIXED_BLOCK_ADDRESS: u16 = 0;
pub const FIXED_BLOCK_SIZE: usize = 256;
pub const PERIOD_ADDRESS: u16 = 16;
pub const PERIOD_SIZE: usize = 1;
pub const ENTRY_COUNT_ADDRESS: u16 = 27;
pub const ENTRY_COUNT_SIZE: usize = 2;
pub const CURRENT_POSITION_ADDRESS: u16 = 30;
pub const CURRENT_POSITION_SIZE: usize = 2;

// Circular log
pub const ENTRY_SIZE: usize = 20;
pub const MAX_ENTRY_COUNT: usize = 3264;

/// Build the double-framed read command for `address`
///
/// The device expects the 4-byte frame `[0xA1, hi, lo, 0x20]` twice.
pub fn read_command(address: u16) -> [u8; COMMAND_SIZE] {
    let [hi, lo] = address.to_be_bytes();
    let frame = [READ_OPCODE, hi, lo, DEVICE_READ_SIZE as u8];
    let mut command = [0u8; COMMAND_SIZE];
    command[..4].copy_from_slice(&frame);
    command[4..].copy_from_slice(&frame);
    command
}

/// Inverse of [`read_command`], `None` for anything that is not a well-formed read
pub fn parse_read_command(command: &[u8]) -> Option<u16> {
    if command.len() != COMMAND_SIZE || command[..4] != command[4..] {
        return None;
    }
    if command[0] != READ_OPCODE || command[3] as usize != DEVICE_READ_SIZE {
        return None;
    }
    Some(u16::from_be_bytes([command[1], command[2]]))
}
