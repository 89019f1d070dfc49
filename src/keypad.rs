// MIT License - Copyright (c) 2021 TJForc
// Keypad address decoding

use std::fmt;

use crate::constants::{
    KEYPAD_MASK_HEX_LEN, KEYPAD_MASK_OFFSET, MAX_KEYPAD_ADDRESS, PANEL_DATA_END, PANEL_DATA_START,
};
use crate::error::{BridgeError, Result};

/// Set of keypad addresses (0-31) targeted by a panel message.
///
/// Stored as a bitmask where bit `n` is keypad address `n`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeypadAddressSet(u32);

impl KeypadAddressSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build the set from the keypad mask as it appears on the wire.
    ///
    /// The panel packs the mask as four bytes in address-group order, each
    /// byte least-significant-bit first: bit 0 of the first byte is keypad 0,
    /// bit 7 of the first byte is keypad 7, bit 0 of the second byte is
    /// keypad 8, and so on. Reversing each byte's bits while keeping the byte
    /// order is the same as reading the four bytes little-endian.
    pub fn from_wire_mask(mask: u32) -> Self {
        Self(u32::from_le_bytes(mask.to_be_bytes()))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, address: u8) -> bool {
        address <= MAX_KEYPAD_ADDRESS && self.0 & (1 << address) != 0
    }

    /// Adds an address. Returns false if it is out of range.
    pub fn insert(&mut self, address: u8) -> bool {
        if address > MAX_KEYPAD_ADDRESS {
            return false;
        }
        self.0 |= 1 << address;
        true
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Addresses in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=MAX_KEYPAD_ADDRESS).filter(|a| self.contains(*a))
    }
}

impl FromIterator<u8> for KeypadAddressSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = Self::empty();
        for address in iter {
            set.insert(address);
        }
        set
    }
}

impl fmt::Debug for KeypadAddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Extract the keypad addresses targeted by a raw panel message.
///
/// Messages that do not start with `[` carry no keypad targeting and yield
/// an empty set. A `[` message shorter than the panel-data field, or whose
/// panel-data field is not hexadecimal, is a `MalformedMessage` error.
pub fn decode_keypad_addresses(raw: &str) -> Result<KeypadAddressSet> {
    if !raw.starts_with('[') {
        return Ok(KeypadAddressSet::empty());
    }
    if raw.len() < PANEL_DATA_END {
        return Err(BridgeError::malformed(format!(
            "keypad message is {} bytes, need at least {}",
            raw.len(),
            PANEL_DATA_END
        )));
    }

    let field = raw
        .get(PANEL_DATA_START..PANEL_DATA_END)
        .filter(|f| f.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| BridgeError::malformed("panel data field is not hexadecimal"))?;

    let mask_hex = &field[KEYPAD_MASK_OFFSET..KEYPAD_MASK_OFFSET + KEYPAD_MASK_HEX_LEN];
    let mask = u32::from_str_radix(mask_hex, 16)
        .map_err(|e| BridgeError::malformed(format!("bad keypad mask {mask_hex:?}: {e}")))?;

    Ok(KeypadAddressSet::from_wire_mask(mask))
}
