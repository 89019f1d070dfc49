// MIT License - Copyright (c) 2021 TJForc
// AlarmDecoder protocol constants

/// Byte offset of the panel-data hex field within a keypad message
/// (just past the opening `[` of the third field).
pub const PANEL_DATA_START: usize = 28;
/// End (exclusive) of the panel-data hex field; also the minimum length
/// of a keypad message that carries keypad targeting.
pub const PANEL_DATA_END: usize = 58;
/// Offset of the keypad address mask within the panel-data hex field.
/// The first byte is the message type (`f7` for keypad messages).
pub const KEYPAD_MASK_OFFSET: usize = 2;
/// Length of the keypad address mask in hex characters (4 bytes).
pub const KEYPAD_MASK_HEX_LEN: usize = 8;
/// Highest keypad address representable in the mask.
pub const MAX_KEYPAD_ADDRESS: u8 = 31;

/// Length of the bracketed status bitfield, brackets included.
pub const BITFIELD_LEN: usize = 22;
/// Length of the numeric code field.
pub const NUMERIC_CODE_LEN: usize = 3;
/// Length of the bracketed panel-data field, brackets included.
pub const PANEL_DATA_LEN: usize = 32;

/// Ademco keypad command keys.
pub const KEY_DISARM: &str = "1";
pub const KEY_ARM_AWAY: &str = "2";
pub const KEY_ARM_HOME: &str = "3";
pub const KEY_BYPASS: &str = "6";
pub const KEY_CHIME: &str = "9";
/// Terminates a list of zones following [`KEY_BYPASS`].
pub const BYPASS_TERMINATOR: &str = "*";
/// Prefix for quick (codeless) arming, and suffix for "bypass all faulted".
pub const KEY_QUICK: &str = "#";

/// Default binary sensor type for configured zones.
pub const DEFAULT_ZONE_TYPE: &str = "window";

/// Binary sensor types a zone may be configured with.
pub const ZONE_TYPES: &[&str] = &[
    "battery",
    "battery_charging",
    "carbon_monoxide",
    "cold",
    "connectivity",
    "door",
    "garage_door",
    "gas",
    "heat",
    "light",
    "lock",
    "moisture",
    "motion",
    "moving",
    "occupancy",
    "opening",
    "plug",
    "power",
    "presence",
    "problem",
    "running",
    "safety",
    "smoke",
    "sound",
    "tamper",
    "update",
    "vibration",
    "window",
];

/// Number of input loops on a wireless (RFX) sensor.
pub const RFX_LOOP_COUNT: u8 = 4;
/// Status bit of each RFX loop, loop 1 first.
pub const RFX_LOOP_BITS: [u8; RFX_LOOP_COUNT as usize] = [0x80, 0x20, 0x10, 0x40];
/// RFX status bit: sensor battery low.
pub const RFX_BATTERY_BIT: u8 = 0x02;
/// RFX status bit: supervision message.
pub const RFX_SUPERVISION_BIT: u8 = 0x04;

/// Panel family reported in bitfield position 18.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelType {
    /// 'A' - Honeywell/Ademco
    Ademco,
    /// 'D' - DSC
    Dsc,
}

impl PanelType {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(Self::Ademco),
            'D' => Some(Self::Dsc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ademco => "ADEMCO",
            Self::Dsc => "DSC",
        }
    }
}
