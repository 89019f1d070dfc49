// MIT License - Copyright (c) 2021 TJForc
// AlarmDecoder panel message parsing

use bitflags::bitflags;

use crate::constants::{
    BITFIELD_LEN, NUMERIC_CODE_LEN, PANEL_DATA_LEN, PanelType, RFX_BATTERY_BIT, RFX_LOOP_BITS,
    RFX_SUPERVISION_BIT,
};
use crate::error::{BridgeError, Result};
use crate::keypad::{KeypadAddressSet, decode_keypad_addresses};

bitflags! {
    /// Keypad status flags parsed from the 22-character bracketed bitfield.
    ///
    /// A position is set when its character is anything other than `0`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeypadStatusFlags: u16 {
        /// 1 - Ready to arm
        const READY                = 1 << 0;
        /// 2 - Armed away
        const ARMED_AWAY           = 1 << 1;
        /// 3 - Armed home/stay
        const ARMED_HOME           = 1 << 2;
        /// 4 - Keypad backlight on
        const BACKLIGHT_ON         = 1 << 3;
        /// 5 - Programming mode
        const PROGRAMMING_MODE     = 1 << 4;
        /// 7 - At least one zone bypassed
        const ZONE_BYPASSED        = 1 << 5;
        /// 8 - AC power present
        const AC_POWER             = 1 << 6;
        /// 9 - Chime enabled
        const CHIME_ON             = 1 << 7;
        /// 10 - Alarm event occurred (memory)
        const ALARM_EVENT_OCCURRED = 1 << 8;
        /// 11 - Alarm sounding
        const ALARM_SOUNDING       = 1 << 9;
        /// 12 - Low battery
        const BATTERY_LOW          = 1 << 10;
        /// 13 - Entry delay off (instant)
        const ENTRY_DELAY_OFF      = 1 << 11;
        /// 14 - Fire alarm
        const FIRE_ALARM           = 1 << 12;
        /// 15 - Check zone (trouble)
        const CHECK_ZONE           = 1 << 13;
        /// 16 - Perimeter only (armed max/stay)
        const PERIMETER_ONLY       = 1 << 14;
    }
}

/// Bitfield character positions for each flag. Position 0 is the `[`.
const KEYPAD_FLAG_POSITIONS: [(usize, KeypadStatusFlags); 15] = [
    (1, KeypadStatusFlags::READY),
    (2, KeypadStatusFlags::ARMED_AWAY),
    (3, KeypadStatusFlags::ARMED_HOME),
    (4, KeypadStatusFlags::BACKLIGHT_ON),
    (5, KeypadStatusFlags::PROGRAMMING_MODE),
    (7, KeypadStatusFlags::ZONE_BYPASSED),
    (8, KeypadStatusFlags::AC_POWER),
    (9, KeypadStatusFlags::CHIME_ON),
    (10, KeypadStatusFlags::ALARM_EVENT_OCCURRED),
    (11, KeypadStatusFlags::ALARM_SOUNDING),
    (12, KeypadStatusFlags::BATTERY_LOW),
    (13, KeypadStatusFlags::ENTRY_DELAY_OFF),
    (14, KeypadStatusFlags::FIRE_ALARM),
    (15, KeypadStatusFlags::CHECK_ZONE),
    (16, KeypadStatusFlags::PERIMETER_ONLY),
];

const PANEL_TYPE_POSITION: usize = 18;

impl KeypadStatusFlags {
    /// Parse the bracketed bitfield (e.g. `[00000001000000100A--]`).
    pub fn from_bitfield(bitfield: &str) -> Self {
        let bytes = bitfield.as_bytes();
        let mut flags = Self::empty();
        for (pos, flag) in &KEYPAD_FLAG_POSITIONS {
            if bytes.get(*pos).is_some_and(|b| *b != b'0') {
                flags |= *flag;
            }
        }
        flags
    }
}

/// Kind of line received from the AlarmDecoder, by prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `[...]` keypad status message
    Keypad,
    /// `!RFX:` wireless sensor message
    Rfx,
    /// `!REL:` relay message
    Relay,
    /// `!EXP:` zone expander message
    Expander,
    /// `!LRR:` long range radio message
    LongRangeRadio,
    /// `!AUI:` AUI bus message
    Aui,
    /// `!CRC`, `!VER:`, `!CONFIG` and other device responses
    Device,
    /// Anything else
    Unknown,
}

impl MessageKind {
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with('[') {
            return Self::Keypad;
        }
        match raw.get(..5) {
            Some("!RFX:") => Self::Rfx,
            Some("!REL:") => Self::Relay,
            Some("!EXP:") => Self::Expander,
            Some("!LRR:") => Self::LongRangeRadio,
            Some("!AUI:") => Self::Aui,
            _ if raw.starts_with('!') => Self::Device,
            _ => Self::Unknown,
        }
    }
}

/// A parsed keypad status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelMessage {
    /// The line exactly as received.
    pub raw: String,
    pub flags: KeypadStatusFlags,
    pub panel_type: Option<PanelType>,
    /// Zone number or fault code shown on the keypad.
    pub numeric_code: String,
    /// Raw bracketed panel-data field.
    pub panel_data: String,
    /// Alphanumeric keypad text.
    pub text: String,
}

impl PanelMessage {
    /// Parse a keypad status message.
    ///
    /// Format: `[bitfield],NNN,[panel data],"keypad text"`. The text may
    /// itself contain commas.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut fields = raw.splitn(4, ',');
        let (Some(bitfield), Some(numeric_code), Some(panel_data), Some(alpha)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(BridgeError::malformed(format!(
                "expected 4 comma-separated fields: {raw:?}"
            )));
        };

        if bitfield.len() != BITFIELD_LEN
            || !bitfield.starts_with('[')
            || !bitfield.ends_with(']')
            || !bitfield.is_ascii()
        {
            return Err(BridgeError::malformed(format!("bad bitfield: {bitfield:?}")));
        }
        if numeric_code.len() != NUMERIC_CODE_LEN {
            return Err(BridgeError::malformed(format!(
                "bad numeric code: {numeric_code:?}"
            )));
        }
        if panel_data.len() != PANEL_DATA_LEN
            || !panel_data.starts_with('[')
            || !panel_data.ends_with(']')
            || !panel_data[1..PANEL_DATA_LEN - 1]
                .bytes()
                .all(|b| b.is_ascii_hexdigit())
        {
            return Err(BridgeError::malformed(format!(
                "bad panel data: {panel_data:?}"
            )));
        }

        let panel_type = PanelType::from_char(char::from(bitfield.as_bytes()[PANEL_TYPE_POSITION]));
        let text = alpha.trim_matches('"').to_string();

        Ok(Self {
            raw: raw.to_string(),
            flags: KeypadStatusFlags::from_bitfield(bitfield),
            panel_type,
            numeric_code: numeric_code.to_string(),
            panel_data: panel_data.to_string(),
            text,
        })
    }

    /// Keypad addresses this message is meant for.
    pub fn target_keypads(&self) -> Result<KeypadAddressSet> {
        decode_keypad_addresses(&self.raw)
    }

    // Convenience accessors
    pub fn ready(&self) -> bool { self.flags.contains(KeypadStatusFlags::READY) }
    pub fn armed_away(&self) -> bool { self.flags.contains(KeypadStatusFlags::ARMED_AWAY) }
    pub fn armed_home(&self) -> bool { self.flags.contains(KeypadStatusFlags::ARMED_HOME) }
    pub fn backlight_on(&self) -> bool { self.flags.contains(KeypadStatusFlags::BACKLIGHT_ON) }
    pub fn programming_mode(&self) -> bool { self.flags.contains(KeypadStatusFlags::PROGRAMMING_MODE) }
    pub fn zone_bypassed(&self) -> bool { self.flags.contains(KeypadStatusFlags::ZONE_BYPASSED) }
    pub fn ac_power(&self) -> bool { self.flags.contains(KeypadStatusFlags::AC_POWER) }
    pub fn chime_on(&self) -> bool { self.flags.contains(KeypadStatusFlags::CHIME_ON) }
    pub fn alarm_event_occurred(&self) -> bool { self.flags.contains(KeypadStatusFlags::ALARM_EVENT_OCCURRED) }
    pub fn alarm_sounding(&self) -> bool { self.flags.contains(KeypadStatusFlags::ALARM_SOUNDING) }
    pub fn battery_low(&self) -> bool { self.flags.contains(KeypadStatusFlags::BATTERY_LOW) }
    pub fn entry_delay_off(&self) -> bool { self.flags.contains(KeypadStatusFlags::ENTRY_DELAY_OFF) }
    pub fn fire_alarm(&self) -> bool { self.flags.contains(KeypadStatusFlags::FIRE_ALARM) }
    pub fn check_zone(&self) -> bool { self.flags.contains(KeypadStatusFlags::CHECK_ZONE) }

    /// Zone number shown in the numeric code field, if it is decimal.
    pub fn zone_number(&self) -> Option<u32> {
        self.numeric_code.parse().ok()
    }

    /// Whether the keypad is showing a zone fault (`FAULT nn` or `CHECK nn`).
    pub fn is_fault(&self) -> bool {
        let text = self.text.trim_start();
        text.starts_with("FAULT") || text.starts_with("CHECK")
    }
}

/// A wireless sensor message: `!RFX:<serial>,<status>`.
///
/// The serial number is decimal; the status byte is two hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfxMessage {
    pub serial: u32,
    pub value: u8,
}

impl RfxMessage {
    pub fn parse(raw: &str) -> Result<Self> {
        let body = raw
            .strip_prefix("!RFX:")
            .ok_or_else(|| BridgeError::malformed(format!("not an RFX message: {raw:?}")))?;
        let (serial, value) = body
            .split_once(',')
            .ok_or_else(|| BridgeError::malformed(format!("bad RFX message: {raw:?}")))?;

        let serial = serial
            .parse()
            .map_err(|e| BridgeError::malformed(format!("bad RFX serial {serial:?}: {e}")))?;
        let value = u8::from_str_radix(value.trim(), 16)
            .map_err(|e| BridgeError::malformed(format!("bad RFX status {value:?}: {e}")))?;

        Ok(Self { serial, value })
    }

    /// State of input loop `zone_loop` (1-4); `None` for any other loop.
    pub fn loop_open(&self, zone_loop: u8) -> Option<bool> {
        let index = usize::from(zone_loop).checked_sub(1)?;
        RFX_LOOP_BITS.get(index).map(|bit| self.value & bit != 0)
    }

    pub fn battery_low(&self) -> bool {
        self.value & RFX_BATTERY_BIT != 0
    }

    pub fn supervision(&self) -> bool {
        self.value & RFX_SUPERVISION_BIT != 0
    }
}

/// A line from the AlarmDecoder that the bridge acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    Keypad(PanelMessage),
    Rfx(RfxMessage),
}

impl DeviceMessage {
    /// Parse a line. Kinds the bridge does not act on give `Ok(None)`.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        match MessageKind::classify(raw) {
            MessageKind::Keypad => PanelMessage::parse(raw).map(|m| Some(Self::Keypad(m))),
            MessageKind::Rfx => RfxMessage::parse(raw).map(|m| Some(Self::Rfx(m))),
            _ => Ok(None),
        }
    }
}
