// MIT License - Copyright (c) 2021 TJForc
// Keypad command sequences

use crate::bypass::{ZoneNumber, encode_bypass};
use crate::config::ArmType;
use crate::constants::{
    KEY_ARM_AWAY, KEY_ARM_HOME, KEY_BYPASS, KEY_CHIME, KEY_DISARM, KEY_QUICK,
};

/// Keystroke sequences that can be sent to the panel through the AlarmDecoder.
///
/// Sequences follow the Honeywell/Ademco keypad conventions: the user code
/// is typed first, followed by the function key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `<code>1`: Disarm.
    Disarm { code: String },
    /// `<code>2` / `<code>3`: Arm away or home (stay).
    Arm { arm_type: ArmType, code: String },
    /// `#2` / `#3`: Quick arm without a code (requires panel quick-arm enabled).
    QuickArm { arm_type: ArmType },
    /// `<code>6#`: Bypass every currently faulted zone.
    BypassFaulted { code: String },
    /// `<code>6<zones>*`: Bypass the listed zones.
    BypassZones { code: String, zones: Vec<ZoneNumber> },
    /// `<code>9`: Toggle chime mode.
    ToggleChime { code: String },
    /// Raw keypresses, sent verbatim.
    Keypress(String),
}

impl Command {
    /// Convert the command to the keystrokes written to the AlarmDecoder.
    pub fn to_wire_string(&self) -> String {
        match self {
            Command::Disarm { code } => format!("{code}{KEY_DISARM}"),
            Command::Arm { arm_type, code } => format!("{code}{}", arm_key(*arm_type)),
            Command::QuickArm { arm_type } => format!("{KEY_QUICK}{}", arm_key(*arm_type)),
            Command::BypassFaulted { code } => format!("{code}{KEY_BYPASS}{KEY_QUICK}"),
            Command::BypassZones { code, zones } => encode_bypass(zones, code),
            Command::ToggleChime { code } => format!("{code}{KEY_CHIME}"),
            Command::Keypress(keys) => keys.clone(),
        }
    }

    /// Create the arm command for an optional code: coded arm when a code
    /// is present, quick arm otherwise.
    pub fn arm(arm_type: ArmType, code: Option<&str>) -> Self {
        match code {
            Some(code) if !code.is_empty() => Command::Arm {
                arm_type,
                code: code.to_string(),
            },
            _ => Command::QuickArm { arm_type },
        }
    }
}

fn arm_key(arm_type: ArmType) -> &'static str {
    match arm_type {
        ArmType::Away => KEY_ARM_AWAY,
        ArmType::Home => KEY_ARM_HOME,
    }
}
