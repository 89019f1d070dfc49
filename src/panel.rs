// MIT License - Copyright (c) 2021 TJForc
// Keypad alarm panel

use tracing::{debug, info, warn};

use crate::bypass::BypassRegistry;
use crate::config::{ArmType, PanelOptions};
use crate::error::{BridgeError, Result};
use crate::message::PanelMessage;
use crate::protocol::Command;

/// Destination for keypad sequences (the AlarmDecoder connection).
pub trait CommandSink {
    /// Send keystrokes verbatim to the panel.
    fn send(&self, keys: &str) -> Result<()>;
}

/// Alarm state shown by a keypad panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmState {
    /// No message for this keypad has been seen yet
    Unknown,
    Disarmed,
    ArmedHome,
    ArmedAway,
    Triggered,
}

impl AlarmState {
    /// Derive the state from a keypad message.
    pub fn from_message(msg: &PanelMessage) -> Self {
        if msg.alarm_sounding() || msg.fire_alarm() {
            Self::Triggered
        } else if msg.armed_away() {
            Self::ArmedAway
        } else if msg.armed_home() {
            Self::ArmedHome
        } else {
            Self::Disarmed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Disarmed => "disarmed",
            Self::ArmedHome => "armed_home",
            Self::ArmedAway => "armed_away",
            Self::Triggered => "triggered",
        }
    }
}

/// Keypad indicators exposed alongside the alarm state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeypadAttributes {
    pub ac_power: bool,
    pub alarm_event_occurred: bool,
    pub backlight_on: bool,
    pub battery_low: bool,
    pub check_zone: bool,
    pub chime: bool,
    pub entry_delay_off: bool,
    pub programming_mode: bool,
    pub ready: bool,
    pub zone_bypassed: bool,
}

impl KeypadAttributes {
    pub fn from_message(msg: &PanelMessage) -> Self {
        Self {
            ac_power: msg.ac_power(),
            alarm_event_occurred: msg.alarm_event_occurred(),
            backlight_on: msg.backlight_on(),
            battery_low: msg.battery_low(),
            check_zone: msg.check_zone(),
            chime: msg.chime_on(),
            entry_delay_off: msg.entry_delay_off(),
            programming_mode: msg.programming_mode(),
            ready: msg.ready(),
            zone_bypassed: msg.zone_bypassed(),
        }
    }
}

/// Alarm panel entity for one keypad address.
///
/// Only messages whose keypad mask includes this address update the state;
/// commands are sent through a [`CommandSink`].
#[derive(Debug, Clone)]
pub struct KeypadPanel {
    address: u8,
    auto_bypass: bool,
    code_arm_required: bool,
    state: AlarmState,
    attributes: KeypadAttributes,
    text: String,
}

impl KeypadPanel {
    pub fn new(address: u8, options: &PanelOptions) -> Self {
        Self {
            address,
            auto_bypass: options.auto_bypass,
            code_arm_required: options.code_arm_required,
            state: AlarmState::Unknown,
            attributes: KeypadAttributes::default(),
            text: String::new(),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn attributes(&self) -> &KeypadAttributes {
        &self.attributes
    }

    /// Last keypad display text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Update from a panel message. Returns true if the message was for
    /// this keypad and the state was refreshed.
    ///
    /// A message whose keypad targeting cannot be decoded is logged and
    /// ignored.
    pub fn handle_message(&mut self, msg: &PanelMessage) -> bool {
        let keypads = match msg.target_keypads() {
            Ok(keypads) => keypads,
            Err(e) => {
                warn!("Keypad {}: ignoring message: {}", self.address, e);
                return false;
            }
        };
        if !keypads.contains(self.address) {
            return false;
        }

        let new_state = AlarmState::from_message(msg);
        if new_state != self.state {
            debug!(
                "Keypad {}: {} -> {}",
                self.address,
                self.state.as_str(),
                new_state.as_str()
            );
        }
        self.state = new_state;
        self.attributes = KeypadAttributes::from_message(msg);
        self.text = msg.text.clone();
        true
    }

    /// Send the disarm sequence. Does nothing without a code.
    pub fn disarm(&self, code: Option<&str>, sink: &dyn CommandSink) -> Result<()> {
        match non_empty(code) {
            Some(code) => send(
                sink,
                &Command::Disarm {
                    code: code.to_string(),
                },
            ),
            None => Ok(()),
        }
    }

    /// Arm the panel, bypassing the zones marked in `registry` for `scope` first.
    pub fn arm(
        &self,
        arm_type: ArmType,
        code: Option<&str>,
        registry: &dyn BypassRegistry,
        scope: &str,
        sink: &dyn CommandSink,
    ) -> Result<()> {
        let code = non_empty(code);
        if self.code_arm_required && code.is_none() {
            return Err(BridgeError::CodeRequired {
                action: arm_type.as_str(),
            });
        }

        let zones = registry.active_zones(scope);
        if zones.is_empty() {
            debug!("Keypad {}: {} without bypasses", self.address, arm_type.as_str());
        } else {
            info!(
                "Keypad {}: {} with bypassed zones: {:?}",
                self.address,
                arm_type.as_str(),
                zones
            );
            send(
                sink,
                &Command::BypassZones {
                    code: code.unwrap_or_default().to_string(),
                    zones,
                },
            )?;
        }

        if self.auto_bypass
            && let Some(code) = code
        {
            send(
                sink,
                &Command::BypassFaulted {
                    code: code.to_string(),
                },
            )?;
        }

        send(sink, &Command::arm(arm_type, code))
    }

    /// Toggle chime mode. Does nothing without a code.
    pub fn toggle_chime(&self, code: Option<&str>, sink: &dyn CommandSink) -> Result<()> {
        match non_empty(code) {
            Some(code) => send(
                sink,
                &Command::ToggleChime {
                    code: code.to_string(),
                },
            ),
            None => Ok(()),
        }
    }

    /// Send custom keypresses. Does nothing for an empty string.
    pub fn keypress(&self, keys: &str, sink: &dyn CommandSink) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        send(sink, &Command::Keypress(keys.to_string()))
    }
}

fn non_empty(code: Option<&str>) -> Option<&str> {
    code.filter(|c| !c.is_empty())
}

fn send(sink: &dyn CommandSink, command: &Command) -> Result<()> {
    let keys = command.to_wire_string();
    debug!("Sending {} keystrokes to the panel", keys.len());
    sink.send(&keys)
}
