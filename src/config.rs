// MIT License - Copyright (c) 2021 TJForc
// Panel and zone configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::bypass::ZoneNumber;
use crate::constants::{DEFAULT_ZONE_TYPE, MAX_KEYPAD_ADDRESS, RFX_LOOP_COUNT, ZONE_TYPES};

/// Arm type for arming commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmType {
    /// Full/away arm
    Away,
    /// Stay/home arm
    Home,
}

impl ArmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Away => "arm away",
            Self::Home => "arm home",
        }
    }
}

/// Per-zone configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ZoneConfig {
    pub name: String,
    /// Binary sensor type, one of [`ZONE_TYPES`] (e.g. "window", "door", "motion").
    #[serde(
        rename = "type",
        default = "default_zone_type",
        deserialize_with = "deserialize_zone_type"
    )]
    pub zone_type: String,
    /// RF serial number for wireless zones.
    #[serde(default)]
    pub rfid: Option<u32>,
    /// RF loop (1-4) for wireless zones.
    #[serde(rename = "loop", default, deserialize_with = "deserialize_zone_loop")]
    pub zone_loop: Option<u8>,
    /// Whether a bypass switch is created for this zone.
    #[serde(default)]
    pub bypassable: bool,
}

fn default_zone_type() -> String {
    DEFAULT_ZONE_TYPE.to_string()
}

fn deserialize_zone_type<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let zone_type = String::deserialize(deserializer)?;
    if !ZONE_TYPES.contains(&zone_type.as_str()) {
        return Err(serde::de::Error::custom(format!(
            "invalid zone type: {zone_type:?} (expected one of: {})",
            ZONE_TYPES.join(", ")
        )));
    }
    Ok(zone_type)
}

fn deserialize_zone_loop<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let zone_loop: Option<u8> = Option::deserialize(deserializer)?;
    match zone_loop {
        Some(l) if l == 0 || l > RFX_LOOP_COUNT => Err(serde::de::Error::custom(format!(
            "invalid zone loop: {l} (expected 1-{RFX_LOOP_COUNT})"
        ))),
        _ => Ok(zone_loop),
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            zone_type: default_zone_type(),
            rfid: None,
            zone_loop: None,
            bypassable: false,
        }
    }
}

impl ZoneConfig {
    /// Display name of the zone's bypass switch.
    pub fn bypass_label(&self, zone: ZoneNumber) -> String {
        if self.name.is_empty() {
            format!("Zone {zone} Bypass")
        } else {
            format!("{} Bypass", self.name)
        }
    }
}

/// Arming behaviour, keypads and zones of one panel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PanelOptions {
    /// Keypad addresses to expose as alarm panels.
    #[serde(default = "default_keypads", deserialize_with = "deserialize_keypads")]
    pub keypads: Vec<u8>,
    /// Send "bypass all faulted zones" before arming.
    #[serde(default)]
    pub auto_bypass: bool,
    /// Refuse to arm without an access code.
    #[serde(default = "default_code_arm_required")]
    pub code_arm_required: bool,
    #[serde(default, deserialize_with = "deserialize_zones")]
    pub zones: BTreeMap<ZoneNumber, ZoneConfig>,
}

fn default_keypads() -> Vec<u8> {
    vec![0]
}

fn default_code_arm_required() -> bool {
    true
}

fn deserialize_keypads<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let keypads: Vec<u8> = Vec::deserialize(deserializer)?;
    if let Some(bad) = keypads.iter().find(|a| **a > MAX_KEYPAD_ADDRESS) {
        return Err(serde::de::Error::custom(format!(
            "invalid keypad address: {bad} (max: {MAX_KEYPAD_ADDRESS})"
        )));
    }
    Ok(keypads)
}

fn deserialize_zones<'de, D>(deserializer: D) -> Result<BTreeMap<ZoneNumber, ZoneConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let string_map: BTreeMap<String, ZoneConfig> = BTreeMap::deserialize(deserializer)?;
    string_map
        .into_iter()
        .map(|(k, v)| match k.parse::<ZoneNumber>() {
            Ok(id) if id > 0 => Ok((id, v)),
            _ => Err(serde::de::Error::custom(format!("invalid zone number: {k}"))),
        })
        .collect()
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            keypads: default_keypads(),
            auto_bypass: false,
            code_arm_required: default_code_arm_required(),
            zones: BTreeMap::new(),
        }
    }
}

impl PanelOptions {
    /// Create a new options builder starting from defaults.
    pub fn builder() -> PanelOptionsBuilder {
        PanelOptionsBuilder::default()
    }
}

/// Builder for PanelOptions.
#[derive(Debug, Clone, Default)]
pub struct PanelOptionsBuilder {
    options: PanelOptions,
}

impl PanelOptionsBuilder {
    pub fn keypads(mut self, keypads: impl Into<Vec<u8>>) -> Self {
        self.options.keypads = keypads.into();
        self
    }

    pub fn auto_bypass(mut self, auto_bypass: bool) -> Self {
        self.options.auto_bypass = auto_bypass;
        self
    }

    pub fn code_arm_required(mut self, required: bool) -> Self {
        self.options.code_arm_required = required;
        self
    }

    pub fn zone(mut self, zone: ZoneNumber, config: ZoneConfig) -> Self {
        self.options.zones.insert(zone, config);
        self
    }

    pub fn build(self) -> PanelOptions {
        self.options
    }
}
