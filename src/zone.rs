// MIT License - Copyright (c) 2021 TJForc
// Zone sensors

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::bypass::ZoneNumber;
use crate::config::{PanelOptions, ZoneConfig};
use crate::constants::PanelType;
use crate::message::{PanelMessage, RfxMessage};

/// Open/closed state of one configured zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSensor {
    pub zone: ZoneNumber,
    pub name: String,
    pub zone_type: String,
    pub rfid: Option<u32>,
    pub zone_loop: Option<u8>,
    pub open: bool,
    /// Last status byte from the zone's wireless sensor.
    pub rf_value: Option<u8>,
}

impl ZoneSensor {
    pub fn new(zone: ZoneNumber, config: &ZoneConfig) -> Self {
        Self {
            zone,
            name: config.name.clone(),
            zone_type: config.zone_type.clone(),
            rfid: config.rfid,
            zone_loop: config.zone_loop,
            open: false,
            rf_value: None,
        }
    }

    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("Zone {}", self.zone)
        } else {
            self.name.clone()
        }
    }

    /// Mark the zone faulted. Returns true if it was closed.
    fn fault(&mut self) -> bool {
        let changed = !self.open;
        self.open = true;
        changed
    }

    /// Mark the zone restored. Returns true if it was open.
    fn restore(&mut self) -> bool {
        let changed = self.open;
        self.open = false;
        changed
    }

    /// Apply a message from this zone's wireless sensor. Returns true if
    /// the open state or the status byte changed.
    fn update_rfx(&mut self, msg: &RfxMessage) -> bool {
        let before = (self.open, self.rf_value);
        self.rf_value = Some(msg.value);
        if let Some(open) = self.zone_loop.and_then(|l| msg.loop_open(l)) {
            self.open = open;
        }
        before != (self.open, self.rf_value)
    }
}

/// Tracks the configured zones from keypad fault messages and wireless
/// sensor messages.
///
/// On Ademco panels a not-ready keypad showing `FAULT nn`/`CHECK nn` faults
/// zone `nn`; a ready keypad restores every zone. Wireless zones with a
/// configured loop follow that loop's bit in `!RFX` messages.
#[derive(Debug, Clone, Default)]
pub struct ZoneTracker {
    sensors: BTreeMap<ZoneNumber, ZoneSensor>,
}

impl ZoneTracker {
    pub fn new(options: &PanelOptions) -> Self {
        let sensors = options
            .zones
            .iter()
            .map(|(zone, config)| (*zone, ZoneSensor::new(*zone, config)))
            .collect();
        Self { sensors }
    }

    pub fn sensor(&self, zone: ZoneNumber) -> Option<&ZoneSensor> {
        self.sensors.get(&zone)
    }

    /// All zones, ascending by zone number.
    pub fn sensors(&self) -> impl Iterator<Item = &ZoneSensor> {
        self.sensors.values()
    }

    /// Apply a keypad message. Returns the zones whose state changed.
    pub fn handle_panel_message(&mut self, msg: &PanelMessage) -> Vec<ZoneNumber> {
        if msg.panel_type == Some(PanelType::Dsc) {
            trace!("Zone tracking skipped for DSC keypad message");
            return Vec::new();
        }

        if msg.ready() {
            let restored: Vec<ZoneNumber> = self
                .sensors
                .values_mut()
                .filter_map(|sensor| sensor.restore().then_some(sensor.zone))
                .collect();
            if !restored.is_empty() {
                debug!("Zones restored: {:?}", restored);
            }
            return restored;
        }

        if !msg.is_fault() {
            return Vec::new();
        }
        let Some(zone) = msg.zone_number() else {
            return Vec::new();
        };
        match self.sensors.get_mut(&zone) {
            Some(sensor) => {
                if sensor.fault() {
                    debug!("Zone {zone} faulted");
                    vec![zone]
                } else {
                    Vec::new()
                }
            }
            None => {
                trace!("Fault on unconfigured zone {zone}");
                Vec::new()
            }
        }
    }

    /// Apply a wireless sensor message. Returns the zones whose state changed.
    pub fn handle_rfx(&mut self, msg: &RfxMessage) -> Vec<ZoneNumber> {
        self.sensors
            .values_mut()
            .filter(|sensor| sensor.rfid == Some(msg.serial))
            .filter_map(|sensor| {
                let changed = sensor.update_rfx(msg);
                if changed {
                    debug!(
                        "Zone {} RF {:#04x}: {}",
                        sensor.zone,
                        msg.value,
                        if sensor.open { "open" } else { "closed" }
                    );
                }
                changed.then_some(sensor.zone)
            })
            .collect()
    }
}
