// MIT License - Copyright (c) 2021 TJForc
// Zone bypass command encoding and bypass switch tracking

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use tracing::debug;

use crate::config::ZoneConfig;
use crate::constants::{BYPASS_TERMINATOR, KEY_BYPASS};
use crate::error::{BridgeError, Result};

/// A numbered sensor input on the panel.
pub type ZoneNumber = u32;

/// Build the keypad sequence that bypasses `zones`.
///
/// Format: `<code>6<zone><zone>...*`, zones in the order given and rendered
/// without leading zeros or separators. An empty zone list yields an empty
/// string (nothing to send).
///
/// The zone list is not uniquely decodable from the result (`[1, 11]` and
/// `[11, 1]` both produce `111`); the panel reads it as typed.
pub fn encode_bypass(zones: &[ZoneNumber], code: &str) -> String {
    if zones.is_empty() {
        return String::new();
    }
    let mut keys = String::with_capacity(code.len() + zones.len() * 3 + 2);
    keys.push_str(code);
    keys.push_str(KEY_BYPASS);
    for zone in zones {
        // Writing to a String cannot fail.
        let _ = write!(keys, "{zone}");
    }
    keys.push_str(BYPASS_TERMINATOR);
    keys
}

/// Source of the zones currently marked for bypass.
pub trait BypassRegistry {
    /// Zones marked for bypass in `scope`, ascending.
    fn active_zones(&self, scope: &str) -> Vec<ZoneNumber>;
}

/// In-memory bypass switches, one per bypassable zone, grouped by scope
/// (one scope per panel connection).
#[derive(Debug, Clone, Default)]
pub struct BypassSwitches {
    scopes: HashMap<String, BTreeMap<ZoneNumber, bool>>,
}

impl BypassSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create switches in `scope` for every zone configured as bypassable.
    pub fn from_zones<'a>(
        scope: &str,
        zones: impl IntoIterator<Item = (&'a ZoneNumber, &'a ZoneConfig)>,
    ) -> Self {
        let mut switches = Self::new();
        for (zone, config) in zones {
            if config.bypassable {
                debug!("Creating bypass switch for zone {zone}");
                switches.add_switch(scope, *zone);
            }
        }
        switches
    }

    pub fn add_switch(&mut self, scope: &str, zone: ZoneNumber) {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .entry(zone)
            .or_insert(false);
    }

    /// Mark a zone for bypass on the next arming.
    pub fn mark(&mut self, scope: &str, zone: ZoneNumber) -> Result<()> {
        self.set(scope, zone, true)?;
        debug!("Zone {zone} marked for bypass");
        Ok(())
    }

    pub fn unmark(&mut self, scope: &str, zone: ZoneNumber) -> Result<()> {
        self.set(scope, zone, false)?;
        debug!("Zone {zone} unmarked for bypass");
        Ok(())
    }

    fn set(&mut self, scope: &str, zone: ZoneNumber, marked: bool) -> Result<()> {
        let switch = self
            .scopes
            .get_mut(scope)
            .and_then(|zones| zones.get_mut(&zone))
            .ok_or(BridgeError::UnknownZone { zone })?;
        *switch = marked;
        Ok(())
    }

    pub fn is_marked(&self, scope: &str, zone: ZoneNumber) -> bool {
        self.scopes
            .get(scope)
            .and_then(|zones| zones.get(&zone))
            .copied()
            .unwrap_or(false)
    }

    /// All switches in `scope` with their marked state, ascending by zone.
    pub fn switches(&self, scope: &str) -> Vec<(ZoneNumber, bool)> {
        self.scopes
            .get(scope)
            .map(|zones| zones.iter().map(|(z, m)| (*z, *m)).collect())
            .unwrap_or_default()
    }

    /// Unmark every zone in `scope`.
    pub fn clear(&mut self, scope: &str) {
        if let Some(zones) = self.scopes.get_mut(scope) {
            zones.values_mut().for_each(|m| *m = false);
        }
    }
}

impl BypassRegistry for BypassSwitches {
    fn active_zones(&self, scope: &str) -> Vec<ZoneNumber> {
        let zones: Vec<ZoneNumber> = self
            .scopes
            .get(scope)
            .map(|zones| {
                zones
                    .iter()
                    .filter(|(_, marked)| **marked)
                    .map(|(zone, _)| *zone)
                    .collect()
            })
            .unwrap_or_default();
        debug!("Total bypass zones found: {zones:?}");
        zones
    }
}
