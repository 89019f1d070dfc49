// Schema validation tests for the MQTT wire format
//
// These tests construct JSON values directly (independent of Rust structs)
// and validate them against the JSON Schema files in schemas/mqtt/.

use serde_json::json;

fn load_schema(name: &str) -> serde_json::Value {
    let path = format!("{}/schemas/mqtt/{name}", env!("CARGO_MANIFEST_DIR"));
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read schema {path}: {e}"));
    serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("Failed to parse schema {path}: {e}"))
}

fn build_validator(schema_name: &str) -> jsonschema::Validator {
    let schema = load_schema(schema_name);
    jsonschema::options()
        .with_retriever(LocalRetriever)
        .build(&schema)
        .unwrap_or_else(|e| panic!("Failed to compile schema {schema_name}: {e}"))
}

fn validate(schema_name: &str, instance: &serde_json::Value) {
    let validator = build_validator(schema_name);
    let errors: Vec<_> = validator.iter_errors(instance).collect();
    if !errors.is_empty() {
        let msgs: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
        panic!(
            "Schema validation failed for {schema_name}:\n{}\nInstance: {}",
            msgs.join("\n"),
            serde_json::to_string_pretty(instance).unwrap()
        );
    }
}

fn validate_fails(schema_name: &str, instance: &serde_json::Value) {
    let validator = build_validator(schema_name);
    assert!(
        !validator.is_valid(instance),
        "Expected schema validation to fail for {schema_name}, but it passed.\nInstance: {}",
        serde_json::to_string_pretty(instance).unwrap()
    );
}

// Retriever that loads $ref schemas from the local filesystem
struct LocalRetriever;

impl jsonschema::Retrieve for LocalRetriever {
    fn retrieve(
        &self,
        uri: &jsonschema::Uri<String>,
    ) -> Result<serde_json::Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        let schema_dir = format!("{}/schemas/mqtt/", env!("CARGO_MANIFEST_DIR"));

        // Extract the schema filename from various URI forms:
        // - "json-schema:///keypad.schema.json"
        // - "file:///path/to/keypad.schema.json"
        // - "keypad.schema.json"
        let filename = if let Some(rest) = uri_str.strip_prefix("json-schema:///") {
            rest
        } else if let Some(path) = uri_str.strip_prefix("file://") {
            // For file:// URIs, use the path directly
            let text = std::fs::read_to_string(path)?;
            return Ok(serde_json::from_str(&text)?);
        } else {
            uri_str
        };

        let path = format!("{schema_dir}{filename}");
        if std::path::Path::new(&path).exists() {
            let text = std::fs::read_to_string(&path)?;
            return Ok(serde_json::from_str(&text)?);
        }
        Err(format!("Cannot retrieve schema: {uri_str}").into())
    }
}

// =========================================================================
// Keypad
// =========================================================================

fn disarmed_keypad(address: u8) -> serde_json::Value {
    json!({
        "address": address,
        "state": "disarmed",
        "text": "****DISARMED****  Ready to Arm  ",
        "attributes": {
            "ac_power": true,
            "alarm_event_occurred": false,
            "backlight_on": true,
            "battery_low": false,
            "check_zone": false,
            "chime": false,
            "entry_delay_off": false,
            "programming_mode": false,
            "ready": true,
            "zone_bypassed": false
        }
    })
}

#[test]
fn keypad_valid() {
    validate("keypad.schema.json", &disarmed_keypad(16));
}

#[test]
fn keypad_address_out_of_range() {
    validate_fails("keypad.schema.json", &disarmed_keypad(32));
}

#[test]
fn keypad_unknown_state_rejected() {
    let mut keypad = disarmed_keypad(0);
    keypad["state"] = json!("armed_night");
    validate_fails("keypad.schema.json", &keypad);
}

#[test]
fn keypad_missing_attribute() {
    let mut keypad = disarmed_keypad(0);
    keypad["attributes"]
        .as_object_mut()
        .unwrap()
        .remove("zone_bypassed");
    validate_fails("keypad.schema.json", &keypad);
}

#[test]
fn keypad_camel_case_attributes_rejected() {
    let mut keypad = disarmed_keypad(0);
    let attrs = keypad["attributes"].as_object_mut().unwrap();
    let value = attrs.remove("ac_power").unwrap();
    attrs.insert("acPower".to_string(), value);
    validate_fails("keypad.schema.json", &keypad);
}

// =========================================================================
// Keypad state events
// =========================================================================

#[test]
fn keypad_state_valid() {
    validate(
        "keypad_state.schema.json",
        &json!({
            "now": 1738900000000_u64,
            "op": "KEYPAD_STATE",
            "keypad": disarmed_keypad(0)
        }),
    );
}

#[test]
fn keypad_state_triggered() {
    let mut keypad = disarmed_keypad(1);
    keypad["state"] = json!("triggered");
    keypad["attributes"]["alarm_event_occurred"] = json!(true);
    validate(
        "keypad_state.schema.json",
        &json!({ "now": 1738900000000_u64, "op": "KEYPAD_STATE", "keypad": keypad }),
    );
}

#[test]
fn keypad_state_wrong_op() {
    validate_fails(
        "keypad_state.schema.json",
        &json!({ "now": 1738900000000_u64, "op": "SNAPSHOT", "keypad": disarmed_keypad(0) }),
    );
}

#[test]
fn keypad_state_invalid_keypad() {
    validate_fails(
        "keypad_state.schema.json",
        &json!({ "now": 1738900000000_u64, "op": "KEYPAD_STATE", "keypad": { "address": 0 } }),
    );
}

// =========================================================================
// Snapshot
// =========================================================================

#[test]
fn snapshot_valid() {
    validate(
        "snapshot.schema.json",
        &json!({
            "now": 1738900000000_u64,
            "op": "SNAPSHOT",
            "state": {
                "keypads": [disarmed_keypad(0), disarmed_keypad(16)],
                "zones": [
                    { "zone": 1, "name": "Front Door", "type": "door", "open": false },
                    { "zone": 9, "name": "Zone 9", "type": "motion", "open": true, "rf": 128 }
                ],
                "bypass": [
                    { "zone": 1, "name": "Front Door Bypass", "marked": false },
                    { "zone": 7, "name": "Zone 7 Bypass", "marked": true }
                ]
            }
        }),
    );
}

#[test]
fn snapshot_empty_arrays() {
    validate(
        "snapshot.schema.json",
        &json!({
            "now": 0,
            "op": "SNAPSHOT",
            "state": { "keypads": [], "zones": [], "bypass": [] }
        }),
    );
}

#[test]
fn snapshot_missing_state() {
    validate_fails(
        "snapshot.schema.json",
        &json!({ "now": 1738900000000_u64, "op": "SNAPSHOT" }),
    );
}

#[test]
fn snapshot_timestamp_string_rejected() {
    validate_fails(
        "snapshot.schema.json",
        &json!({
            "now": "2026-01-01T00:00:00Z",
            "op": "SNAPSHOT",
            "state": { "keypads": [], "zones": [], "bypass": [] }
        }),
    );
}

#[test]
fn snapshot_zone_zero_rejected() {
    validate_fails(
        "snapshot.schema.json",
        &json!({
            "now": 1738900000000_u64,
            "op": "SNAPSHOT",
            "state": {
                "keypads": [],
                "zones": [],
                "bypass": [{ "zone": 0, "name": "Zone 0 Bypass", "marked": false }]
            }
        }),
    );
}

#[test]
fn snapshot_missing_zones() {
    validate_fails(
        "snapshot.schema.json",
        &json!({
            "now": 1738900000000_u64,
            "op": "SNAPSHOT",
            "state": { "keypads": [], "bypass": [] }
        }),
    );
}

// =========================================================================
// Zone state
// =========================================================================

#[test]
fn zone_state_valid() {
    validate(
        "zone_state.schema.json",
        &json!({
            "now": 1738900000000_u64,
            "op": "ZONE_STATE",
            "zone": { "zone": 5, "name": "Kitchen Window", "type": "window", "open": true }
        }),
    );
}

#[test]
fn zone_state_with_rf_status() {
    validate(
        "zone_state.schema.json",
        &json!({
            "now": 1738900000000_u64,
            "op": "ZONE_STATE",
            "zone": { "zone": 12, "name": "Zone 12", "type": "motion", "open": false, "rf": 4 }
        }),
    );
}

#[test]
fn zone_every_configurable_type_accepted() {
    for zone_type in alarmdecoder_bridge::constants::ZONE_TYPES {
        validate(
            "zone.schema.json",
            &json!({ "zone": 1, "name": "Zone 1", "type": zone_type, "open": false }),
        );
    }
}

#[test]
fn zone_state_unknown_type_rejected() {
    validate_fails(
        "zone_state.schema.json",
        &json!({
            "now": 1738900000000_u64,
            "op": "ZONE_STATE",
            "zone": { "zone": 5, "name": "Doorbell", "type": "doorbell", "open": true }
        }),
    );
}

#[test]
fn zone_state_rf_out_of_range() {
    validate_fails(
        "zone_state.schema.json",
        &json!({
            "now": 1738900000000_u64,
            "op": "ZONE_STATE",
            "zone": { "zone": 5, "name": "Zone 5", "type": "window", "open": true, "rf": 256 }
        }),
    );
}

// =========================================================================
// Command acknowledgement
// =========================================================================

#[test]
fn cmd_ack_success_with_src() {
    validate(
        "cmd_ack.schema.json",
        &json!({
            "now": 1738900000000_u64,
            "op": "CMD_ACK",
            "success": true,
            "src": { "op": "ARM_AWAY", "keypad": 16, "code": "1234" }
        }),
    );
}

#[test]
fn cmd_ack_snapshot_data() {
    validate(
        "cmd_ack.schema.json",
        &json!({
            "now": 1738900000000_u64,
            "op": "CMD_ACK",
            "success": true,
            "src": { "op": "SNAPSHOT" },
            "data": {
                "now": 1738900000000_u64,
                "op": "SNAPSHOT",
                "state": { "keypads": [], "zones": [], "bypass": [] }
            }
        }),
    );
}

#[test]
fn cmd_ack_missing_success() {
    validate_fails(
        "cmd_ack.schema.json",
        &json!({ "now": 1738900000000_u64, "op": "CMD_ACK" }),
    );
}

// =========================================================================
// Inbound commands
// =========================================================================

#[test]
fn command_arm_with_code() {
    validate(
        "command.schema.json",
        &json!({ "op": "ARM_HOME", "keypad": 16, "code": "1234" }),
    );
}

#[test]
fn command_quick_arm() {
    validate("command.schema.json", &json!({ "op": "ARM_AWAY" }));
}

#[test]
fn command_bypass_requires_zone() {
    validate("command.schema.json", &json!({ "op": "ZONE_BYPASS_ENABLE", "zone": 5 }));
    validate_fails("command.schema.json", &json!({ "op": "ZONE_BYPASS_DISABLE" }));
}

#[test]
fn command_keypress_requires_keys() {
    validate("command.schema.json", &json!({ "op": "KEYPRESS", "keys": "*" }));
    validate_fails("command.schema.json", &json!({ "op": "KEYPRESS" }));
}

#[test]
fn command_non_numeric_code_rejected() {
    validate_fails(
        "command.schema.json",
        &json!({ "op": "DISARM", "code": "12a4" }),
    );
}

#[test]
fn command_unknown_op_rejected() {
    validate_fails("command.schema.json", &json!({ "op": "PANIC" }));
}
