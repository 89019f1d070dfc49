// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::time::{Duration, interval, sleep};
use tracing::{debug, error, info, warn};

use alarmdecoder_bridge::{
    ArmType, BridgeError, BypassSwitches, ChannelSink, DeviceMessage, KeypadAttributes,
    KeypadPanel, MessageBus, MessageKind, PanelOptions, SocketConnection, ZoneNumber, ZoneSensor,
    ZoneTracker,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "alarmdecoder2mqtt")]
#[command(about = "Bridge between an AlarmDecoder alarm panel interface and MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    alarmdecoder: AlarmDecoderToml,
    mqtt: MqttToml,
    #[serde(default)]
    panel: PanelOptions,
}

#[derive(Debug, Deserialize)]
struct AlarmDecoderToml {
    host: String,
    #[serde(default = "default_alarmdecoder_port")]
    port: u16,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
}

fn default_alarmdecoder_port() -> u16 {
    10000
}
fn default_reconnect_delay() -> u64 {
    5000
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default = "default_subscribe_topic")]
    subscribe_topic: String,
    #[serde(default = "default_publish_topic")]
    publish_topic: String,
    #[serde(default = "default_snapshot_interval")]
    snapshot_interval_secs: u64,
}

fn default_client_id() -> String {
    "alarmdecoder-bridge".to_string()
}
fn default_subscribe_topic() -> String {
    "alarmdecoder/cmd".to_string()
}
fn default_publish_topic() -> String {
    "alarmdecoder".to_string()
}
fn default_snapshot_interval() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Shared bridge state
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keypad panels, zones, bypass switches and the current AlarmDecoder
/// connection.
struct Bridge {
    /// Bypass scope of this panel connection.
    scope: String,
    options: PanelOptions,
    /// One panel per configured keypad, in `options.keypads` order.
    keypads: Vec<Arc<Mutex<KeypadPanel>>>,
    zones: Arc<Mutex<ZoneTracker>>,
    switches: Mutex<BypassSwitches>,
    sink: Mutex<Option<ChannelSink>>,
}

impl Bridge {
    fn new(scope: String, options: PanelOptions) -> Self {
        let keypads = options
            .keypads
            .iter()
            .map(|address| Arc::new(Mutex::new(KeypadPanel::new(*address, &options))))
            .collect();
        let zones = Arc::new(Mutex::new(ZoneTracker::new(&options)));
        let switches = Mutex::new(BypassSwitches::from_zones(&scope, &options.zones));
        Self {
            scope,
            options,
            keypads,
            zones,
            switches,
            sink: Mutex::new(None),
        }
    }

    /// The keypad at `address`, or the first configured keypad.
    fn keypad(&self, address: Option<u8>) -> alarmdecoder_bridge::Result<&Arc<Mutex<KeypadPanel>>> {
        let index = match address {
            Some(address) => self
                .options
                .keypads
                .iter()
                .position(|a| *a == address)
                .ok_or(BridgeError::UnknownKeypad { address })?,
            None => 0,
        };
        self.keypads
            .get(index)
            .ok_or(BridgeError::UnknownKeypad { address: address.unwrap_or(0) })
    }

    fn sink(&self) -> alarmdecoder_bridge::Result<ChannelSink> {
        lock(&self.sink).clone().ok_or(BridgeError::ChannelClosed)
    }

    fn with_keypad(
        &self,
        address: Option<u8>,
        f: impl FnOnce(&KeypadPanel, &ChannelSink) -> alarmdecoder_bridge::Result<()>,
    ) -> alarmdecoder_bridge::Result<()> {
        let sink = self.sink()?;
        let keypad = lock(self.keypad(address)?);
        f(&keypad, &sink)
    }

    /// Arm from a keypad, then clear the bypass marks that were applied.
    fn arm(
        &self,
        address: Option<u8>,
        arm_type: ArmType,
        code: Option<&str>,
    ) -> alarmdecoder_bridge::Result<()> {
        let sink = self.sink()?;
        let keypad = lock(self.keypad(address)?);
        let mut switches = lock(&self.switches);
        keypad.arm(arm_type, code, &*switches, &self.scope, &sink)?;
        switches.clear(&self.scope);
        Ok(())
    }

    fn set_bypass(&self, zone: u32, marked: bool) -> alarmdecoder_bridge::Result<()> {
        let mut switches = lock(&self.switches);
        if marked {
            switches.mark(&self.scope, zone)
        } else {
            switches.unmark(&self.scope, zone)
        }
    }
}

// ---------------------------------------------------------------------------
// MQTT JSON types
// ---------------------------------------------------------------------------

// Published messages share the {now, op, ...} flat structure

#[derive(Serialize)]
struct MqttSnapshot {
    now: u64,
    op: String,
    state: MqttSnapshotState,
}

#[derive(Serialize)]
struct MqttSnapshotState {
    keypads: Vec<MqttKeypad>,
    zones: Vec<MqttZone>,
    bypass: Vec<MqttBypassSwitch>,
}

#[derive(Serialize)]
struct MqttKeypad {
    address: u8,
    state: String,
    text: String,
    attributes: MqttKeypadAttributes,
}

#[derive(Serialize)]
struct MqttKeypadAttributes {
    ac_power: bool,
    alarm_event_occurred: bool,
    backlight_on: bool,
    battery_low: bool,
    check_zone: bool,
    chime: bool,
    entry_delay_off: bool,
    programming_mode: bool,
    ready: bool,
    zone_bypassed: bool,
}

impl From<&KeypadAttributes> for MqttKeypadAttributes {
    fn from(attrs: &KeypadAttributes) -> Self {
        Self {
            ac_power: attrs.ac_power,
            alarm_event_occurred: attrs.alarm_event_occurred,
            backlight_on: attrs.backlight_on,
            battery_low: attrs.battery_low,
            check_zone: attrs.check_zone,
            chime: attrs.chime,
            entry_delay_off: attrs.entry_delay_off,
            programming_mode: attrs.programming_mode,
            ready: attrs.ready,
            zone_bypassed: attrs.zone_bypassed,
        }
    }
}

#[derive(Serialize)]
struct MqttZone {
    zone: u32,
    name: String,
    #[serde(rename = "type")]
    zone_type: String,
    open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    rf: Option<u8>,
}

impl From<&ZoneSensor> for MqttZone {
    fn from(sensor: &ZoneSensor) -> Self {
        Self {
            zone: sensor.zone,
            name: sensor.label(),
            zone_type: sensor.zone_type.clone(),
            open: sensor.open,
            rf: sensor.rf_value,
        }
    }
}

#[derive(Serialize)]
struct MqttBypassSwitch {
    zone: u32,
    name: String,
    marked: bool,
}

// Keypad state change: {now, op, keypad}
#[derive(Serialize)]
struct MqttKeypadEvent {
    now: u64,
    op: String,
    keypad: MqttKeypad,
}

// Zone state change: {now, op, zone}
#[derive(Serialize)]
struct MqttZoneEvent {
    now: u64,
    op: String,
    zone: MqttZone,
}

// CMD_ACK response
#[derive(Serialize)]
struct MqttCmdAck {
    now: u64,
    op: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    src: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

// Inbound command (subscribed)
#[derive(Deserialize)]
struct MqttCommand {
    op: String,
    #[serde(default)]
    keypad: Option<u8>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    zone: Option<u32>,
    #[serde(default)]
    keys: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

fn keypad_json(keypad: &KeypadPanel) -> MqttKeypad {
    MqttKeypad {
        address: keypad.address(),
        state: keypad.state().as_str().to_string(),
        text: keypad.text().to_string(),
        attributes: keypad.attributes().into(),
    }
}

fn build_snapshot(bridge: &Bridge) -> MqttSnapshot {
    let keypads = bridge
        .keypads
        .iter()
        .map(|keypad| keypad_json(&lock(keypad)))
        .collect();

    let zones = lock(&bridge.zones).sensors().map(MqttZone::from).collect();

    let bypass = lock(&bridge.switches)
        .switches(&bridge.scope)
        .into_iter()
        .map(|(zone, marked)| MqttBypassSwitch {
            zone,
            name: bridge
                .options
                .zones
                .get(&zone)
                .map(|z| z.bypass_label(zone))
                .unwrap_or_else(|| format!("Zone {zone} Bypass")),
            marked,
        })
        .collect();

    MqttSnapshot {
        now: now_epoch_ms(),
        op: "SNAPSHOT".to_string(),
        state: MqttSnapshotState {
            keypads,
            zones,
            bypass,
        },
    }
}

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize, retain: bool) {
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, json).await {
                error!("Failed to publish to {topic}: {e}");
            }
        }
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

async fn publish_snapshot(client: &AsyncClient, topic: &str, bridge: &Bridge) {
    let snapshot = build_snapshot(bridge);
    publish_json(client, topic, &snapshot, true).await;
}

async fn publish_cmd_ack(
    client: &AsyncClient,
    topic: &str,
    success: bool,
    src: Option<serde_json::Value>,
    data: Option<serde_json::Value>,
) {
    let msg = MqttCmdAck {
        now: now_epoch_ms(),
        op: "CMD_ACK".to_string(),
        success,
        src,
        data,
    };
    publish_json(client, topic, &msg, false).await;
}

// ---------------------------------------------------------------------------
// Device messages → keypads and zones
// ---------------------------------------------------------------------------

/// A keypad or zone whose published state is out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateUpdate {
    Keypad(u8),
    Zone(ZoneNumber),
}

/// Route one line from the AlarmDecoder onto the message bus.
fn handle_line(line: &str, bus: &MessageBus<DeviceMessage>) {
    match DeviceMessage::parse(line) {
        Ok(Some(msg)) => {
            bus.publish(&msg);
        }
        Ok(None) => debug!("Ignoring {:?} message: {line}", MessageKind::classify(line)),
        Err(e) => warn!("Dropping device message: {e}"),
    }
}

/// Subscribe every keypad and the zone tracker to the bus; keypads and
/// zones whose state changed are sent to `updates`.
fn subscribe_devices(
    bridge: &Bridge,
    bus: &MessageBus<DeviceMessage>,
    updates: mpsc::UnboundedSender<StateUpdate>,
) {
    for keypad in &bridge.keypads {
        let keypad = Arc::clone(keypad);
        let updates = updates.clone();
        bus.subscribe(move |msg: &DeviceMessage| {
            let DeviceMessage::Keypad(msg) = msg else {
                return;
            };
            let mut keypad = lock(&keypad);
            let before = (keypad.state(), *keypad.attributes(), keypad.text().to_string());
            if keypad.handle_message(msg)
                && before != (keypad.state(), *keypad.attributes(), keypad.text().to_string())
            {
                let _ = updates.send(StateUpdate::Keypad(keypad.address()));
            }
        });
    }

    let zones = Arc::clone(&bridge.zones);
    bus.subscribe(move |msg: &DeviceMessage| {
        let changed = match msg {
            DeviceMessage::Keypad(msg) => lock(&zones).handle_panel_message(msg),
            DeviceMessage::Rfx(msg) => lock(&zones).handle_rfx(msg),
        };
        for zone in changed {
            let _ = updates.send(StateUpdate::Zone(zone));
        }
    });
}

// ---------------------------------------------------------------------------
// MQTT command handler
// ---------------------------------------------------------------------------

async fn handle_command(
    payload_str: &str,
    cmd: MqttCommand,
    client: &AsyncClient,
    topic: &str,
    bridge: &Bridge,
) {
    // Parse the raw payload as a JSON value for the CMD_ACK src field
    let src_json = serde_json::from_str::<serde_json::Value>(payload_str).ok();
    let op = cmd.op.as_str();
    let code = cmd.code.as_deref();

    let result = match op {
        "SNAPSHOT" => {
            debug!("Command: SNAPSHOT");
            let snapshot = build_snapshot(bridge);
            let snapshot_value = serde_json::to_value(&snapshot).ok();
            publish_json(client, topic, &snapshot, true).await;
            publish_cmd_ack(client, topic, true, src_json, snapshot_value).await;
            return;
        }
        "PING" => Ok(()),
        "ARM_AWAY" => bridge.arm(cmd.keypad, ArmType::Away, code),
        "ARM_HOME" => bridge.arm(cmd.keypad, ArmType::Home, code),
        "DISARM" => bridge.with_keypad(cmd.keypad, |keypad, sink| keypad.disarm(code, sink)),
        "TOGGLE_CHIME" => {
            bridge.with_keypad(cmd.keypad, |keypad, sink| keypad.toggle_chime(code, sink))
        }
        "KEYPRESS" => {
            let keys = cmd.keys.as_deref().unwrap_or_default();
            bridge.with_keypad(cmd.keypad, |keypad, sink| keypad.keypress(keys, sink))
        }
        "ZONE_BYPASS_ENABLE" | "ZONE_BYPASS_DISABLE" => match cmd.zone {
            Some(zone) => bridge.set_bypass(zone, op == "ZONE_BYPASS_ENABLE"),
            None => {
                warn!("{op}: missing zone");
                publish_cmd_ack(client, topic, false, src_json, None).await;
                return;
            }
        },
        other => {
            warn!("Unknown command: {other}");
            publish_cmd_ack(client, topic, false, src_json, None).await;
            return;
        }
    };

    let success = match result {
        Ok(()) => {
            info!("{op}: success");
            true
        }
        Err(e) if e.is_retryable() => {
            warn!("{op} failed, AlarmDecoder connection unavailable: {e}");
            false
        }
        Err(e) => {
            error!("{op} failed: {e}");
            false
        }
    };

    // Arming clears bypass marks; republish them
    if success && (op.starts_with("ARM_") || op.starts_with("ZONE_BYPASS_")) {
        publish_snapshot(client, topic, bridge).await;
    }
    publish_cmd_ack(client, topic, success, src_json, None).await;
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=alarmdecoder_bridge=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    // Load config
    let config_text =
        std::fs::read_to_string(&cli.config).context("Failed to read config file")?;
    let config: Config = toml::from_str(&config_text).context("Failed to parse config file")?;
    anyhow::ensure!(
        !config.panel.keypads.is_empty(),
        "At least one keypad address must be configured"
    );

    let (mqtt_host, mqtt_port) = parse_mqtt_url(&config.mqtt.url)?;
    let publish_topic = config.mqtt.publish_topic;
    let subscribe_topic = config.mqtt.subscribe_topic;

    let ad = config.alarmdecoder;
    let scope = format!("{}:{}", ad.host, ad.port);
    let bridge = Arc::new(Bridge::new(scope, config.panel));
    info!(
        "Keypads {:?}, {} zones, {} bypass switches",
        bridge.options.keypads,
        bridge.options.zones.len(),
        lock(&bridge.switches).switches(&bridge.scope).len()
    );

    let mut sigterm = signal(SignalKind::terminate())?;

    // Set up MQTT
    let mut mqtt_opts = MqttOptions::new(&config.mqtt.client_id, &mqtt_host, mqtt_port);
    mqtt_opts.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);

    client
        .subscribe(&subscribe_topic, QoS::AtLeastOnce)
        .await
        .context("Failed to subscribe to MQTT topic")?;
    info!("MQTT: subscribed to {subscribe_topic}");

    publish_snapshot(&client, &publish_topic, &bridge).await;

    // Device messages fan out to keypads and zones synchronously; state
    // changes are published from a task.
    let bus = Arc::new(MessageBus::<DeviceMessage>::new());
    let (update_tx, mut update_rx) = mpsc::unbounded_channel::<StateUpdate>();
    subscribe_devices(&bridge, &bus, update_tx);

    // Task 1: Keypad and zone state publisher
    let bridge_updates = Arc::clone(&bridge);
    let client_updates = client.clone();
    let topic_updates = publish_topic.clone();
    let update_handle = tokio::spawn(async move {
        while let Some(update) = update_rx.recv().await {
            match update {
                StateUpdate::Keypad(address) => {
                    let Ok(keypad) = bridge_updates.keypad(Some(address)) else {
                        continue;
                    };
                    let event = MqttKeypadEvent {
                        now: now_epoch_ms(),
                        op: "KEYPAD_STATE".to_string(),
                        keypad: keypad_json(&lock(keypad)),
                    };
                    info!("Keypad {address}: {}", event.keypad.state);
                    publish_json(&client_updates, &topic_updates, &event, false).await;
                }
                StateUpdate::Zone(zone) => {
                    let zone_json = lock(&bridge_updates.zones).sensor(zone).map(MqttZone::from);
                    let Some(zone_json) = zone_json else {
                        continue;
                    };
                    let event = MqttZoneEvent {
                        now: now_epoch_ms(),
                        op: "ZONE_STATE".to_string(),
                        zone: zone_json,
                    };
                    info!("Zone {zone}: {}", if event.zone.open { "open" } else { "closed" });
                    publish_json(&client_updates, &topic_updates, &event, false).await;
                }
            }
        }
    });

    // Task 2: AlarmDecoder connection, reconnecting after failures
    let bridge_conn = Arc::clone(&bridge);
    let bus_conn = Arc::clone(&bus);
    let conn_handle = tokio::spawn(async move {
        loop {
            match SocketConnection::connect(&ad.host, ad.port).await {
                Ok(mut conn) => {
                    info!("Established a connection with the AlarmDecoder");
                    *lock(&bridge_conn.sink) = Some(conn.sink());
                    loop {
                        match conn.next_line().await {
                            Ok(Some(line)) => handle_line(&line, &bus_conn),
                            Ok(None) => {
                                warn!("AlarmDecoder unexpectedly lost connection");
                                break;
                            }
                            Err(e) => {
                                warn!("AlarmDecoder read error: {e}");
                                break;
                            }
                        }
                    }
                    *lock(&bridge_conn.sink) = None;
                }
                Err(e) => debug!("Failed to connect: {e}"),
            }
            info!(
                "Retrying AlarmDecoder connection in {:.1}s",
                ad.reconnect_delay_ms as f64 / 1000.0
            );
            sleep(Duration::from_millis(ad.reconnect_delay_ms)).await;
        }
    });

    // Task 3: MQTT event loop (receives messages, handles commands)
    let bridge_cmds = Arc::clone(&bridge);
    let client_cmds = client.clone();
    let topic_cmds = publish_topic.clone();
    let sub_topic = subscribe_topic.clone();
    let mqtt_handle = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // rumqttc does not resubscribe after a broker reconnect
                    info!("MQTT: connected, subscribing to {sub_topic}");
                    if let Err(e) = client_cmds.subscribe(&sub_topic, QoS::AtLeastOnce).await {
                        error!("Failed to subscribe to {sub_topic}: {e}");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    if msg.topic == sub_topic {
                        let payload = String::from_utf8_lossy(&msg.payload);
                        match serde_json::from_str::<MqttCommand>(&payload) {
                            Ok(cmd) => {
                                // Payload may carry an access code; log the op only
                                info!("MQTT command received: {}", cmd.op);
                                handle_command(&payload, cmd, &client_cmds, &topic_cmds, &bridge_cmds)
                                    .await;
                            }
                            Err(e) => {
                                warn!("Failed to parse MQTT command: {e}");
                            }
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT event loop error: {e}");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    // Task 4: Snapshot timer
    let bridge_snap = Arc::clone(&bridge);
    let client_snap = client.clone();
    let topic_snap = publish_topic.clone();
    let snapshot_interval_secs = config.mqtt.snapshot_interval_secs.max(1);
    let snap_handle = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(snapshot_interval_secs));
        // Skip the first immediate tick (we already published an initial snapshot)
        ticker.tick().await;
        loop {
            ticker.tick().await;
            publish_snapshot(&client_snap, &topic_snap, &bridge_snap).await;
        }
    });

    info!("MQTT bridge running. Send SIGINT/SIGTERM to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
    }

    update_handle.abort();
    conn_handle.abort();
    mqtt_handle.abort();
    snap_handle.abort();

    if let Err(e) = client.disconnect().await {
        debug!("MQTT disconnect: {e}");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;

    let port: u16 = port_str.parse().context("Invalid MQTT port number")?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alarmdecoder_bridge::{AlarmState, ZoneConfig};

    const ZONE1_FAULT: &str =
        "[00000001000000000A--],001,[f70100000008001c08020000000000],\"FAULT 01 FRONT DOOR\"";

    const KEYPAD0_ARMED_AWAY: &str =
        "[01000001000000000A--],008,[f70100000008001c08020000000000],\"ARMED ***AWAY***\"";

    fn options() -> PanelOptions {
        PanelOptions::builder()
            .keypads([0, 16])
            .zone(
                1,
                ZoneConfig {
                    name: "Front Door".to_string(),
                    bypassable: true,
                    ..ZoneConfig::default()
                },
            )
            .zone(
                7,
                ZoneConfig {
                    bypassable: true,
                    ..ZoneConfig::default()
                },
            )
            .zone(
                9,
                ZoneConfig {
                    zone_type: "motion".to_string(),
                    rfid: Some(180036),
                    zone_loop: Some(1),
                    ..ZoneConfig::default()
                },
            )
            .build()
    }

    fn connected_bridge() -> (Bridge, mpsc::UnboundedReceiver<String>) {
        let bridge = Bridge::new("test".to_string(), options());
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&bridge.sink) = Some(ChannelSink::new(tx));
        (bridge, rx)
    }

    #[test]
    fn test_parse_mqtt_url() {
        assert_eq!(
            parse_mqtt_url("mqtt://broker.local:1883").unwrap(),
            ("broker.local".to_string(), 1883)
        );
        assert_eq!(
            parse_mqtt_url("tcp://10.0.0.2:1884").unwrap(),
            ("10.0.0.2".to_string(), 1884)
        );
        assert!(parse_mqtt_url("mqtt://broker.local").is_err());
        assert!(parse_mqtt_url("mqtt://broker.local:http").is_err());
    }

    #[test]
    fn test_config_parse() {
        let config: Config = toml::from_str(
            r#"
            [alarmdecoder]
            host = "192.168.0.50"

            [mqtt]
            url = "mqtt://localhost:1883"

            [panel]
            keypads = [16]
            auto_bypass = true

            [panel.zones.3]
            name = "Garage"
            bypassable = true
            "#,
        )
        .unwrap();
        assert_eq!(config.alarmdecoder.port, 10000);
        assert_eq!(config.alarmdecoder.reconnect_delay_ms, 5000);
        assert_eq!(config.mqtt.publish_topic, "alarmdecoder");
        assert_eq!(config.mqtt.subscribe_topic, "alarmdecoder/cmd");
        assert_eq!(config.panel.keypads, vec![16]);
        assert!(config.panel.auto_bypass);
        assert!(config.panel.zones[&3].bypassable);
    }

    #[test]
    fn test_config_panel_defaults() {
        let config: Config = toml::from_str(
            r#"
            [alarmdecoder]
            host = "ad.local"
            port = 10001

            [mqtt]
            url = "mqtt://localhost:1883"
            "#,
        )
        .unwrap();
        assert_eq!(config.panel, PanelOptions::default());
    }

    #[test]
    fn test_handle_line_routes_keypad_messages() {
        let bridge = Bridge::new("test".to_string(), options());
        let bus = MessageBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        subscribe_devices(&bridge, &bus, tx);

        handle_line("!REL:12,01,01", &bus);
        handle_line("[garbage", &bus);
        handle_line(KEYPAD0_ARMED_AWAY, &bus);
        // Same state again: no second update
        handle_line(KEYPAD0_ARMED_AWAY, &bus);

        assert_eq!(rx.try_recv().unwrap(), StateUpdate::Keypad(0));
        assert!(rx.try_recv().is_err());
        assert_eq!(lock(&bridge.keypads[0]).state(), AlarmState::ArmedAway);
        assert_eq!(lock(&bridge.keypads[1]).state(), AlarmState::Unknown);
    }

    #[test]
    fn test_handle_line_routes_zone_messages() {
        let bridge = Bridge::new("test".to_string(), options());
        let bus = MessageBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        subscribe_devices(&bridge, &bus, tx);

        handle_line("!RFX:0180036,80", &bus);
        assert_eq!(rx.try_recv().unwrap(), StateUpdate::Zone(9));
        assert!(lock(&bridge.zones).sensor(9).unwrap().open);

        // Fault display: keypad 0 refreshes, zone 1 opens
        handle_line(ZONE1_FAULT, &bus);
        let updates: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(updates.contains(&StateUpdate::Zone(1)));
        assert!(updates.contains(&StateUpdate::Keypad(0)));
        assert!(lock(&bridge.zones).sensor(1).unwrap().open);

        handle_line("!RFX:0180036,zz", &bus);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_keypad_lookup() {
        let bridge = Bridge::new("test".to_string(), options());
        assert_eq!(lock(bridge.keypad(None).unwrap()).address(), 0);
        assert_eq!(lock(bridge.keypad(Some(16)).unwrap()).address(), 16);
        assert!(matches!(
            bridge.keypad(Some(3)),
            Err(BridgeError::UnknownKeypad { address: 3 })
        ));
    }

    #[test]
    fn test_arm_sends_bypass_and_clears_marks() {
        let (bridge, mut rx) = connected_bridge();
        bridge.set_bypass(7, true).unwrap();
        bridge.set_bypass(1, true).unwrap();

        bridge.arm(Some(16), ArmType::Home, Some("1234")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "1234617*");
        assert_eq!(rx.try_recv().unwrap(), "12343");
        assert!(lock(&bridge.switches).switches("test").iter().all(|(_, m)| !m));
    }

    #[test]
    fn test_failed_arm_keeps_marks() {
        let (bridge, mut rx) = connected_bridge();
        bridge.set_bypass(7, true).unwrap();

        assert!(bridge.arm(None, ArmType::Away, None).is_err());
        assert!(rx.try_recv().is_err());
        assert!(lock(&bridge.switches).is_marked("test", 7));
    }

    #[test]
    fn test_commands_need_connection() {
        let bridge = Bridge::new("test".to_string(), options());
        assert!(matches!(
            bridge.with_keypad(None, |kp, sink| kp.disarm(Some("1234"), sink)),
            Err(BridgeError::ChannelClosed)
        ));
    }

    #[test]
    fn test_bypass_only_for_bypassable_zones() {
        let bridge = Bridge::new("test".to_string(), options());
        assert!(bridge.set_bypass(1, true).is_ok());
        assert!(matches!(
            bridge.set_bypass(9, true),
            Err(BridgeError::UnknownZone { zone: 9 })
        ));
        assert!(matches!(
            bridge.set_bypass(4, true),
            Err(BridgeError::UnknownZone { zone: 4 })
        ));
    }

    #[test]
    fn test_snapshot_json() {
        let bridge = Bridge::new("test".to_string(), options());
        bridge.set_bypass(7, true).unwrap();
        let value = serde_json::to_value(build_snapshot(&bridge)).unwrap();

        assert_eq!(value["op"], "SNAPSHOT");
        assert_eq!(value["state"]["keypads"][0]["address"], 0);
        assert_eq!(value["state"]["keypads"][0]["state"], "unknown");
        assert_eq!(value["state"]["keypads"][1]["address"], 16);
        assert_eq!(value["state"]["zones"][0]["zone"], 1);
        assert_eq!(value["state"]["zones"][0]["name"], "Front Door");
        assert_eq!(value["state"]["zones"][0]["type"], "window");
        assert_eq!(value["state"]["zones"][0]["open"], false);
        assert!(value["state"]["zones"][0].get("rf").is_none());
        assert_eq!(value["state"]["zones"][2]["zone"], 9);
        assert_eq!(value["state"]["zones"][2]["type"], "motion");
        assert_eq!(value["state"]["bypass"][0]["name"], "Front Door Bypass");
        assert_eq!(value["state"]["bypass"][0]["marked"], false);
        assert_eq!(value["state"]["bypass"][1]["name"], "Zone 7 Bypass");
        assert_eq!(value["state"]["bypass"][1]["marked"], true);
    }
}
