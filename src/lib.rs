// MIT License - Copyright (c) 2021 TJForc
//
//! # alarmdecoder-bridge
//!
//! Keypad-level integration for Honeywell/Ademco alarm panels attached to
//! an AlarmDecoder, exposed over TCP (ser2sock).
//!
//! The core is two pure functions:
//!
//! - [`encode_bypass`] builds the keystrokes that bypass a list of zones.
//! - [`decode_keypad_addresses`] extracts which keypads a panel message is
//!   addressed to.
//!
//! Around them sit a message parser ([`PanelMessage`]), a per-keypad alarm
//! panel ([`KeypadPanel`]), zone sensors ([`ZoneTracker`]), bypass switch
//! tracking ([`BypassSwitches`]) and a synchronous [`MessageBus`] used to
//! fan device messages out to keypads and zones.
//!
//! ## Quick Start
//!
//! ```no_run
//! use alarmdecoder_bridge::{
//!     ArmType, BypassSwitches, KeypadPanel, PanelMessage, PanelOptions, SocketConnection,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = PanelOptions::builder().keypads([0]).build();
//!     let mut keypad = KeypadPanel::new(0, &options);
//!     let mut switches = BypassSwitches::from_zones("panel", &options.zones);
//!
//!     let mut conn = SocketConnection::connect("192.168.0.50", 10000).await?;
//!     let sink = conn.sink();
//!
//!     switches.add_switch("panel", 5);
//!     switches.mark("panel", 5)?;
//!     keypad.arm(ArmType::Away, Some("1234"), &switches, "panel", &sink)?;
//!
//!     while let Some(line) = conn.next_line().await? {
//!         if let Ok(msg) = PanelMessage::parse(&line) {
//!             if keypad.handle_message(&msg) {
//!                 println!("Keypad 0: {:?}", keypad.state());
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod bypass;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod keypad;
pub mod message;
pub mod panel;
pub mod protocol;
pub mod transport;
pub mod zone;

// Re-exports for convenience
pub use bypass::{BypassRegistry, BypassSwitches, ZoneNumber, encode_bypass};
pub use config::{ArmType, PanelOptions, PanelOptionsBuilder, ZoneConfig};
pub use error::{BridgeError, Result};
pub use event::{MessageBus, SubscriptionId};
pub use keypad::{KeypadAddressSet, decode_keypad_addresses};
pub use message::{DeviceMessage, KeypadStatusFlags, MessageKind, PanelMessage, RfxMessage};
pub use panel::{AlarmState, CommandSink, KeypadAttributes, KeypadPanel};
pub use protocol::Command;
pub use transport::{ChannelSink, SocketConnection};
pub use zone::{ZoneSensor, ZoneTracker};
