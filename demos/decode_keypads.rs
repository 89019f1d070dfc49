// MIT License - Copyright (c) 2026 Peter Wright
// Print the keypad addresses of AlarmDecoder messages read from stdin
//
//   nc 192.168.0.50 10000 | cargo run --example decode_keypads

use std::io::BufRead;

use alarmdecoder_bridge::{MessageKind, PanelMessage, decode_keypad_addresses};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if MessageKind::classify(&line) != MessageKind::Keypad {
            continue;
        }

        match decode_keypad_addresses(&line) {
            Ok(keypads) => {
                let text = PanelMessage::parse(&line)
                    .map(|msg| msg.text)
                    .unwrap_or_default();
                println!("{keypads:?} {text}");
            }
            Err(e) => eprintln!("{e}: {line}"),
        }
    }
    Ok(())
}
