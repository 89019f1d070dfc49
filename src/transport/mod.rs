// MIT License - Copyright (c) 2021 TJForc
// Transports

pub mod socket;

pub use socket::{ChannelSink, SocketConnection};
