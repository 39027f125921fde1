//! Session management: the connection loop, channel wiring, and the
//! session recorder.

pub mod channels;
pub mod client;
pub mod recorder;

pub use channels::ChannelBundle;
pub use client::SessionClient;
pub use recorder::{RecorderConfig, SessionRecorder};
