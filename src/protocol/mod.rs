//! Telnet protocol handling: stream filtering, decoding, line codec.

pub mod codec;
pub mod sanitize;
pub mod telnet;

pub use codec::{new_session_connection, SessionConnection, TelnetCodec};
pub use sanitize::sanitize;
