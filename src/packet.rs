//! The packet module, containing the wire format of data and acknowledgment packets.
//! packet 模块，包含数据包和确认包的线路格式。

pub mod frame;
pub mod header;

pub use frame::Packet;
pub use header::{HEADER_SIZE, Header};
