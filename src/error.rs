//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The reasons a received datagram could not be decoded into a packet.
/// 接收到的数据报无法解码为包的原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than the fixed header size were present.
    /// 数据少于固定头部长度。
    #[error("datagram of {len} bytes is shorter than the packet header")]
    TruncatedHeader { len: usize },

    /// The header declared more payload bytes than the datagram carries.
    /// 头部声明的载荷长度超过了数据报实际携带的字节数。
    #[error("payload truncated: header declares {declared} bytes, {available} available")]
    TruncatedPayload { declared: u32, available: usize },

    /// The acknowledgment flag byte was neither 0 nor 1.
    /// 确认标志字节既不是0也不是1。
    #[error("invalid acknowledgment flag {0:#04x}")]
    InvalidAckFlag(u8),

    /// An acknowledgment packet declared a non-empty payload.
    /// 确认包声明了非空载荷。
    #[error("acknowledgment packet declares a {0} byte payload")]
    AckWithPayload(u32),
}

/// The primary error type for the Go-Back-N protocol library.
/// Go-Back-N 协议库的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O error occurred on the datagram transport.
    /// 数据报传输发生了底层的I/O错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The supplied configuration cannot be used.
    /// 提供的配置无法使用。
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A chunk does not fit into a single datagram.
    /// 数据块无法放入单个数据报。
    #[error("chunk of {len} bytes exceeds the maximum payload of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    /// The 32-bit sequence space cannot number every chunk of the transfer.
    /// 32位序列号空间不足以为本次传输的所有数据块编号。
    #[error("sequence number space exhausted")]
    SequenceSpaceExhausted,

    /// The operation was stopped by the caller.
    /// 操作被调用方停止。
    #[error("Operation cancelled")]
    Cancelled,

    /// An internal channel for communication between tasks was closed unexpectedly.
    /// 用于任务间通信的内部通道意外关闭。
    #[error("Internal channel is broken")]
    ChannelClosed,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::InvalidConfig(msg) => std::io::Error::new(ErrorKind::InvalidInput, msg),
            Error::PayloadTooLarge { .. } => ErrorKind::InvalidInput.into(),
            Error::SequenceSpaceExhausted => ErrorKind::InvalidInput.into(),
            Error::Cancelled => ErrorKind::Interrupted.into(),
            Error::ChannelClosed => ErrorKind::BrokenPipe.into(),
        }
    }
}
