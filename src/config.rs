//! 定义了发送端、接收端和协议的可配置参数。
//! Defines configurable parameters for the sender, the receiver and the protocol.

use crate::{
    error::{Error, Result},
    packet::header::HEADER_SIZE,
};
use std::time::Duration;

/// A structure containing all configurable parameters.
///
/// 包含所有可配置参数的结构体。
#[derive(Debug, Clone)]
pub struct Config {
    /// Sender-related parameters.
    /// 发送端相关参数。
    pub sender: SenderConfig,

    /// Receiver-related parameters.
    /// 接收端相关参数。
    pub receiver: ReceiverConfig,

    /// The largest datagram, header included, that is ever written to or read
    /// from the transport.
    /// 写入或读取传输层的最大数据报大小（含头部）。
    pub max_datagram_size: usize,
}

/// Sender-related parameters.
///
/// 发送端相关参数。
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Upper bound on outstanding, unacknowledged packets.
    /// 未确认的在途数据包数量上限。
    pub window_size: u32,
    /// Age of the oldest unacknowledged packet that triggers a retransmission
    /// of the whole window.
    /// 触发整个窗口重传的最早未确认包的存活时间。
    pub timeout: Duration,
    /// Payload size used when splitting a byte stream into chunks.
    /// 将字节流切分为数据块时使用的载荷大小。
    pub chunk_size: usize,
}

/// Receiver-related parameters.
///
/// 接收端相关参数。
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// How long a session may stay idle before it is reclaimed.
    /// 会话在被回收前可以保持空闲的时长。
    pub session_idle_limit: Duration,
    /// The interval at which idle sessions are swept.
    /// 清理空闲会话的周期。
    pub sweep_interval: Duration,
    /// Capacity of the channel that hands delivered payloads to the application.
    /// A data packet whose deliveries do not fit in the free capacity is
    /// dropped unacknowledged and left to retransmission.
    /// 向应用交付载荷的通道容量。
    /// 空闲容量放不下其交付内容的数据包会被丢弃且不确认，交由重传恢复。
    pub delivery_channel_capacity: usize,
    /// How far ahead of the expected sequence number a session buffers
    /// out-of-order packets. Must stay below `delivery_channel_capacity`.
    /// 会话缓存乱序数据包时可超前期望序列号的最大距离。
    /// 必须小于 `delivery_channel_capacity`。
    pub max_buffered_packets: u32,
}

impl Config {
    /// The largest payload a single data packet may carry under this config.
    ///
    /// 此配置下单个数据包可携带的最大载荷。
    pub fn max_payload_size(&self) -> usize {
        self.max_datagram_size.saturating_sub(HEADER_SIZE)
    }

    /// Checks the configuration for values the engines cannot operate with.
    ///
    /// 检查引擎无法使用的配置值。
    pub fn validate(&self) -> Result<()> {
        if self.sender.window_size == 0 {
            return Err(Error::InvalidConfig("window_size must be positive".into()));
        }
        if self.sender.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be positive".into()));
        }
        if self.sender.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.sender.chunk_size > self.max_payload_size() {
            return Err(Error::InvalidConfig(format!(
                "chunk_size {} does not fit a {} byte datagram",
                self.sender.chunk_size, self.max_datagram_size
            )));
        }
        if self.receiver.sweep_interval.is_zero() {
            return Err(Error::InvalidConfig("sweep_interval must be positive".into()));
        }
        if self.receiver.delivery_channel_capacity == 0 {
            return Err(Error::InvalidConfig(
                "delivery_channel_capacity must be positive".into(),
            ));
        }
        // An in-order packet may release every buffered successor at once.
        if self.receiver.max_buffered_packets as usize >= self.receiver.delivery_channel_capacity {
            return Err(Error::InvalidConfig(format!(
                "max_buffered_packets {} must be below delivery_channel_capacity {}",
                self.receiver.max_buffered_packets, self.receiver.delivery_channel_capacity
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sender: SenderConfig::default(),
            receiver: ReceiverConfig::default(),
            max_datagram_size: 1024,
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            window_size: 4,
            timeout: Duration::from_secs(2),
            chunk_size: 100,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            session_idle_limit: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
            delivery_channel_capacity: 1024,
            max_buffered_packets: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_payload_size(), 1024 - HEADER_SIZE);
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let mut config = Config::default();
        config.sender.window_size = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.sender.timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.sender.chunk_size = config.max_datagram_size;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.receiver.sweep_interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.receiver.delivery_channel_capacity = 4;
        config.receiver.max_buffered_packets = 4;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        config.receiver.max_buffered_packets = 3;
        assert!(config.validate().is_ok());
    }
}
