//! 定义了可以在网络上传输的完整数据包。
//! Defines the complete packets that can be transmitted over the network.

use super::header::{HEADER_SIZE, Header};
use crate::error::DecodeError;
use bytes::{BufMut, Bytes, BytesMut};

/// A decoded data or acknowledgment packet.
/// 已解码的数据包或确认包。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub sequence_number: u32,
    pub is_ack: bool,
    /// Always empty for acknowledgments.
    /// 确认包的载荷总是为空。
    pub payload: Bytes,
}

impl Packet {
    /// The largest payload the 32-bit length field can describe.
    pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

    /// Creates a data packet.
    /// 创建一个数据包。
    pub fn data(sequence_number: u32, payload: Bytes) -> Self {
        Self {
            sequence_number,
            is_ack: false,
            payload,
        }
    }

    /// Creates an acknowledgment packet for `sequence_number`.
    /// 为 `sequence_number` 创建一个确认包。
    pub fn ack(sequence_number: u32) -> Self {
        Self {
            sequence_number,
            is_ack: true,
            payload: Bytes::new(),
        }
    }

    /// Returns the header describing this packet.
    pub fn header(&self) -> Header {
        debug_assert!(self.payload.len() <= Self::MAX_PAYLOAD_LEN);
        Header {
            sequence_number: self.sequence_number,
            is_ack: self.is_ack,
            payload_length: self.payload.len() as u32,
        }
    }

    /// The number of bytes `encode` writes.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// 将包编码到缓冲区。
    /// Encodes the packet into a buffer.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        self.header().encode(buf);
        buf.put_slice(&self.payload);
    }

    /// Encodes the packet into a freshly allocated buffer.
    ///
    /// 将包编码到新分配的缓冲区中。
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decodes a packet from a complete datagram.
    ///
    /// Bytes beyond the declared payload length are ignored. A datagram that
    /// carries fewer payload bytes than declared is rejected.
    ///
    /// 从完整的数据报解码一个包。
    ///
    /// 超出声明载荷长度的字节将被忽略。实际载荷少于声明长度的数据报将被拒绝。
    pub fn decode(datagram: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = datagram;
        let header = Header::decode(&mut cursor)?;
        let declared = header.payload_length as usize;
        if cursor.len() < declared {
            return Err(DecodeError::TruncatedPayload {
                declared: header.payload_length,
                available: cursor.len(),
            });
        }
        Ok(Packet {
            sequence_number: header.sequence_number,
            is_ack: header.is_ack,
            payload: Bytes::copy_from_slice(&cursor[..declared]),
        })
    }
}
