//! 定义固定长度的包头。
//! Defines the fixed-size packet header.

use crate::error::DecodeError;
use bytes::{Buf, BufMut};

/// The size of the encoded header in bytes: `seq (4) + is_ack (1) + payload_len (4)`.
/// 编码后头部的字节数：`seq (4) + is_ack (1) + payload_len (4)`。
pub const HEADER_SIZE: usize = 9;

const FLAG_DATA: u8 = 0;
const FLAG_ACK: u8 = 1;

/// The header preceding every packet on the wire. All fields are big-endian.
/// 线路上每个包之前的头部。所有字段均为大端序。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// The sequence number of a data packet, or the acknowledged sequence number.
    /// 数据包的序列号，或被确认的序列号。
    pub sequence_number: u32,
    /// Whether this is an acknowledgment packet.
    /// 是否为确认包。
    pub is_ack: bool,
    /// The number of payload bytes following the header.
    /// 头部之后载荷的字节数。
    pub payload_length: u32,
}

impl Header {
    /// 将头部编码到缓冲区。
    /// Encodes the header into a buffer.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.sequence_number);
        buf.put_u8(if self.is_ack { FLAG_ACK } else { FLAG_DATA });
        buf.put_u32(self.payload_length);
    }

    /// 从缓冲区解码头部。
    /// Decodes a header from a buffer.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, DecodeError> {
        if buf.remaining() < HEADER_SIZE {
            return Err(DecodeError::TruncatedHeader {
                len: buf.remaining(),
            });
        }
        let sequence_number = buf.get_u32();
        let is_ack = match buf.get_u8() {
            FLAG_DATA => false,
            FLAG_ACK => true,
            other => return Err(DecodeError::InvalidAckFlag(other)),
        };
        let payload_length = buf.get_u32();
        if is_ack && payload_length != 0 {
            return Err(DecodeError::AckWithPayload(payload_length));
        }
        Ok(Header {
            sequence_number,
            is_ack,
            payload_length,
        })
    }
}
