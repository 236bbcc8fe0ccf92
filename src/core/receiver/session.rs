//! Per-peer receive state: in-order delivery, out-of-order buffering and the
//! choice of acknowledgment.
//!
//! 每个对端的接收状态：按序交付、乱序缓存以及确认号的选择。

use bytes::Bytes;
use std::collections::{BTreeMap, btree_map::Entry};
use tokio::time::{Duration, Instant};

/// How an incoming data packet related to the session's expected sequence.
///
/// 传入数据包与会话期望序列号之间的关系。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// `seq == expected_seq`.
    InOrder,
    /// `seq < expected_seq`: already delivered.
    Duplicate,
    /// `seq > expected_seq`: buffered until the gap is filled.
    OutOfOrder,
    /// `seq` is further ahead of `expected_seq` than the reorder buffer reaches.
    /// 超出重排缓冲区范围的未来序列号。
    BeyondBuffer,
}

/// The effect of one data packet on a session.
///
/// 单个数据包对会话产生的效果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub arrival: Arrival,
    /// Payloads that became deliverable, in sequence order.
    /// 变为可交付的载荷，按序列号排列。
    pub delivered: Vec<(u32, Bytes)>,
    /// The acknowledgment to send back, if any.
    /// 需要回送的确认号（如果有）。
    pub ack: Option<u32>,
}

/// Receive state for one remote endpoint.
///
/// `buffered` only ever holds sequence numbers in
/// `expected_seq + 1 ..= expected_seq + max_buffered`, so it never grows past
/// `max_buffered` entries.
///
/// 单个远端的接收状态。`buffered` 只保存
/// `expected_seq + 1 ..= expected_seq + max_buffered` 范围内的序列号。
#[derive(Debug)]
pub struct ReceiverSession {
    expected_seq: u32,
    buffered: BTreeMap<u32, Bytes>,
    max_buffered: u32,
    last_activity: Instant,
}

impl ReceiverSession {
    /// Creates a session expecting sequence number 0 that buffers at most
    /// `max_buffered` out-of-order packets.
    pub fn new(now: Instant, max_buffered: u32) -> Self {
        Self {
            expected_seq: 0,
            buffered: BTreeMap::new(),
            max_buffered,
            last_activity: now,
        }
    }

    /// The next sequence number that will be delivered.
    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    /// Number of out-of-order packets waiting for the gap to close.
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// How many payloads `on_data(seq, ..)` would deliver: the packet itself
    /// and its buffered successors when `seq` is the expected one, else none.
    ///
    /// `on_data(seq, ..)` 将交付的载荷数量。
    pub fn deliverable_on(&self, seq: u32) -> usize {
        if seq != self.expected_seq {
            return 0;
        }
        let successors = self
            .buffered
            .keys()
            .zip(seq.saturating_add(1)..)
            .take_while(|(buffered, next)| *buffered == next)
            .count();
        1 + successors
    }

    /// `true` if the session has been idle for longer than `limit` at `now`.
    pub fn is_idle(&self, now: Instant, limit: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > limit
    }

    /// Applies a data packet to the session.
    ///
    /// - In order: deliver it and every buffered successor; acknowledge only `seq`.
    /// - Duplicate: deliver nothing; acknowledge `seq` again.
    /// - Out of order: buffer it; repeat the last in-order acknowledgment, if any.
    ///   Packets beyond the reorder buffer are dropped the same way, unbuffered.
    ///
    /// 将数据包应用到会话：
    /// - 按序：交付它及其后所有已缓存的连续包；只确认 `seq`。
    /// - 重复：不交付；再次确认 `seq`。
    /// - 乱序：缓存；重复最后一个按序确认（如果有）。
    pub fn on_data(&mut self, seq: u32, payload: Bytes, now: Instant) -> SessionOutcome {
        self.last_activity = now;

        if seq < self.expected_seq {
            return SessionOutcome {
                arrival: Arrival::Duplicate,
                delivered: Vec::new(),
                ack: Some(seq),
            };
        }

        if seq > self.expected_seq {
            let arrival = if seq - self.expected_seq > self.max_buffered {
                Arrival::BeyondBuffer
            } else {
                if let Entry::Vacant(entry) = self.buffered.entry(seq) {
                    entry.insert(payload);
                }
                Arrival::OutOfOrder
            };
            return SessionOutcome {
                arrival,
                delivered: Vec::new(),
                ack: self.expected_seq.checked_sub(1),
            };
        }

        let mut delivered = vec![(seq, payload)];
        self.expected_seq = self.expected_seq.saturating_add(1);
        while let Some(payload) = self.buffered.remove(&self.expected_seq) {
            delivered.push((self.expected_seq, payload));
            self.expected_seq = self.expected_seq.saturating_add(1);
        }
        SessionOutcome {
            arrival: Arrival::InOrder,
            delivered,
            ack: Some(seq),
        }
    }
}
