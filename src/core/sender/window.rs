//! The Go-Back-N sliding window: pure state, no I/O.
//!
//! ```text
//!   base              next_seq         base + window_size
//!    │                   │                   │
//! ───┼───────────────────┼───────────────────┼──────▶ seq space
//!    │ <── in flight ──▶ │ <── sendable ───▶ │
//! ```
//!
//! Go-Back-N 滑动窗口：纯状态，不含I/O。

use bytes::Bytes;
use std::collections::BTreeMap;
use tokio::time::{Duration, Instant};

/// An unacknowledged packet kept for retransmission.
///
/// 为重传而保留的未确认数据包。
#[derive(Debug, Clone)]
pub(crate) struct InFlightPacket {
    pub(crate) payload: Bytes,
    /// Time of the most recent (re)transmission.
    /// 最近一次（重）传输的时间。
    pub(crate) sent_at: Instant,
}

/// The result of applying a cumulative acknowledgment to the window.
///
/// 将累积确认应用到窗口的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The window slid forward; `acked` packets left `in_flight`.
    /// 窗口向前滑动；`acked` 个数据包离开了在途集合。
    Advanced { acked: u32 },
    /// The acknowledgment was below `base` and changed nothing.
    /// 确认号低于 `base`，没有任何改变。
    Stale,
    /// The acknowledgment named a sequence number that was never sent.
    /// 确认号指向从未发送过的序列号。
    Unsent,
}

/// Sender-side window state for one transmission.
///
/// Invariants: `base <= next_seq <= base + window_size`, and the keys of
/// `in_flight` are exactly `base..next_seq`.
///
/// 单次传输的发送端窗口状态。
#[derive(Debug)]
pub struct SenderWindow {
    base: u32,
    next_seq: u32,
    window_size: u32,
    timeout: Duration,
    in_flight: BTreeMap<u32, InFlightPacket>,
}

impl SenderWindow {
    /// Creates an empty window whose first packet will carry `start_seq`.
    pub fn new(start_seq: u32, window_size: u32, timeout: Duration) -> Self {
        Self {
            base: start_seq,
            next_seq: start_seq,
            window_size,
            timeout,
            in_flight: BTreeMap::new(),
        }
    }

    /// The oldest unacknowledged sequence number.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// The sequence number the next new packet will use.
    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Number of packets awaiting acknowledgment.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// `true` when there is room for at least one more packet.
    pub fn can_send(&self) -> bool {
        (self.next_seq as u64) < self.base as u64 + self.window_size as u64
    }

    /// Records a just-transmitted packet under `next_seq` and advances it.
    ///
    /// 记录刚发送的数据包（使用 `next_seq`）并推进 `next_seq`。
    pub fn record_sent(&mut self, payload: Bytes, now: Instant) -> u32 {
        debug_assert!(self.can_send(), "record_sent called on a full window");
        let seq = self.next_seq;
        self.in_flight.insert(
            seq,
            InFlightPacket {
                payload,
                sent_at: now,
            },
        );
        self.next_seq += 1;
        seq
    }

    /// Applies a cumulative acknowledgment for `ack_seq`.
    ///
    /// Every sequence number in `base..=ack_seq` counts as delivered.
    ///
    /// 对 `ack_seq` 应用累积确认。`base..=ack_seq` 中的所有序列号都视为已送达。
    pub fn on_ack(&mut self, ack_seq: u32) -> AckOutcome {
        if ack_seq < self.base {
            return AckOutcome::Stale;
        }
        if ack_seq >= self.next_seq {
            return AckOutcome::Unsent;
        }

        let new_base = ack_seq + 1;
        // `split_off` keeps `new_base..` in the returned map.
        let remaining = self.in_flight.split_off(&new_base);
        let acked = new_base - self.base;
        debug_assert_eq!(self.in_flight.len() as u32, acked);
        self.in_flight = remaining;
        self.base = new_base;
        AckOutcome::Advanced { acked }
    }

    /// When the oldest outstanding packet times out, if anything is in flight.
    ///
    /// 最早的在途数据包的超时时刻（如果有在途数据）。
    pub fn retransmission_deadline(&self) -> Option<Instant> {
        self.in_flight
            .values()
            .map(|packet| packet.sent_at)
            .min()
            .map(|sent_at| sent_at + self.timeout)
    }

    /// All outstanding packets in sequence order.
    pub fn outstanding(&self) -> impl Iterator<Item = (u32, &Bytes)> {
        self.in_flight
            .iter()
            .map(|(&seq, packet)| (seq, &packet.payload))
    }

    /// Refreshes `sent_at` of every outstanding packet after the whole window
    /// has been resent.
    ///
    /// 整个窗口重发后，刷新每个在途数据包的 `sent_at`。
    pub fn mark_retransmitted(&mut self, now: Instant) {
        for packet in self.in_flight.values_mut() {
            packet.sent_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_window(start: u32, window_size: u32, count: u32) -> (SenderWindow, Instant) {
        let now = Instant::now();
        let mut window = SenderWindow::new(start, window_size, Duration::from_secs(1));
        for i in 0..count {
            let seq = window.record_sent(Bytes::from(format!("chunk{i}")), now);
            assert_eq!(seq, start + i);
        }
        (window, now)
    }

    #[test]
    fn test_window_fills_up_to_size() {
        let (window, _) = filled_window(0, 3, 3);
        assert!(!window.can_send());
        assert_eq!(window.base(), 0);
        assert_eq!(window.next_seq(), 3);
        assert_eq!(window.in_flight_len(), 3);
    }

    #[test]
    fn test_cumulative_ack_slides_window() {
        let (mut window, _) = filled_window(10, 4, 4);

        assert_eq!(window.on_ack(11), AckOutcome::Advanced { acked: 2 });
        assert_eq!(window.base(), 12);
        let seqs: Vec<u32> = window.outstanding().map(|(seq, _)| seq).collect();
        assert_eq!(seqs, vec![12, 13]);
        assert!(window.can_send());

        assert_eq!(window.on_ack(13), AckOutcome::Advanced { acked: 2 });
        assert_eq!(window.base(), 14);
        assert_eq!(window.in_flight_len(), 0);
        assert_eq!(window.retransmission_deadline(), None);
    }

    #[test]
    fn test_stale_ack_leaves_state_unchanged() {
        let (mut window, _) = filled_window(0, 4, 4);
        window.on_ack(1);

        assert_eq!(window.on_ack(0), AckOutcome::Stale);
        assert_eq!(window.on_ack(1), AckOutcome::Stale);
        assert_eq!(window.base(), 2);
        assert_eq!(window.next_seq(), 4);
        assert_eq!(window.in_flight_len(), 2);
    }

    #[test]
    fn test_ack_for_unsent_sequence_is_rejected() {
        let (mut window, _) = filled_window(0, 4, 2);
        assert_eq!(window.on_ack(2), AckOutcome::Unsent);
        assert_eq!(window.on_ack(100), AckOutcome::Unsent);
        assert_eq!(window.base(), 0);
        assert_eq!(window.in_flight_len(), 2);
    }

    #[test]
    fn test_deadline_tracks_oldest_packet() {
        let (mut window, sent) = filled_window(0, 4, 2);
        let timeout = Duration::from_secs(1);
        assert_eq!(window.retransmission_deadline(), Some(sent + timeout));

        // Acknowledging the oldest packet does not move the deadline of the rest.
        let (mut partial, sent) = filled_window(0, 4, 2);
        partial.on_ack(0);
        assert_eq!(partial.retransmission_deadline(), Some(sent + timeout));

        let later = sent + Duration::from_millis(1500);
        window.mark_retransmitted(later);
        assert_eq!(window.retransmission_deadline(), Some(later + timeout));
    }
}
