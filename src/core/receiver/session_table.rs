//! The table of live receiver sessions, keyed by remote address.
//!
//! The receive loop is the only writer of a session's protocol state; the
//! periodic sweep only removes whole sessions, and handles only read. The map
//! is shared through a `DashMap` so observers never stall the receive loop.
//!
//! 按远程地址索引的活动接收会话表。
//!
//! 接收循环是会话协议状态的唯一写入者；周期性清理只移除整个会话，句柄只读取。

use super::session::{ReceiverSession, SessionOutcome};
use bytes::Bytes;
use dashmap::DashMap;
use std::{net::SocketAddr, sync::Arc};
use tokio::time::{Duration, Instant};
use tracing::{info, trace};

#[derive(Debug, Clone)]
pub(crate) struct SessionTable {
    sessions: Arc<DashMap<SocketAddr, ReceiverSession>>,
    idle_limit: Duration,
    max_buffered: u32,
}

impl SessionTable {
    pub(crate) fn new(idle_limit: Duration, max_buffered: u32) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            idle_limit,
            max_buffered,
        }
    }

    /// How many payloads a data packet `seq` from `from` would deliver, without
    /// touching the table. An unknown peer behaves like a fresh session.
    ///
    /// 来自 `from` 的数据包 `seq` 将交付的载荷数量，不修改会话表。
    pub(crate) fn deliverable_on(&self, from: &SocketAddr, seq: u32) -> usize {
        match self.sessions.get(from) {
            Some(session) => session.deliverable_on(seq),
            None => usize::from(seq == 0),
        }
    }

    /// Applies a data packet to the session for `from`, creating it on demand.
    ///
    /// The shard lock is released before this returns, so callers may await
    /// afterwards.
    ///
    /// 将数据包应用到 `from` 对应的会话，必要时创建该会话。
    pub(crate) fn on_data(
        &self,
        from: SocketAddr,
        seq: u32,
        payload: Bytes,
        now: Instant,
    ) -> SessionOutcome {
        let max_buffered = self.max_buffered;
        let mut session = self.sessions.entry(from).or_insert_with(|| {
            info!(addr = %from, "New receiver session");
            ReceiverSession::new(now, max_buffered)
        });
        session.on_data(seq, payload, now)
    }

    /// Removes every session idle for longer than the idle limit and returns
    /// how many were removed.
    ///
    /// 移除所有空闲超过限制的会话，并返回移除的数量。
    pub(crate) fn cleanup(&self, now: Instant) -> usize {
        let before_count = self.sessions.len();
        if before_count == 0 {
            return 0;
        }

        let idle_limit = self.idle_limit;
        self.sessions.retain(|addr, session| {
            let idle = session.is_idle(now, idle_limit);
            if idle {
                info!(
                    addr = %addr,
                    expected_seq = session.expected_seq(),
                    "Expiring idle receiver session"
                );
            }
            !idle
        });

        let removed = before_count.saturating_sub(self.sessions.len());
        if removed > 0 {
            trace!(cleaned_count = removed, "Cleaned up idle sessions.");
        }
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn expected_sequence(&self, addr: &SocketAddr) -> Option<u32> {
        self.sessions.get(addr).map(|session| session.expected_seq())
    }
}
