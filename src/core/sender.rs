//! The Go-Back-N sender engine.
//!
//! A single `send` future owns the [`SenderWindow`] and multiplexes the three
//! sender duties with `tokio::select!`:
//!
//! 1. transmit: refill the window with new chunks after every event,
//! 2. acknowledgment: slide the window on cumulative acknowledgments,
//! 3. timeout: when the oldest outstanding packet expires, resend the whole
//!    outstanding window.
//!
//! Because the window never leaves that future, every read and mutation of it
//! happens in one critical section.
//!
//! Go-Back-N 发送端引擎。
//!
//! 单个 `send` future 拥有 [`SenderWindow`]，并使用 `tokio::select!` 复用发送端的
//! 三项职责：发送、确认处理和超时重传。由于窗口从不离开该 future，
//! 对它的所有读写都发生在同一个临界区内。

pub mod window;

use crate::{
    config::Config,
    core::chunker::split_into_chunks,
    error::{Error, Result},
    packet::Packet,
    transport::{BindableTransport, DatagramTransport},
};
use bytes::Bytes;
use std::{
    future::{Future, pending},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    path::Path,
    sync::Arc,
};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

pub use window::{AckOutcome, SenderWindow};

/// Statistics of one completed transfer.
///
/// 一次已完成传输的统计信息。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Chunks handed to `send`, all of them acknowledged.
    /// 交给 `send` 的数据块数量，全部已被确认。
    pub chunks: u32,
    /// Data datagrams written to the transport, retransmissions included.
    /// 写入传输层的数据报数量，包括重传。
    pub transmissions: u64,
    /// How many times the retransmission timer fired.
    /// 重传定时器触发的次数。
    pub retransmission_rounds: u64,
    /// Data datagrams written by retransmission rounds.
    /// 重传轮次写出的数据报数量。
    pub retransmitted: u64,
}

/// The sending side of a Go-Back-N connection to one remote address.
///
/// Sequence numbers are never reused: each `send` starts a fresh window at the
/// sequence number following the previous transfer, including a transfer that
/// was stopped before completion.
///
/// 连接到某个远程地址的 Go-Back-N 发送端。
///
/// 序列号从不重复使用：每次 `send` 都会在上一次传输之后的序列号处开启新窗口，
/// 即使上一次传输在完成前被停止。
///
/// The receiver does not know about transfers: it only expects the next
/// number of its session. A transfer that starts past that number never
/// completes and retransmits until stopped. This happens after a stopped
/// transfer left sequence numbers unacknowledged, or after the receiver swept
/// the session for idleness, since a fresh session expects 0 again. Create a
/// new `GbnSender` (on a new local address) to start over in those cases.
///
/// 接收端并不了解传输的边界，只期望其会话的下一个序列号。起始序列号超过该值的传输
/// 永远不会完成，并会一直重传直到被停止。这会发生在被停止的传输遗留了未确认的序列号之后，
/// 或接收端因空闲清理了会话之后（新会话重新期望 0）。此时应在新的本地地址上创建新的
/// `GbnSender` 重新开始。
pub struct GbnSender<T: DatagramTransport> {
    transport: Arc<T>,
    remote_addr: SocketAddr,
    config: Arc<Config>,
    next_sequence: u32,
}

impl<T: BindableTransport> GbnSender<T> {
    /// Binds a transport on an ephemeral port and creates a sender for `remote_addr`.
    ///
    /// 在临时端口上绑定传输，并为 `remote_addr` 创建发送端。
    pub async fn connect(remote_addr: SocketAddr, config: Config) -> Result<Self> {
        let local_addr = match remote_addr.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let transport = T::bind(local_addr).await?;
        Self::new(Arc::new(transport), remote_addr, config)
    }
}

impl<T: DatagramTransport> GbnSender<T> {
    /// Creates a sender that transmits to `remote_addr` over `transport`.
    ///
    /// 创建一个通过 `transport` 向 `remote_addr` 发送数据的发送端。
    pub fn new(transport: Arc<T>, remote_addr: SocketAddr, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            remote_addr,
            config: Arc::new(config),
            next_sequence: 0,
        })
    }

    /// The address acknowledgments are accepted from and data is sent to.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// The local address of the underlying transport.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The sequence number the next transfer will start at.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Sends `chunks` in order and resolves once every one is acknowledged.
    ///
    /// Loss is retried indefinitely; only transport failures are returned.
    /// Callers that need a deadline should use [`GbnSender::send_until`] or
    /// drop the future.
    ///
    /// 按顺序发送 `chunks`，在全部被确认后返回。
    ///
    /// 丢包会被无限重试；只有传输层故障会被返回。
    pub async fn send(&mut self, chunks: Vec<Bytes>) -> Result<SendReport> {
        self.send_until(chunks, pending::<()>()).await
    }

    /// Splits `data` with the configured `chunk_size` and sends the chunks.
    ///
    /// 使用配置的 `chunk_size` 切分 `data` 并发送。
    pub async fn send_bytes(&mut self, data: Bytes) -> Result<SendReport> {
        let chunks = split_into_chunks(data, self.config.sender.chunk_size);
        self.send(chunks).await
    }

    /// Reads the file at `path` and sends its contents.
    ///
    /// 读取 `path` 处的文件并发送其内容。
    pub async fn send_file(&mut self, path: impl AsRef<Path>) -> Result<SendReport> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        info!(path = %path.display(), bytes = contents.len(), "Sending file");
        self.send_bytes(Bytes::from(contents)).await
    }

    /// Like [`GbnSender::send`], but gives up with [`Error::Cancelled`] as soon
    /// as `stop` resolves. No further datagrams are sent after the stop.
    ///
    /// 与 [`GbnSender::send`] 相同，但一旦 `stop` 完成就以 [`Error::Cancelled`] 放弃。
    /// 停止后不再发送任何数据报。
    pub async fn send_until<F>(&mut self, chunks: Vec<Bytes>, stop: F) -> Result<SendReport>
    where
        F: Future<Output = ()>,
    {
        let max_payload = self.config.max_payload_size();
        if let Some(chunk) = chunks.iter().find(|chunk| chunk.len() > max_payload) {
            return Err(Error::PayloadTooLarge {
                len: chunk.len(),
                max: max_payload,
            });
        }

        let start = self.next_sequence;
        let count = u32::try_from(chunks.len()).map_err(|_| Error::SequenceSpaceExhausted)?;
        let end = start
            .checked_add(count)
            .ok_or(Error::SequenceSpaceExhausted)?;

        let mut window = SenderWindow::new(
            start,
            self.config.sender.window_size,
            self.config.sender.timeout,
        );
        let mut report = SendReport {
            chunks: count,
            ..SendReport::default()
        };

        info!(
            addr = %self.remote_addr,
            chunks = count,
            first_seq = start,
            window_size = self.config.sender.window_size,
            "Starting transfer"
        );

        let outcome = self
            .drive(&mut window, chunks, end, stop, &mut report)
            .await;
        self.next_sequence = window.next_seq();

        match outcome {
            Ok(()) => {
                info!(
                    addr = %self.remote_addr,
                    chunks = report.chunks,
                    transmissions = report.transmissions,
                    retransmission_rounds = report.retransmission_rounds,
                    "Transfer complete"
                );
                Ok(report)
            }
            Err(Error::Cancelled) => {
                info!(
                    addr = %self.remote_addr,
                    base = window.base(),
                    next_seq = window.next_seq(),
                    "Transfer stopped by caller"
                );
                Err(Error::Cancelled)
            }
            Err(e) => {
                warn!(addr = %self.remote_addr, "Transfer failed: {}", e);
                Err(e)
            }
        }
    }

    /// Runs the event loop until `base` reaches `end`.
    async fn drive<F>(
        &self,
        window: &mut SenderWindow,
        chunks: Vec<Bytes>,
        end: u32,
        stop: F,
        report: &mut SendReport,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut pending_chunks = chunks.into_iter();
        let mut recv_buf = vec![0u8; self.config.max_datagram_size];
        tokio::pin!(stop);

        loop {
            // 1. Transmit duty: fill the window.
            // 1. 发送职责：填满窗口。
            while window.can_send() {
                let Some(chunk) = pending_chunks.next() else {
                    break;
                };
                let seq = window.record_sent(chunk.clone(), Instant::now());
                self.transmit(seq, chunk, report).await?;
            }

            if window.base() == end {
                return Ok(());
            }

            let deadline = window.retransmission_deadline();
            let retransmission_timer = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => pending::<()>().await,
                }
            };

            tokio::select! {
                _ = &mut stop => {
                    return Err(Error::Cancelled);
                }
                // 2. Acknowledgment duty.
                // 2. 确认职责。
                received = self.transport.recv_from(&mut recv_buf) => {
                    let (len, from) = received?;
                    self.handle_datagram(window, &recv_buf[..len], from);
                }
                // 3. Timeout duty: go back N.
                // 3. 超时职责：回退N步。
                _ = retransmission_timer => {
                    self.retransmit_window(window, report).await?;
                }
            }
        }
    }

    fn handle_datagram(&self, window: &mut SenderWindow, datagram: &[u8], from: SocketAddr) {
        if from != self.remote_addr {
            trace!(addr = %from, "Ignoring datagram from unexpected peer");
            return;
        }
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(addr = %from, "Discarding undecodable datagram: {}", e);
                return;
            }
        };
        if !packet.is_ack {
            trace!(seq = packet.sequence_number, "Ignoring data packet on sender");
            return;
        }

        let ack_seq = packet.sequence_number;
        let old_base = window.base();
        match window.on_ack(ack_seq) {
            AckOutcome::Advanced { acked } => {
                debug!(
                    ack = ack_seq,
                    old_base,
                    new_base = window.base(),
                    acked,
                    "Window slid forward"
                );
            }
            AckOutcome::Stale => {
                trace!(ack = ack_seq, base = old_base, "Ignoring stale acknowledgment");
            }
            AckOutcome::Unsent => {
                warn!(
                    ack = ack_seq,
                    next_seq = window.next_seq(),
                    "Ignoring acknowledgment for a sequence number that was never sent"
                );
            }
        }
    }

    async fn retransmit_window(
        &self,
        window: &mut SenderWindow,
        report: &mut SendReport,
    ) -> Result<()> {
        let outstanding: Vec<(u32, Bytes)> = window
            .outstanding()
            .map(|(seq, payload)| (seq, payload.clone()))
            .collect();
        debug!(
            base = window.base(),
            next_seq = window.next_seq(),
            count = outstanding.len(),
            "Retransmission timeout, resending outstanding window"
        );

        report.retransmission_rounds += 1;
        for (seq, payload) in outstanding {
            self.transmit(seq, payload, report).await?;
            report.retransmitted += 1;
        }
        window.mark_retransmitted(Instant::now());
        Ok(())
    }

    async fn transmit(&self, seq: u32, payload: Bytes, report: &mut SendReport) -> Result<()> {
        let packet = Packet::data(seq, payload);
        self.transport
            .send_to(&packet.to_bytes(), self.remote_addr)
            .await?;
        report.transmissions += 1;
        trace!(seq, bytes = packet.payload.len(), "Sent data packet");
        Ok(())
    }
}
