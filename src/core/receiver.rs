//! The Go-Back-N receiver engine.
//!
//! One [`GbnReceiver`] serves any number of remote senders at once. Each remote
//! address gets its own independent [`ReceiverSession`]; payloads are delivered
//! in order through a channel, and acknowledgments are written back over the
//! same transport the data arrived on.
//!
//! Go-Back-N 接收端引擎。
//!
//! 一个 [`GbnReceiver`] 可同时服务任意数量的远程发送端。每个远程地址拥有独立的
//! [`ReceiverSession`]；载荷通过通道按序交付，确认通过数据到达的同一传输写回。

pub mod session;
mod session_table;

use crate::{
    config::Config,
    error::{Error, Result},
    packet::Packet,
    transport::{BindableTransport, DatagramTransport},
};
use bytes::Bytes;
use session_table::SessionTable;
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot,
    },
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, error, info, trace};

pub use session::{Arrival, ReceiverSession, SessionOutcome};

/// A payload delivered in order to the application.
///
/// 按序交付给应用的载荷。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The remote address the payload came from.
    /// 载荷来源的远程地址。
    pub from: SocketAddr,
    pub sequence_number: u32,
    pub payload: Bytes,
}

/// The receiving side of the protocol, multiplexing sessions by source address.
///
/// 协议的接收端，按源地址复用会话。
pub struct GbnReceiver<T: DatagramTransport> {
    transport: Arc<T>,
    sessions: SessionTable,
    delivery_tx: mpsc::Sender<Delivery>,
    config: Arc<Config>,
}

impl<T: DatagramTransport> GbnReceiver<T> {
    /// Creates a receiver over `transport` and the channel its deliveries
    /// arrive on.
    ///
    /// 在 `transport` 上创建接收端，并返回接收交付数据的通道。
    pub fn new(transport: Arc<T>, config: Config) -> Result<(Self, mpsc::Receiver<Delivery>)> {
        config.validate()?;
        let (delivery_tx, delivery_rx) =
            mpsc::channel(config.receiver.delivery_channel_capacity);
        let receiver = Self {
            transport,
            sessions: SessionTable::new(
                config.receiver.session_idle_limit,
                config.receiver.max_buffered_packets,
            ),
            delivery_tx,
            config: Arc::new(config),
        };
        Ok((receiver, delivery_rx))
    }

    /// Spawns the receive loop on the current runtime.
    ///
    /// 在当前运行时上启动接收循环。
    pub fn spawn(
        transport: Arc<T>,
        config: Config,
    ) -> Result<(ReceiverHandle, mpsc::Receiver<Delivery>)> {
        let local_addr = transport.local_addr()?;
        let (receiver, delivery_rx) = Self::new(transport, config)?;
        let sessions = receiver.sessions.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = receiver
                .run(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = &result {
                error!(addr = %local_addr, "Receive loop terminated: {}", e);
            }
            result
        });

        let handle = ReceiverHandle {
            local_addr,
            sessions,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        };
        Ok((handle, delivery_rx))
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The next sequence number expected from `addr`, if a session exists.
    pub fn expected_sequence(&self, addr: &SocketAddr) -> Option<u32> {
        self.sessions.expected_sequence(addr)
    }

    /// Removes every session idle beyond the configured limit.
    ///
    /// 移除所有空闲超过配置限制的会话。
    pub fn sweep_idle_sessions(&self) -> usize {
        self.sessions.cleanup(Instant::now())
    }

    /// Runs the receive loop until `shutdown` resolves or the transport fails.
    ///
    /// Idle sessions are swept every `sweep_interval` from the same loop.
    ///
    /// 运行接收循环，直到 `shutdown` 完成或传输失败。
    /// 空闲会话每隔 `sweep_interval` 在同一循环中被清理。
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut sweep_interval = tokio::time::interval(self.config.receiver.sweep_interval);
        let mut recv_buf = vec![0u8; self.config.max_datagram_size];
        tokio::pin!(shutdown);

        info!(addr = ?self.transport.local_addr().ok(), "Receiver started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Receiver shutting down");
                    return Ok(());
                }
                received = self.transport.recv_from(&mut recv_buf) => {
                    let (len, from) = received?;
                    self.on_datagram(from, &recv_buf[..len]).await?;
                }
                _ = sweep_interval.tick() => {
                    self.sweep_idle_sessions();
                }
            }
        }
    }

    /// Handles one inbound datagram: decodes it, updates the sender's session,
    /// delivers whatever became deliverable and sends the acknowledgment.
    ///
    /// Undecodable datagrams and acknowledgments are discarded. A data packet
    /// whose deliveries do not fit in the free capacity of the delivery channel
    /// is discarded too, unacknowledged and without touching its session, so a
    /// slow application never stalls the loop; the sender retransmits it. Only
    /// transport failures and a closed delivery channel are returned as errors.
    ///
    /// 处理一个入站数据报：解码、更新发送方会话、交付可交付的数据并发送确认。
    /// 无法解码的数据报和确认包会被丢弃。
    /// 交付通道空闲容量不足时，数据包同样被丢弃，不确认也不修改会话，由发送端重传。
    pub async fn on_datagram(&self, from: SocketAddr, datagram: &[u8]) -> Result<()> {
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(
                    addr = %from,
                    bytes = datagram.len(),
                    "Discarding undecodable datagram: {}",
                    e
                );
                return Ok(());
            }
        };
        if packet.is_ack {
            trace!(
                addr = %from,
                ack = packet.sequence_number,
                "Ignoring acknowledgment on receiver"
            );
            return Ok(());
        }

        let seq = packet.sequence_number;
        let deliverable = self.sessions.deliverable_on(&from, seq);
        let mut permits = if deliverable > 0 {
            match self.delivery_tx.try_reserve_many(deliverable) {
                Ok(permits) => Some(permits),
                Err(TrySendError::Full(())) => {
                    debug!(
                        addr = %from,
                        seq,
                        deliverable,
                        "Delivery channel full, dropping packet for retransmission"
                    );
                    return Ok(());
                }
                Err(TrySendError::Closed(())) => return Err(Error::ChannelClosed),
            }
        } else {
            None
        };

        let outcome = self
            .sessions
            .on_data(from, seq, packet.payload, Instant::now());

        match outcome.arrival {
            Arrival::InOrder => {
                debug!(addr = %from, seq, delivered = outcome.delivered.len(), "In-order packet")
            }
            Arrival::Duplicate => debug!(addr = %from, seq, "Duplicate packet, re-acknowledging"),
            Arrival::OutOfOrder => debug!(addr = %from, seq, "Out-of-order packet buffered"),
            Arrival::BeyondBuffer => {
                debug!(addr = %from, seq, "Packet beyond the reorder buffer dropped")
            }
        }

        // Only this loop sends on the channel, so the reservation covers
        // exactly the payloads the session released.
        for (sequence_number, payload) in outcome.delivered {
            let permit = permits
                .as_mut()
                .and_then(|permits| permits.next())
                .ok_or(Error::ChannelClosed)?;
            permit.send(Delivery {
                from,
                sequence_number,
                payload,
            });
        }
        drop(permits);

        if let Some(ack) = outcome.ack {
            self.transport
                .send_to(&Packet::ack(ack).to_bytes(), from)
                .await?;
            trace!(addr = %from, ack, "Sent acknowledgment");
        }
        Ok(())
    }
}

impl<T: BindableTransport> GbnReceiver<T> {
    /// Binds a transport at `addr` and spawns a receiver on it.
    ///
    /// 在 `addr` 绑定传输并在其上启动接收端。
    pub async fn bind(
        addr: SocketAddr,
        config: Config,
    ) -> Result<(ReceiverHandle, mpsc::Receiver<Delivery>)> {
        let transport = T::bind(addr).await?;
        Self::spawn(Arc::new(transport), config)
    }
}

/// A handle to a spawned receive loop.
///
/// Dropping the handle stops the loop and releases the transport.
///
/// 已启动接收循环的句柄。丢弃句柄会停止循环并释放传输。
#[derive(Debug)]
pub struct ReceiverHandle {
    local_addr: SocketAddr,
    sessions: SessionTable,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<()>>>,
}

impl ReceiverHandle {
    /// The address senders should send to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The next sequence number expected from `addr`, if a session exists.
    pub fn expected_sequence(&self, addr: &SocketAddr) -> Option<u32> {
        self.sessions.expected_sequence(addr)
    }

    /// `true` once the receive loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Stops the receive loop and waits for it to exit, returning the error
    /// that ended it, if any.
    ///
    /// 停止接收循环并等待其退出，返回导致其结束的错误（如果有）。
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => task.await.map_err(|_| Error::ChannelClosed)?,
            None => Ok(()),
        }
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
