//! A fault-injecting transport decorator used to exercise the protocol under
//! adverse network conditions.
//!
//! Every outbound datagram is dropped with probability `loss_rate`; surviving
//! datagrams are forwarded after a random delay drawn from `delay_range`, on a
//! spawned task, so later datagrams may overtake earlier ones. The protocol
//! engines never reference this type: it is plugged in wherever a
//! [`DatagramTransport`] is expected.
//!
//! 用于在恶劣网络条件下测试协议的故障注入传输装饰器。
//!
//! 每个出站数据报以 `loss_rate` 的概率被丢弃；未被丢弃的数据报在从 `delay_range`
//! 中随机选取的延迟之后由独立任务转发，因此后发的数据报可能先到达。

use super::DatagramTransport;
use crate::{error::Result, packet::Packet};
use async_trait::async_trait;
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tracing::{debug, trace, warn};

/// A predicate over decoded outbound packets. Return `true` to keep the
/// packet, `false` to drop it.
///
/// 作用于已解码出站包的谓词。返回 `true` 保留该包，返回 `false` 丢弃。
pub type PacketFilter = Arc<dyn Fn(&Packet) -> bool + Send + Sync>;

/// Configuration for the fault-injection model.
///
/// 故障注入模型的配置。
#[derive(Debug, Clone)]
pub struct ImpairmentConfig {
    /// Probability in `[0.0, 1.0]` that a datagram is silently dropped.
    /// 数据报被静默丢弃的概率，取值 `[0.0, 1.0]`。
    pub loss_rate: f64,
    /// Inclusive range the forwarding delay is drawn from.
    /// 转发延迟的取值范围（闭区间）。
    pub delay_range: (Duration, Duration),
}

impl Default for ImpairmentConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            delay_range: (Duration::ZERO, Duration::ZERO),
        }
    }
}

impl ImpairmentConfig {
    /// A lossy link without added delay.
    pub fn lossy(loss_rate: f64) -> Self {
        Self {
            loss_rate,
            ..Self::default()
        }
    }

    fn random_delay(&self) -> Duration {
        let (min, max) = self.delay_range;
        let (min, max) = (min.as_nanos() as u64, max.as_nanos() as u64);
        if min >= max {
            return Duration::from_nanos(min);
        }
        Duration::from_nanos(rand::random_range(min..=max))
    }

    fn should_drop(&self) -> bool {
        self.loss_rate > 0.0 && rand::random::<f64>() < self.loss_rate
    }
}

/// Counters kept by an [`ImpairedTransport`].
///
/// [`ImpairedTransport`] 维护的计数器。
#[derive(Debug, Default)]
pub struct ImpairmentStats {
    received: AtomicU64,
    dropped: AtomicU64,
    forwarded: AtomicU64,
}

impl ImpairmentStats {
    /// Datagrams handed to the transport for sending.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Datagrams discarded by the loss model or the filter.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Datagrams passed on to the inner transport.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }
}

/// A transport that applies loss and delay to everything it sends.
///
/// 对所有发送的数据应用丢包和延迟的传输。
pub struct ImpairedTransport<T: DatagramTransport> {
    inner: Arc<T>,
    config: ImpairmentConfig,
    filter: Option<PacketFilter>,
    stats: Arc<ImpairmentStats>,
}

impl<T: DatagramTransport> ImpairedTransport<T> {
    /// Wraps `inner` with the given fault model.
    ///
    /// 使用给定的故障模型包装 `inner`。
    pub fn new(inner: T, config: ImpairmentConfig) -> Self {
        Self {
            inner: Arc::new(inner),
            config,
            filter: None,
            stats: Arc::new(ImpairmentStats::default()),
        }
    }

    /// Adds a deterministic drop filter, applied before the random loss model.
    ///
    /// 添加确定性丢包过滤器，在随机丢包模型之前生效。
    pub fn with_filter(mut self, filter: PacketFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Returns a shared handle to the counters.
    pub fn stats(&self) -> Arc<ImpairmentStats> {
        self.stats.clone()
    }

    fn filtered_out(&self, buf: &[u8]) -> bool {
        let Some(filter) = &self.filter else {
            return false;
        };
        match Packet::decode(buf) {
            Ok(packet) => !filter(&packet),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl<T: DatagramTransport> DatagramTransport for ImpairedTransport<T> {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        if self.filtered_out(buf) || self.config.should_drop() {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(addr = %target, bytes = buf.len(), "Impairment dropped datagram");
            return Ok(buf.len());
        }
        self.stats.forwarded.fetch_add(1, Ordering::Relaxed);

        let delay = self.config.random_delay();
        if delay.is_zero() {
            return self.inner.send_to(buf, target).await;
        }

        trace!(addr = %target, ?delay, "Impairment delaying datagram");
        let inner = self.inner.clone();
        let datagram = buf.to_vec();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = inner.send_to(&datagram, target).await {
                warn!(addr = %target, "Delayed forward failed: {}", e);
            }
        });
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr()
    }
}
