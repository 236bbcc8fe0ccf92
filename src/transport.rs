//! Datagram transport abstraction consumed by the sender and receiver engines.
//!
//! This module provides the thin send/receive boundary the protocol runs on,
//! implemented for `tokio::net::UdpSocket` and for the fault-injecting
//! [`ImpairedTransport`] decorator.
//!
//! 发送端和接收端引擎所使用的数据报传输抽象。
//!
//! 此模块提供协议运行所依赖的收发边界，
//! 为 `tokio::net::UdpSocket` 和注入故障的 [`ImpairedTransport`] 装饰器实现。

pub mod impairment;

use crate::error::Result;
use async_trait::async_trait;
use std::{net::SocketAddr, time::Duration};
use tokio::net::UdpSocket;

pub use impairment::{ImpairedTransport, ImpairmentConfig, ImpairmentStats};

/// An asynchronous datagram transport interface.
///
/// This trait abstracts over the underlying datagram socket, enabling custom
/// transports for testing or network impairment. `recv_from` must be
/// cancel-safe: the engines race it against timers in `tokio::select!`.
///
/// 异步数据报传输接口。
///
/// 此trait对底层数据报套接字进行抽象，从而可以为测试或网络损伤自定义传输。
/// `recv_from` 必须是取消安全的：引擎会在 `tokio::select!` 中将其与定时器竞争。
#[async_trait]
pub trait DatagramTransport: Send + Sync + 'static {
    /// Sends a single datagram to the given address.
    /// 向给定地址发送单个数据报。
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;

    /// Receives a single datagram.
    /// 接收单个数据报。
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;

    /// Returns the local address that this transport is bound to.
    /// 返回此传输绑定的本地地址。
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Receives a single datagram, giving up after `timeout`.
    ///
    /// `Ok(None)` signals the timeout, which is not an error.
    ///
    /// 接收单个数据报，在 `timeout` 后放弃。
    ///
    /// `Ok(None)` 表示超时，这不是错误。
    async fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>> {
        match tokio::time::timeout(timeout, self.recv_from(buf)).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }
}

#[async_trait]
impl DatagramTransport for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        UdpSocket::send_to(self, buf, target).await.map_err(Into::into)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await.map_err(Into::into)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        UdpSocket::local_addr(self).map_err(Into::into)
    }
}

/// A transport that can be bound to a local address.
///
/// 可绑定到本地地址的传输。
#[async_trait]
pub trait BindableTransport: DatagramTransport + Sized {
    /// Binds a new transport to the given address.
    /// 将新传输绑定到给定地址。
    async fn bind(addr: SocketAddr) -> Result<Self>;
}

#[async_trait]
impl BindableTransport for UdpSocket {
    async fn bind(addr: SocketAddr) -> Result<Self> {
        UdpSocket::bind(addr).await.map_err(Into::into)
    }
}
