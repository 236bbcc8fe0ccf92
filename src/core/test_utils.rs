//! Common testing infrastructure for the protocol engines.

use crate::{
    error::{Error, Result},
    packet::Packet,
    transport::DatagramTransport,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::HashMap,
    io,
    net::SocketAddr,
    sync::{
        Arc, Mutex, Once,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{
    sync::mpsc,
    time::{Duration, Instant},
};

pub const CLIENT_ADDR: &str = "127.0.0.1:1234";
pub const SERVER_ADDR: &str = "127.0.0.1:5678";

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gbn_protocol=debug".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

/// A datagram in transit: (deliverable at, bytes, source).
type InTransit = (Instant, Bytes, SocketAddr);
type Inbox = mpsc::UnboundedSender<InTransit>;

/// An in-memory datagram network. Transports bound on it deliver to each other
/// by address; datagrams for unbound addresses vanish, as with UDP. Every
/// datagram takes `latency` to arrive and links never reorder.
#[derive(Clone, Default)]
pub struct MockNetwork {
    inboxes: Arc<Mutex<HashMap<SocketAddr, Inbox>>>,
    latency: Duration,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn bind(&self, local_addr: SocketAddr) -> MockTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.lock().unwrap().insert(local_addr, tx);
        MockTransport {
            local_addr,
            network: self.clone(),
            recv_state: tokio::sync::Mutex::new(RecvState { rx, next: None }),
            sent: Arc::new(Mutex::new(Vec::new())),
            broken: Arc::new(AtomicBool::new(false)),
        }
    }
}

struct RecvState {
    rx: mpsc::UnboundedReceiver<InTransit>,
    /// The datagram being waited on. Kept here so a cancelled receive loses nothing.
    next: Option<InTransit>,
}

/// A transport bound on a [`MockNetwork`].
pub struct MockTransport {
    pub local_addr: SocketAddr,
    network: MockNetwork,
    recv_state: tokio::sync::Mutex<RecvState>,
    sent: Arc<Mutex<Vec<(Packet, SocketAddr)>>>,
    broken: Arc<AtomicBool>,
}

impl MockTransport {
    /// Every decodable packet this transport has sent, with its destination.
    pub fn sent_packets(&self) -> Vec<(Packet, SocketAddr)> {
        self.sent.lock().unwrap().clone()
    }

    /// Sequence numbers of the acknowledgments this transport has sent.
    pub fn sent_acks(&self) -> Vec<u32> {
        self.sent_packets()
            .into_iter()
            .filter(|(packet, _)| packet.is_ack)
            .map(|(packet, _)| packet.sequence_number)
            .collect()
    }

    /// Makes every following send and receive fail with an I/O error.
    pub fn break_link(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn check_link(&self) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock link broken",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DatagramTransport for MockTransport {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        self.check_link()?;
        if let Ok(packet) = Packet::decode(buf) {
            self.sent.lock().unwrap().push((packet, target));
        }

        let inbox = self.network.inboxes.lock().unwrap().get(&target).cloned();
        if let Some(inbox) = inbox {
            let deliver_at = Instant::now() + self.network.latency;
            let _ = inbox.send((deliver_at, Bytes::copy_from_slice(buf), self.local_addr));
        }
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.check_link()?;
        let mut state = self.recv_state.lock().await;
        if state.next.is_none() {
            match state.rx.recv().await {
                Some(datagram) => state.next = Some(datagram),
                None => return Err(Error::ChannelClosed),
            }
        }
        if let Some((deliver_at, _, _)) = &state.next {
            tokio::time::sleep_until(*deliver_at).await;
        }
        let (_, data, from) = state.next.take().ok_or(Error::ChannelClosed)?;
        let len = usize::min(data.len(), buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok((len, from))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

/// Two transports on a fresh network, bound to [`CLIENT_ADDR`] and [`SERVER_ADDR`].
pub fn linked_pair() -> (MockTransport, MockTransport) {
    let network = MockNetwork::new();
    let client = network.bind(addr(CLIENT_ADDR));
    let server = network.bind(addr(SERVER_ADDR));
    (client, server)
}
