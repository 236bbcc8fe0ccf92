//! tests/common/harness.rs
use gbn_protocol::{
    Config, Delivery, GbnReceiver, GbnSender, ReceiverHandle,
    transport::{ImpairedTransport, ImpairmentConfig},
};
use std::{net::SocketAddr, sync::Arc, sync::Once, time::Duration};
use tokio::{net::UdpSocket, sync::mpsc};

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "gbn_protocol=info".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A receiver listening on loopback UDP, with the channel its deliveries arrive on.
pub struct TestHarness {
    pub server_addr: SocketAddr,
    pub handle: ReceiverHandle,
    pub deliveries: mpsc::Receiver<Delivery>,
}

impl TestHarness {
    /// Starts a receiver on an ephemeral loopback port.
    pub async fn new(config: Config) -> Self {
        init_tracing();
        let server_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let (handle, deliveries) = GbnReceiver::<UdpSocket>::bind(server_addr, config)
            .await
            .unwrap();
        Self {
            server_addr: handle.local_addr(),
            handle,
            deliveries,
        }
    }

    /// Starts a receiver whose acknowledgments go through the given impairment.
    pub async fn impaired(config: Config, impairment: ImpairmentConfig) -> Self {
        init_tracing();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = Arc::new(ImpairedTransport::new(socket, impairment));
        let (handle, deliveries) = GbnReceiver::spawn(transport, config).unwrap();
        Self {
            server_addr: handle.local_addr(),
            handle,
            deliveries,
        }
    }

    /// A sender on its own loopback socket, aimed at this receiver.
    pub async fn create_client(&self, config: Config) -> GbnSender<UdpSocket> {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        GbnSender::new(Arc::new(socket), self.server_addr, config).unwrap()
    }

    /// A sender whose data packets go through the given impairment.
    pub async fn create_impaired_client(
        &self,
        config: Config,
        impairment: ImpairmentConfig,
    ) -> GbnSender<ImpairedTransport<UdpSocket>> {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = Arc::new(ImpairedTransport::new(socket, impairment));
        GbnSender::new(transport, self.server_addr, config).unwrap()
    }

    /// Waits for `count` deliveries, failing the test if they take too long.
    pub async fn collect(&mut self, count: usize) -> Vec<Delivery> {
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let delivery = tokio::time::timeout(Duration::from_secs(10), self.deliveries.recv())
                .await
                .expect("timed out waiting for deliveries")
                .expect("delivery channel closed");
            out.push(delivery);
        }
        out
    }
}

/// Concatenates the payloads of `deliveries` in arrival order.
pub fn reassemble(deliveries: &[Delivery]) -> Vec<u8> {
    deliveries
        .iter()
        .flat_map(|d| d.payload.iter().copied())
        .collect()
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|_| rand::random::<u8>()).collect()
}
