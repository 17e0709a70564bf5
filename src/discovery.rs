//! SMA device discovery over multicast.

use crate::net;
use crate::prelude::*;

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{self, Instant};

/// Probe frame requesting discovery replies from the multicast group.
const DISCOVERY_REQUEST: [u8; 20] = [
    0x53, 0x4d, 0x41, 0x00, 0x00, 0x04, 0x02, 0xa0, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00,
    0x20, 0x00, 0x00, 0x00, 0x00,
];

/// Reply payload identifying a SunSpec capable device.
const DISCOVERY_REPLY: [u8; 18] = [
    0x53, 0x4d, 0x41, 0x00, 0x00, 0x04, 0x02, 0xa0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00,
    0x00, 0x00, 0x01,
];

/// Discovers inverters connected to the network at the specified interface.
///
/// Sends one multicast probe and collects replies for the given window.
/// Returns the responding addresses in arrival order; an exhausted window
/// is not an error, the list is simply empty.
pub async fn discover_inverters(
    interface: Ipv4Addr,
    timeout: Duration,
) -> Result<Vec<SocketAddr>> {
    let socket = net::multicast_socket(interface)?;
    socket
        .send_to(
            &DISCOVERY_REQUEST,
            (net::MULTICAST_GROUP, net::MULTICAST_PORT),
        )
        .await?;

    collect_replies(&socket, timeout).await
}

/// Discovers inverters on the configured meter interface, waiting for the
/// configured window.
pub async fn discover_from_config(config: &Config) -> Result<Vec<SocketAddr>> {
    discover_inverters(config.meter.interface(), config.discovery_timeout()).await
}

async fn collect_replies(socket: &UdpSocket, window: Duration) -> Result<Vec<SocketAddr>> {
    let deadline = Instant::now() + window;
    let mut found: Vec<SocketAddr> = Vec::new();
    let mut buf = [0u8; 2500];

    loop {
        let received = match time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Err(_) => break,
            Ok(received) => received,
        };
        let (len, addr) = received?;

        if buf[..len] == DISCOVERY_REPLY && !found.contains(&addr) {
            debug!("discovery reply from {}", addr);
            found.push(addr);
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_unique_reply_addresses() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();

        let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        first.send_to(&DISCOVERY_REPLY, target).await.unwrap();
        first.send_to(&DISCOVERY_REPLY, target).await.unwrap();
        second.send_to(b"feedbeaf", target).await.unwrap();
        second.send_to(&DISCOVERY_REPLY, target).await.unwrap();

        let addrs = collect_replies(&receiver, Duration::from_millis(300))
            .await
            .unwrap();

        assert_eq!(addrs.len(), 2);
        assert!(addrs.contains(&first.local_addr().unwrap()));
        assert!(addrs.contains(&second.local_addr().unwrap()));
    }

    #[tokio::test]
    async fn truncated_reply_is_ignored() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&DISCOVERY_REPLY[..12], target).await.unwrap();

        let addrs = collect_replies(&receiver, Duration::from_millis(200))
            .await
            .unwrap();
        assert!(addrs.is_empty());
    }

    #[tokio::test]
    async fn exhausted_window_is_success() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let start = std::time::Instant::now();

        let addrs = collect_replies(&receiver, Duration::from_millis(100))
            .await
            .unwrap();

        assert!(addrs.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
