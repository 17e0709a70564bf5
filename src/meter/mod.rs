//! Reading and decoding the energy meter's multicast telegrams.

mod telegram;

pub use telegram::{
    obis, ObisId, SoftwareVersion, Telegram, TelegramError, GRID_EXPORT, GRID_IMPORT,
    MAX_TELEGRAM_SIZE,
};

use crate::net;
use crate::prelude::*;

use std::net::Ipv4Addr;
use tokio::net::UdpSocket;

/// Multicast group the meter broadcasts on.
pub const MULTICAST_GROUP: Ipv4Addr = net::MULTICAST_GROUP;
/// UDP port of the multicast group.
pub const MULTICAST_PORT: u16 = net::MULTICAST_PORT;

/// Listens for telegrams of an energy meter on the local network.
pub struct EnergyMeter {
    socket: UdpSocket,
}

impl EnergyMeter {
    /// Opens a multicast socket listening on all interfaces.
    pub async fn listen() -> Result<Self> {
        Self::listen_on(Ipv4Addr::UNSPECIFIED).await
    }

    /// Opens a multicast socket on the interface with the given address.
    pub async fn listen_on(interface: Ipv4Addr) -> Result<Self> {
        let socket = net::multicast_socket(interface)?;
        Ok(Self { socket })
    }

    /// Reads and decodes one telegram.
    ///
    /// Blocks until a datagram arrives; the meter broadcasts roughly once
    /// per second.
    pub async fn read_telegram(&self) -> Result<Telegram> {
        let mut buf = [0u8; MAX_TELEGRAM_SIZE];
        let (len, addr) = self.socket.recv_from(&mut buf).await?;
        debug!("telegram of {} bytes from {}", len, addr);

        Telegram::decode(&buf[..len])
    }
}
