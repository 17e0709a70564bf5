use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;

pub(crate) const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 12, 255, 254);
pub(crate) const MULTICAST_PORT: u16 = 9522;

/// Opens a UDP socket bound to the multicast port and joined to the vendor
/// group on the given interface.
pub(crate) fn multicast_socket(interface: Ipv4Addr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    let bind_addr = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MULTICAST_PORT));
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v4(&MULTICAST_GROUP, &interface)?;
    socket.set_nonblocking(true)?;

    UdpSocket::from_std(socket.into())
}
