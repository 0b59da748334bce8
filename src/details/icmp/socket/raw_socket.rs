use super::TSocket;
use crate::details::icmp::IcmpFamily;
use pnet_packet::ipv4::Ipv4Packet;
use socket2::{Domain, Protocol, Type};
use std::net::IpAddr;
use std::{io, time::Duration};

// SO_RCVTIMEO rejects a zero timeout
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Raw ICMP socket. Needs `CAP_NET_RAW` (or root).
pub(crate) struct RawSocket {
    socket: socket2::Socket,
    family: IcmpFamily,
}

impl RawSocket {
    pub(crate) fn new(family: IcmpFamily) -> Result<Self, io::Error> {
        tracing::trace!("creating RawSocket for {family}");
        let socket = match family {
            IcmpFamily::V4 => socket2::Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?,
            IcmpFamily::V6 => socket2::Socket::new(Domain::IPV6, Type::RAW, Some(Protocol::ICMPV6))?,
        };
        Ok(RawSocket { socket, family })
    }
}

impl TSocket for RawSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    /// `buf` should hold a whole IP datagram (65535 bytes); longer datagrams
    /// are cut off by the kernel.
    fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, IpAddr)> {
        self.socket.set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;

        // Socket2 gives a safety guaranty which allows us to do an unsafe cast from `&mut [u8]`
        // to `&mut [std::mem::MaybeUninit<u8>]`: it never writes uninitialized bytes.
        // https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
        let (n, socket_addr) = socket2::Socket::recv_from(&self.socket, unsafe {
            &mut *(&mut buf[..] as *mut [u8] as *mut [std::mem::MaybeUninit<u8>])
        })?;
        let ip_addr = socket_addr
            .as_socket()
            .map(|addr| addr.ip())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "sender is not an IP address"))?;

        // A RAW IPv4 socket delivers the IP header as well, IPv6 only the ICMP message.
        let len = match self.family {
            IcmpFamily::V4 => strip_ipv4_header(buf, n)?,
            IcmpFamily::V6 => n,
        };
        Ok((len, ip_addr))
    }
}

/// Moves the payload of the IPv4 datagram in `buf[..n]` to the front of `buf`
/// and returns its length.
fn strip_ipv4_header(buf: &mut [u8], n: usize) -> io::Result<usize> {
    let truncated = || io::Error::new(io::ErrorKind::InvalidData, "truncated IPv4 header");
    let header_length = Ipv4Packet::new(&buf[..n])
        .map(|ipv4_packet| usize::from(ipv4_packet.get_header_length()) * 4)
        .ok_or_else(truncated)?;
    if header_length > n {
        return Err(truncated());
    }
    buf.copy_within(header_length..n, 0);
    Ok(n - header_length)
}
