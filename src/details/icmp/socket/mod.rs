use std::net::IpAddr;
use std::{io, time::Duration};

pub(crate) mod raw_socket;
pub(crate) use raw_socket::RawSocket;

pub(crate) trait TSocket: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize>;

    /// Reads one ICMP message into `buf`, waiting at most `timeout`.
    /// Returns the message length and the sender.
    fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, IpAddr)>;
}
