use std::net::IpAddr;
use std::time::Duration;

/// An accepted echo reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PingOutput {
    /// Size of the ICMP message, header included.
    pub package_size: usize,
    pub ip_addr: IpAddr,
    pub sequence_number: u16,
    pub ping_duration: Duration,
}
