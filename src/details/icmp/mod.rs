use std::fmt;
use std::net::IpAddr;

mod echo;
mod sequence_number;
pub(crate) mod socket;

pub(crate) use echo::{new_echo_request, parse_message, EchoFields, IcmpMessage, PAYLOAD_SIZE};
pub(crate) use sequence_number::SequenceNumber;
pub(crate) use socket::{RawSocket, TSocket};

#[cfg(test)]
pub(crate) use echo::new_echo_reply;

/// Protocol family of a ping session, fixed by the target address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IcmpFamily {
    V4,
    V6,
}

impl IcmpFamily {
    pub(crate) fn of(ip_addr: IpAddr) -> Self {
        match ip_addr {
            IpAddr::V4(_) => IcmpFamily::V4,
            IpAddr::V6(_) => IcmpFamily::V6,
        }
    }

    /// IP protocol number carrying the ICMP messages of this family.
    pub(crate) fn protocol_number(self) -> u8 {
        match self {
            IcmpFamily::V4 => 1,
            IcmpFamily::V6 => 58,
        }
    }
}

impl fmt::Display for IcmpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IcmpFamily::V4 => write!(f, "ip4:icmp"),
            IcmpFamily::V6 => write!(f, "ip6:ipv6-icmp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn family_of_address() {
        assert_eq!(IcmpFamily::V4, IcmpFamily::of(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(IcmpFamily::V6, IcmpFamily::of(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[test]
    fn protocol_numbers() {
        assert_eq!(1, IcmpFamily::V4.protocol_number());
        assert_eq!(58, IcmpFamily::V6.protocol_number());
    }
}
