use super::{IcmpFamily, SequenceNumber};
use crate::PingError;
use pnet_packet::icmp::{
    echo_reply::EchoReplyPacket,
    echo_request::{EchoRequestPacket as EchoRequestPacketV4, MutableEchoRequestPacket as MutableEchoRequestPacketV4},
    IcmpCode, IcmpPacket, IcmpTypes,
};
use pnet_packet::icmpv6::{Icmpv6Code, Icmpv6Packet, Icmpv6Types, MutableIcmpv6Packet};
use pnet_packet::Packet;

pub(crate) const PAYLOAD_SIZE: usize = 64;

// type, code, checksum, identifier, sequence number
const ECHO_HEADER_SIZE: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EchoFields {
    pub identifier: u16,
    pub sequence_number: SequenceNumber,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IcmpMessage {
    EchoReply(EchoFields),
    Other { icmp_type: u8 },
}

/// Serializes an echo request.
///
/// ICMPv4 carries a software checksum. The ICMPv6 checksum covers the IPv6
/// pseudo-header and is filled in by the kernel, so it is left zero here.
pub(crate) fn new_echo_request(
    family: IcmpFamily,
    identifier: u16,
    sequence_number: SequenceNumber,
    payload: &[u8],
) -> Option<Vec<u8>> {
    match family {
        IcmpFamily::V4 => new_icmpv4_package(identifier, sequence_number, payload),
        IcmpFamily::V6 => new_icmpv6_package(Icmpv6Types::EchoRequest, identifier, sequence_number, payload),
    }
}

fn new_icmpv4_package(identifier: u16, sequence_number: SequenceNumber, payload: &[u8]) -> Option<Vec<u8>> {
    let buf = vec![0u8; EchoRequestPacketV4::minimum_packet_size() + payload.len()];
    let mut package = MutableEchoRequestPacketV4::owned(buf)?;
    package.set_icmp_type(IcmpTypes::EchoRequest);
    package.set_icmp_code(IcmpCode::new(0));
    package.set_identifier(identifier);
    package.set_sequence_number(sequence_number.into());
    package.set_payload(payload);

    package.set_checksum(0_u16);
    let checksum = pnet_packet::icmp::checksum(&IcmpPacket::new(package.packet())?);
    package.set_checksum(checksum);
    Some(package.packet().to_vec())
}

fn new_icmpv6_package(
    icmpv6_type: pnet_packet::icmpv6::Icmpv6Type,
    identifier: u16,
    sequence_number: SequenceNumber,
    payload: &[u8],
) -> Option<Vec<u8>> {
    let mut body = Vec::with_capacity(4 + payload.len());
    body.extend_from_slice(&identifier.to_be_bytes());
    body.extend_from_slice(&u16::from(sequence_number).to_be_bytes());
    body.extend_from_slice(payload);

    let buf = vec![0u8; Icmpv6Packet::minimum_packet_size() + body.len()];
    let mut package = MutableIcmpv6Packet::owned(buf)?;
    package.set_icmpv6_type(icmpv6_type);
    package.set_icmpv6_code(Icmpv6Code::new(0));
    package.set_checksum(0_u16);
    package.set_payload(&body);
    Some(package.packet().to_vec())
}

/// Parses an inbound ICMP message (without IP header).
///
/// Anything that is not an echo reply of `family` comes back as
/// [`IcmpMessage::Other`]. Truncated messages and ICMPv4 checksum mismatches
/// are [`PingError::Parse`].
pub(crate) fn parse_message(family: IcmpFamily, buf: &[u8]) -> Result<IcmpMessage, PingError> {
    if buf.len() < ECHO_HEADER_SIZE {
        return Err(too_short(buf.len()));
    }
    match family {
        IcmpFamily::V4 => parse_icmpv4(buf),
        IcmpFamily::V6 => parse_icmpv6(buf),
    }
}

fn parse_icmpv4(buf: &[u8]) -> Result<IcmpMessage, PingError> {
    let icmp_package = IcmpPacket::new(buf).ok_or_else(|| too_short(buf.len()))?;
    if pnet_packet::icmp::checksum(&icmp_package) != icmp_package.get_checksum() {
        return Err(PingError::Parse("ICMP checksum mismatch".to_owned()));
    }
    if icmp_package.get_icmp_type() != IcmpTypes::EchoReply {
        return Ok(IcmpMessage::Other { icmp_type: icmp_package.get_icmp_type().0 });
    }

    let echo_reply_package = EchoReplyPacket::new(buf).ok_or_else(|| too_short(buf.len()))?;
    Ok(IcmpMessage::EchoReply(EchoFields {
        identifier: echo_reply_package.get_identifier(),
        sequence_number: echo_reply_package.get_sequence_number().into(),
    }))
}

fn parse_icmpv6(buf: &[u8]) -> Result<IcmpMessage, PingError> {
    let icmpv6_package = Icmpv6Packet::new(buf).ok_or_else(|| too_short(buf.len()))?;
    if icmpv6_package.get_icmpv6_type() != Icmpv6Types::EchoReply {
        return Ok(IcmpMessage::Other { icmp_type: icmpv6_package.get_icmpv6_type().0 });
    }

    match icmpv6_package.payload() {
        [id_hi, id_lo, seq_hi, seq_lo, ..] => Ok(IcmpMessage::EchoReply(EchoFields {
            identifier: u16::from_be_bytes([*id_hi, *id_lo]),
            sequence_number: u16::from_be_bytes([*seq_hi, *seq_lo]).into(),
        })),
        _ => Err(too_short(buf.len())),
    }
}

fn too_short(len: usize) -> PingError {
    PingError::Parse(format!("{len} bytes is shorter than an ICMP echo message"))
}

#[cfg(test)]
pub(crate) fn new_echo_reply(
    family: IcmpFamily,
    identifier: u16,
    sequence_number: SequenceNumber,
    payload: &[u8],
) -> Vec<u8> {
    use pnet_packet::icmp::echo_reply::MutableEchoReplyPacket;

    match family {
        IcmpFamily::V4 => {
            let buf = vec![0u8; EchoReplyPacket::minimum_packet_size() + payload.len()];
            let mut package = MutableEchoReplyPacket::owned(buf).unwrap();
            package.set_icmp_type(IcmpTypes::EchoReply);
            package.set_icmp_code(IcmpCode::new(0));
            package.set_identifier(identifier);
            package.set_sequence_number(sequence_number.into());
            package.set_payload(payload);
            package.set_checksum(0_u16);
            package.set_checksum(pnet_packet::icmp::checksum(&IcmpPacket::new(package.packet()).unwrap()));
            package.packet().to_vec()
        }
        IcmpFamily::V6 => {
            new_icmpv6_package(Icmpv6Types::EchoReply, identifier, sequence_number, payload).unwrap()
        }
    }
}
