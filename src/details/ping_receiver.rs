use crate::details::icmp::{parse_message, EchoFields, IcmpFamily, IcmpMessage, SequenceNumber, TSocket};
use crate::details::records::{PingReceiveRecord, PingReceiveRecordData};
use crate::{PingError, PingResult, ShutdownHandle};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

// largest IP datagram, so that no ICMP message is ever cut off
const RECV_BUFFER_SIZE: usize = 65535;

// Upper bound for a single blocking read, and so for how long a shutdown
// request can go unnoticed.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) struct PingReceiver<S> {
    socket: Arc<S>,
    family: IcmpFamily,
    identifier: u16,
    buffer: Vec<u8>,
}

impl<S> PingReceiver<S>
where
    S: TSocket + 'static,
{
    pub(crate) fn new(socket: Arc<S>, family: IcmpFamily, identifier: u16) -> Self {
        PingReceiver { socket, family, identifier, buffer: vec![0u8; RECV_BUFFER_SIZE] }
    }

    /// Reads until the echo reply to `sequence_number` arrives, `deadline`
    /// passes or shutdown is requested.
    ///
    /// Other ICMP traffic, including replies to earlier requests, is dropped
    /// without moving the deadline. A malformed packet ends the wait with
    /// [`PingError::Parse`].
    pub(crate) fn receive(
        &mut self,
        sequence_number: SequenceNumber,
        deadline: Instant,
        shutdown: &ShutdownHandle,
    ) -> PingResult<PingReceiveRecord> {
        let expected = EchoFields { identifier: self.identifier, sequence_number };
        loop {
            if shutdown.is_shutdown() {
                return Ok(PingReceiveRecord::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(PingError::Timeout { sequence_number: sequence_number.into() });
            }

            let wait = (deadline - now).min(POLL_INTERVAL);
            let (package_size, ip_addr) = match self.socket.recv_from(&mut self.buffer, wait) {
                Ok(received) => received,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    tracing::trace!("read timeout for ICMP packet");
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => return Err(PingError::Parse(e.to_string())),
                Err(e) => return Err(PingError::Receive(e)),
            };
            let receive_time = Instant::now();
            tracing::debug!(
                "received ICMP packet (protocol {}) from {ip_addr}: len {package_size}",
                self.family.protocol_number()
            );

            match parse_message(self.family, &self.buffer[..package_size])? {
                IcmpMessage::EchoReply(echo) if echo == expected => {
                    return Ok(PingReceiveRecord::Data(PingReceiveRecordData {
                        package_size,
                        ip_addr,
                        sequence_number,
                        receive_time,
                    }));
                }
                IcmpMessage::EchoReply(echo) => {
                    tracing::debug!(
                        "discarding echo reply id={} icmp_seq={}, waiting for id={} icmp_seq={}",
                        echo.identifier,
                        echo.sequence_number,
                        expected.identifier,
                        expected.sequence_number
                    );
                }
                IcmpMessage::Other { icmp_type } => {
                    tracing::debug!("ICMP message of type {icmp_type} is not an echo reply");
                }
            }
        }
    }
}
