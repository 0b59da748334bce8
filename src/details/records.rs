use crate::details::icmp::SequenceNumber;
use std::io;
use std::net::IpAddr;
use std::sync::mpsc;
use std::time::Instant;

/// Completion of one echo request write, reported by the send worker.
#[derive(Debug)]
pub(crate) struct PingSendRecord {
    pub sequence_number: SequenceNumber,
    pub outcome: SendOutcome,
}

#[derive(Debug)]
pub(crate) enum SendOutcome {
    Sent { send_time: Instant },
    Failed(io::Error),
}

pub(crate) type PingSendRecordSender = mpsc::Sender<PingSendRecord>;
pub(crate) type PingSendRecordReceiver = mpsc::Receiver<PingSendRecord>;
pub(crate) fn ping_send_record_channel() -> (PingSendRecordSender, PingSendRecordReceiver) {
    mpsc::channel::<PingSendRecord>()
}

/// The matching echo reply of the outstanding request.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct PingReceiveRecordData {
    pub package_size: usize,
    pub ip_addr: IpAddr,
    pub sequence_number: SequenceNumber,
    pub receive_time: Instant,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PingReceiveRecord {
    Data(PingReceiveRecordData),
    /// Shutdown was requested while waiting.
    Cancelled,
}
