use std::io;
use thiserror::Error;

pub type PingResult<T> = std::result::Result<T, PingError>;

/// Failures of a ping session.
///
/// `Resolution` and `Transport` abort the session. The remaining variants
/// describe a single failed cycle; the run loop logs them and carries on.
#[derive(Debug, Error)]
pub enum PingError {
    #[error("could not resolve host {host}: {source}")]
    Resolution {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("could not open ICMP socket: {0}")]
    Transport(#[source] io::Error),
    #[error("could not send echo request: {0}")]
    Send(#[source] io::Error),
    #[error("no echo reply for icmp_seq={sequence_number}")]
    Timeout { sequence_number: u16 },
    #[error("malformed ICMP packet: {0}")]
    Parse(String),
    #[error("could not receive echo reply: {0}")]
    Receive(#[source] io::Error),
}

impl PingError {
    /// Whether the error ends the session rather than a single cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PingError::Resolution { .. } | PingError::Transport(_))
    }
}
