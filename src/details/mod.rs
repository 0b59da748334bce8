pub(crate) use ping_receiver::PingReceiver;
pub(crate) use ping_sender::PingSender;
pub(crate) use send_ledger::SendLedger;

pub(crate) mod icmp;
mod ping_receiver;
mod ping_sender;
pub(crate) mod records;
mod send_ledger;
