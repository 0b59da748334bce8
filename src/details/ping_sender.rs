use crate::details::icmp::{new_echo_request, IcmpFamily, SequenceNumber, TSocket, PAYLOAD_SIZE};
use crate::details::records::{PingSendRecord, PingSendRecordSender, SendOutcome};
use crate::{PingError, ShutdownHandle};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Writes echo requests on a worker thread so that a slow write never eats
/// into the control loop's receive deadline.
///
/// Jobs go through a bounded queue; every job is answered with a
/// [`PingSendRecord`] once its write finished or failed for good.
pub(crate) struct PingSender {
    states: Vec<State>,
    job_tx: Option<mpsc::SyncSender<SequenceNumber>>,
    thread_handle: Option<JoinHandle<()>>,
}

#[derive(Clone, PartialEq, Debug)]
pub(crate) enum State {
    Sending,
    Halted,
}

impl Drop for PingSender {
    fn drop(&mut self) {
        if self.thread_handle.is_some() && self.halt().is_err() {
            tracing::error!("PingSender thread panicked");
        }
    }
}

impl PingSender {
    #[cfg(test)]
    pub(crate) fn get_states(&self) -> Vec<State> {
        self.states.clone()
    }

    /// Queues the echo request for `sequence_number` without waiting for the write.
    pub(crate) fn send(&self, sequence_number: SequenceNumber) -> Result<(), PingError> {
        let job_tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| PingError::Send(io::Error::new(io::ErrorKind::NotConnected, "PingSender is halted")))?;
        job_tx.try_send(sequence_number).map_err(|e| match e {
            mpsc::TrySendError::Full(_) => {
                PingError::Send(io::Error::new(io::ErrorKind::WouldBlock, "send queue is full"))
            }
            mpsc::TrySendError::Disconnected(_) => {
                PingError::Send(io::Error::new(io::ErrorKind::BrokenPipe, "PingSender thread is gone"))
            }
        })
    }

    /// Stops accepting jobs, lets the worker finish the queued ones and joins it.
    pub(crate) fn halt(&mut self) -> std::thread::Result<()> {
        if self.states.last() == Some(&State::Halted) {
            return Ok(());
        }
        // the worker leaves its loop once the job channel is disconnected
        drop(self.job_tx.take());
        let join_result = match self.thread_handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        };
        self.states.push(State::Halted);
        join_result
    }

    pub(crate) fn start<S>(
        socket: Arc<S>,
        ip_addr: IpAddr,
        identifier: u16,
        channel_size: usize,
        ping_send_record_tx: PingSendRecordSender,
        shutdown: ShutdownHandle,
    ) -> Self
    where
        S: TSocket + 'static,
    {
        let (job_tx, job_rx) = mpsc::sync_channel::<SequenceNumber>(channel_size.max(1));
        let thread_handle = std::thread::spawn(move || {
            tracing::trace!("PingSender thread start");
            let family = IcmpFamily::of(ip_addr);
            let addr: socket2::SockAddr = SocketAddr::new(ip_addr, 0).into();
            let payload = [0u8; PAYLOAD_SIZE];

            while let Ok(sequence_number) = job_rx.recv() {
                let outcome = match new_echo_request(family, identifier, sequence_number, &payload) {
                    Some(package) => send_with_retry(&*socket, &package, &addr, &shutdown),
                    None => SendOutcome::Failed(io::Error::new(io::ErrorKind::Other, "could not create ICMP package")),
                };
                tracing::trace!("PingSender icmp_seq={sequence_number}: {outcome:?}");
                if ping_send_record_tx.send(PingSendRecord { sequence_number, outcome }).is_err() {
                    tracing::debug!("PingSendRecord receiver is gone");
                    break;
                }
            }
            tracing::trace!("PingSender thread end");
        });

        PingSender {
            states: vec![State::Sending],
            job_tx: Some(job_tx),
            thread_handle: Some(thread_handle),
        }
    }
}

/// Writes `package`, retrying while the kernel is out of buffer space and
/// shutdown has not been requested.
/// The send time is taken right before the attempt that succeeds.
fn send_with_retry<S>(socket: &S, package: &[u8], addr: &socket2::SockAddr, shutdown: &ShutdownHandle) -> SendOutcome
where
    S: TSocket + ?Sized,
{
    loop {
        if shutdown.is_shutdown() {
            return SendOutcome::Failed(io::Error::new(io::ErrorKind::Interrupted, "shutdown requested"));
        }
        let send_time = Instant::now();
        match socket.send_to(package, addr) {
            Ok(_) => return SendOutcome::Sent { send_time },
            Err(e) if is_no_buffer_space(&e) => {
                tracing::trace!("no buffer space for echo request, retrying");
                std::thread::yield_now();
            }
            Err(e) => return SendOutcome::Failed(e),
        }
    }
}

fn is_no_buffer_space(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::ENOBUFS)
}
