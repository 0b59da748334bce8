use crate::details::icmp::{IcmpFamily, RawSocket, SequenceNumber, TSocket};
use crate::details::records::{ping_send_record_channel, PingReceiveRecord, PingReceiveRecordData, SendOutcome};
use crate::details::{PingReceiver, PingSender, SendLedger};
use crate::{lookup_host, PingError, PingOutput, PingResult, PingerConfig, ShutdownHandle, Stats, Summary};
use rand::Rng;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

/// A ping session against one host.
///
/// [`Pinger::run`] sends one echo request per tick and waits for its reply
/// until the configured deadline, at most one request being in flight. It
/// returns once shutdown has been requested through [`Pinger::shutdown_handle`];
/// the statistics are read afterwards with [`Pinger::report`].
///
/// ```no_run
/// let mut pinger = pinger::Pinger::new("example.com", pinger::PingerConfig::default())?;
/// let shutdown = pinger.shutdown_handle();
/// std::thread::spawn(move || {
///     std::thread::sleep(std::time::Duration::from_secs(5));
///     shutdown.shutdown();
/// });
/// pinger.run()?;
/// println!("{}", pinger.report());
/// # Ok::<(), pinger::PingError>(())
/// ```
pub struct Pinger {
    host: String,
    ip_addr: IpAddr,
    identifier: u16,
    sequence_number: SequenceNumber,
    config: PingerConfig,
    shutdown: ShutdownHandle,
    stats: Stats,
}

#[derive(Debug)]
enum CycleOutcome {
    Reply(PingOutput),
    Cancelled,
}

struct Transport<S> {
    sender: PingSender,
    receiver: PingReceiver<S>,
    ledger: SendLedger,
}

impl Pinger {
    /// Resolves `host` and prepares a session with a random identifier.
    pub fn new(host: &str, config: PingerConfig) -> PingResult<Self> {
        Self::with_rng(host, config, &mut rand::thread_rng())
    }

    /// Like [`Pinger::new`], drawing the identifier from `rng`.
    pub fn with_rng<R: Rng>(host: &str, config: PingerConfig, rng: &mut R) -> PingResult<Self> {
        let ip_addr = lookup_host(host)?;
        Ok(Pinger {
            host: host.to_owned(),
            ip_addr,
            identifier: rng.gen(),
            sequence_number: SequenceNumber::start_value(),
            config,
            shutdown: ShutdownHandle::new(),
            stats: Stats::new(host),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ip_addr(&self) -> IpAddr {
        self.ip_addr
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn report(&self) -> Summary {
        self.stats.report()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        if !self.shutdown.shutdown() {
            tracing::debug!("shutdown of pinger for {} already requested", self.host);
        }
    }

    /// Pings until shutdown is requested.
    ///
    /// Fails only if the ICMP socket cannot be opened. Per-cycle failures are
    /// logged and the next cycle proceeds.
    pub fn run(&mut self) -> PingResult<()> {
        if self.shutdown.is_shutdown() {
            tracing::debug!("pinger for {} is shut down, not starting", self.host);
            return Ok(());
        }

        let family = IcmpFamily::of(self.ip_addr);
        tracing::debug!("setting up {family} connection for pinger");
        let socket = RawSocket::new(family).map_err(PingError::Transport)?;
        self.run_with_socket(Arc::new(socket));
        Ok(())
    }

    fn run_with_socket<S>(&mut self, socket: Arc<S>)
    where
        S: TSocket + 'static,
    {
        tracing::debug!("starting to ping {} ({}) with id={}", self.host, self.ip_addr, self.identifier);
        let mut transport = self.open_transport(socket);

        let mut next_tick = Instant::now();
        while !self.shutdown.wait_until(next_tick) {
            match self.run_cycle(&mut transport) {
                Ok(CycleOutcome::Reply(PingOutput { package_size, ip_addr, sequence_number, ping_duration })) => {
                    tracing::info!("{package_size} bytes from {ip_addr}: icmp_seq={sequence_number} time={ping_duration:?}");
                }
                Ok(CycleOutcome::Cancelled) => tracing::debug!("echo cycle abandoned on shutdown"),
                Err(e @ PingError::Timeout { .. }) => tracing::info!("{e}"),
                Err(e) => tracing::warn!("{e}"),
            }
            // missed ticks are dropped
            next_tick = (next_tick + self.config.interval).max(Instant::now());
        }

        self.close_transport(transport);
        tracing::debug!("pinger for {} stopped", self.host);
    }

    fn open_transport<S>(&self, socket: Arc<S>) -> Transport<S>
    where
        S: TSocket + 'static,
    {
        let (ping_send_record_tx, ping_send_record_rx) = ping_send_record_channel();
        Transport {
            sender: PingSender::start(
                socket.clone(),
                self.ip_addr,
                self.identifier,
                self.config.channel_size,
                ping_send_record_tx,
                self.shutdown.clone(),
            ),
            receiver: PingReceiver::new(socket, IcmpFamily::of(self.ip_addr), self.identifier),
            ledger: SendLedger::new(ping_send_record_rx),
        }
    }

    fn close_transport<S>(&mut self, transport: Transport<S>) {
        let Transport { mut sender, receiver, mut ledger } = transport;
        if sender.halt().is_err() {
            tracing::error!("PingSender thread panicked");
        }
        // writes that completed before the worker stopped count as transmitted
        ledger.process_send_records(&mut self.stats);
        ledger.forget();
        drop(receiver);
    }

    /// One request/reply exchange: send, then wait for the reply until the deadline.
    fn run_cycle<S>(&mut self, transport: &mut Transport<S>) -> PingResult<CycleOutcome>
    where
        S: TSocket + 'static,
    {
        let sequence_number = self.sequence_number;
        self.sequence_number = sequence_number.next();
        let deadline = Instant::now() + self.config.max_rtt;

        transport.sender.send(sequence_number)?;
        let result = match transport.receiver.receive(sequence_number, deadline, &self.shutdown) {
            Ok(PingReceiveRecord::Data(data)) => self.accept_reply(&mut transport.ledger, data),
            Ok(PingReceiveRecord::Cancelled) => Ok(CycleOutcome::Cancelled),
            // report the write failure if there was one
            Err(e) => match transport.ledger.take(sequence_number, &mut self.stats) {
                Some(SendOutcome::Failed(send_error)) => Err(PingError::Send(send_error)),
                _ => Err(e),
            },
        };
        transport.ledger.forget();
        result
    }

    fn accept_reply(&mut self, ledger: &mut SendLedger, data: PingReceiveRecordData) -> PingResult<CycleOutcome> {
        let PingReceiveRecordData { package_size, ip_addr, sequence_number, receive_time } = data;
        // wait for the worker's send record of this request
        match ledger.wait_for(sequence_number, receive_time + self.config.max_rtt, &mut self.stats) {
            Some(SendOutcome::Sent { send_time }) => {
                let ping_duration = receive_time.saturating_duration_since(send_time);
                self.stats.record_receive();
                self.stats.record_rtt(ping_duration);
                Ok(CycleOutcome::Reply(PingOutput {
                    package_size,
                    ip_addr,
                    sequence_number: sequence_number.into(),
                    ping_duration,
                }))
            }
            Some(SendOutcome::Failed(e)) => Err(PingError::Send(e)),
            None => {
                tracing::error!("could not find a send record for icmp_seq={sequence_number}");
                Err(PingError::Timeout { sequence_number: sequence_number.into() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::icmp::socket::tests::{OnReceive, OnSend, SocketMock};
    use more_asserts as ma;
    use pnet_packet::icmp::echo_request::EchoRequestPacket;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    fn config(max_rtt: Duration, interval: Duration) -> PingerConfig {
        PingerConfig { max_rtt, interval, ..PingerConfig::default() }
    }

    fn localhost_pinger(config: PingerConfig) -> Pinger {
        Pinger::with_rng("127.0.0.1", config, &mut StdRng::seed_from_u64(1)).unwrap()
    }

    #[test]
    fn identifier_comes_from_injected_rng() {
        let pinger_1 = Pinger::with_rng("127.0.0.1", PingerConfig::default(), &mut StdRng::seed_from_u64(42)).unwrap();
        let pinger_2 = Pinger::with_rng("127.0.0.1", PingerConfig::default(), &mut StdRng::seed_from_u64(42)).unwrap();

        assert_eq!(StdRng::seed_from_u64(42).gen::<u16>(), pinger_1.identifier());
        assert_eq!(pinger_1.identifier(), pinger_2.identifier());
    }

    #[test]
    fn unresolvable_host_fails_before_any_io() {
        let result = Pinger::new("no-such-host.invalid", PingerConfig::default());
        assert!(matches!(result, Err(PingError::Resolution { .. })));
    }

    #[test]
    fn cycles_send_increasing_sequence_numbers_and_accept_replies() {
        let mut pinger = localhost_pinger(config(Duration::from_secs(1), Duration::from_millis(1)));
        let socket = SocketMock::new_echoing(IcmpFamily::V4);
        let mut transport = pinger.open_transport(Arc::new(socket.clone()));

        for expected_sequence_number in 0..3 {
            match pinger.run_cycle(&mut transport) {
                Ok(CycleOutcome::Reply(output)) => {
                    assert_eq!(expected_sequence_number, output.sequence_number);
                    assert_eq!(IpAddr::from([127, 0, 0, 1]), output.ip_addr);
                }
                other => panic!("expected reply, got {other:?}"),
            }
        }
        pinger.close_transport(transport);

        let sent: Vec<(u16, u16)> = socket
            .sent_packages()
            .iter()
            .map(|package| {
                let echo_request = EchoRequestPacket::new(package).unwrap();
                (echo_request.get_identifier(), echo_request.get_sequence_number())
            })
            .collect();
        let id = pinger.identifier();
        assert_eq!(vec![(id, 0), (id, 1), (id, 2)], sent);

        assert_eq!(3, pinger.stats().transmitted());
        assert_eq!(3, pinger.stats().received());
        assert_eq!(3, pinger.stats().rtts().len());
    }

    #[test]
    fn reply_after_deadline_does_not_satisfy_a_later_cycle() {
        let mut pinger = localhost_pinger(config(Duration::from_millis(30), Duration::from_millis(1)));
        let socket = SocketMock::new(IcmpFamily::V4, OnSend::ReturnDefault, vec![]);
        let mut transport = pinger.open_transport(Arc::new(socket.clone()));

        let first = pinger.run_cycle(&mut transport);
        assert!(matches!(first, Err(PingError::Timeout { sequence_number: 0 })));

        // the reply to the first request shows up during the second cycle
        socket.push_receive(OnReceive::ReturnReply { identifier: pinger.identifier(), sequence_number: 0 });
        let second = pinger.run_cycle(&mut transport);
        assert!(matches!(second, Err(PingError::Timeout { sequence_number: 1 })));
        pinger.close_transport(transport);

        socket.should_receive_number_of_messages(1);
        assert_eq!(2, pinger.stats().transmitted());
        assert_eq!(0, pinger.stats().received());
        assert!(pinger.stats().rtts().is_empty());
    }

    #[test]
    fn send_failure_ends_only_the_cycle() {
        let mut pinger = localhost_pinger(config(Duration::from_millis(20), Duration::from_millis(1)));
        let socket = SocketMock::new(IcmpFamily::V4, OnSend::ReturnErr, vec![]);
        let mut transport = pinger.open_transport(Arc::new(socket));

        assert!(matches!(pinger.run_cycle(&mut transport), Err(PingError::Send(_))));
        assert!(matches!(pinger.run_cycle(&mut transport), Err(PingError::Send(_))));
        pinger.close_transport(transport);

        assert_eq!(0, pinger.stats().transmitted());
        assert_eq!(None, pinger.report().packet_loss);
    }

    #[test]
    fn parse_error_ends_only_the_cycle() {
        let config = PingerConfig { channel_size: 4, ..config(Duration::from_secs(1), Duration::from_millis(1)) };
        let mut pinger = localhost_pinger(config);
        let socket = SocketMock::new(
            IcmpFamily::V4,
            OnSend::ReturnDefault,
            vec![OnReceive::ReturnBytes(vec![0xDE, 0xAD]), OnReceive::ReturnEchoOfSent, OnReceive::ReturnEchoOfSent],
        );
        let mut transport = pinger.open_transport(Arc::new(socket));

        assert!(matches!(pinger.run_cycle(&mut transport), Err(PingError::Parse(_))));
        // the late reply to the first request is skipped, the second one is accepted
        match pinger.run_cycle(&mut transport) {
            Ok(CycleOutcome::Reply(output)) => assert_eq!(1, output.sequence_number),
            other => panic!("expected reply, got {other:?}"),
        }
        pinger.close_transport(transport);

        assert_eq!(2, pinger.stats().transmitted());
        assert_eq!(1, pinger.stats().received());
    }

    #[test]
    fn run_until_shutdown() {
        let mut pinger = localhost_pinger(config(Duration::from_millis(200), Duration::from_millis(10)));
        let shutdown = pinger.shutdown_handle();
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            shutdown.shutdown();
        });

        pinger.run_with_socket(Arc::new(SocketMock::new_echoing(IcmpFamily::V4)));
        thread.join().unwrap();

        let stats = pinger.stats();
        ma::assert_ge!(stats.transmitted(), 1);
        ma::assert_ge!(stats.received(), 1);
        ma::assert_le!(stats.received(), stats.transmitted());
        assert_eq!(stats.rtts().len() as u64, stats.received());
    }

    #[test]
    fn shutdown_interrupts_a_blocked_receive() {
        let mut pinger = localhost_pinger(config(Duration::from_secs(60), Duration::from_secs(60)));
        let shutdown = pinger.shutdown_handle();
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            shutdown.shutdown();
        });

        let start = Instant::now();
        pinger.run_with_socket(Arc::new(SocketMock::new(IcmpFamily::V4, OnSend::ReturnDefault, vec![])));
        thread.join().unwrap();

        ma::assert_lt!(start.elapsed(), Duration::from_secs(5));
        let summary = pinger.report();
        assert_eq!(1, summary.transmitted);
        assert_eq!(0, summary.received);
        assert_eq!(Some(100.0), summary.packet_loss);
        assert_eq!(None, summary.rtt);
    }

    #[test]
    fn shutdown_stops_a_sender_stuck_without_buffer_space() {
        let mut pinger = localhost_pinger(config(Duration::from_secs(60), Duration::from_secs(60)));
        let shutdown = pinger.shutdown_handle();
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            shutdown.shutdown();
        });

        let start = Instant::now();
        pinger.run_with_socket(Arc::new(SocketMock::new(IcmpFamily::V4, OnSend::ReturnNoBufs(usize::MAX), vec![])));
        thread.join().unwrap();

        ma::assert_lt!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(0, pinger.stats().transmitted());
        assert_eq!(0, pinger.stats().received());
    }

    #[test]
    fn shutdown_twice_then_run_returns_immediately() {
        let mut pinger = localhost_pinger(PingerConfig::default());
        pinger.shutdown();
        pinger.shutdown();

        // returns before opening a socket, so this needs no privileges
        assert!(pinger.run().is_ok());
        assert!(pinger.run().is_ok());

        let summary = pinger.report();
        assert_eq!(0, summary.transmitted);
        assert_eq!(None, summary.packet_loss);
    }

    #[test]
    fn ipv6_session() {
        let mut pinger = Pinger::with_rng("::1", PingerConfig::default(), &mut StdRng::seed_from_u64(3)).unwrap();
        let mut transport = pinger.open_transport(Arc::new(SocketMock::new_echoing(IcmpFamily::V6)));

        assert!(matches!(pinger.run_cycle(&mut transport), Ok(CycleOutcome::Reply(_))));
        pinger.close_transport(transport);

        assert_eq!(1, pinger.stats().received());
    }
}
