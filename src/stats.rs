use std::fmt;
use std::time::Duration;

/// Counters and round-trip times of one ping session.
///
/// Only the session's control loop mutates a `Stats`; callers read it through
/// [`Stats::report`] after the loop has stopped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    host: String,
    rtts: Vec<Duration>,
    transmitted: u64,
    received: u64,
}

impl Stats {
    pub fn new(host: impl Into<String>) -> Self {
        Stats { host: host.into(), ..Stats::default() }
    }

    pub fn record_send(&mut self) {
        self.transmitted += 1;
    }

    pub fn record_receive(&mut self) {
        self.received += 1;
    }

    pub fn record_rtt(&mut self, rtt: Duration) {
        self.rtts.push(rtt);
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn transmitted(&self) -> u64 {
        self.transmitted
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn rtts(&self) -> &[Duration] {
        &self.rtts
    }

    pub fn report(&self) -> Summary {
        Summary {
            host: self.host.clone(),
            transmitted: self.transmitted,
            received: self.received,
            packet_loss: self.packet_loss(),
            rtt: RttSummary::from_samples(&self.rtts),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn packet_loss(&self) -> Option<f64> {
        if self.transmitted == 0 {
            return None;
        }
        let lost = self.transmitted.saturating_sub(self.received);
        Some(lost as f64 * 100.0 / self.transmitted as f64)
    }
}

/// Snapshot of [`Stats`] for display.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub host: String,
    pub transmitted: u64,
    pub received: u64,
    /// Percentage in `0.0..=100.0`; `None` if nothing was transmitted.
    pub packet_loss: Option<f64>,
    /// `None` if no reply was accepted.
    pub rtt: Option<RttSummary>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RttSummary {
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
}

impl RttSummary {
    fn from_samples(rtts: &[Duration]) -> Option<Self> {
        let min = *rtts.iter().min()?;
        let max = *rtts.iter().max()?;
        let total: u128 = rtts.iter().map(Duration::as_nanos).sum();
        let avg = total / rtts.len() as u128;
        Some(RttSummary { min, avg: Duration::from_nanos(u64::try_from(avg).unwrap_or(u64::MAX)), max })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} ping statistics ---", self.host)?;
        write!(f, "{} packets transmitted, {} received", self.transmitted, self.received)?;
        if let Some(packet_loss) = self.packet_loss {
            write!(f, ", {packet_loss:.1}% packet loss")?;
        }
        if let Some(rtt) = self.rtt {
            write!(f, "\n{rtt}")?;
        }
        Ok(())
    }
}

impl fmt::Display for RttSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rtt min/avg/max = {:.3}/{:.3}/{:.3} ms",
            self.min.as_secs_f64() * 1000.0,
            self.avg.as_secs_f64() * 1000.0,
            self.max.as_secs_f64() * 1000.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with(transmitted: u64, received: u64) -> Stats {
        let mut stats = Stats::new("example.com");
        for _ in 0..transmitted {
            stats.record_send();
        }
        for _ in 0..received {
            stats.record_receive();
        }
        stats
    }

    #[test]
    fn packet_loss_is_not_truncated() {
        let summary = stats_with(5, 3).report();
        assert_eq!(Some(40.0), summary.packet_loss);
    }

    #[test]
    fn packet_loss_bounds() {
        assert_eq!(Some(0.0), stats_with(4, 4).report().packet_loss);
        assert_eq!(Some(100.0), stats_with(4, 0).report().packet_loss);
    }

    #[test]
    fn nothing_transmitted_reports_no_data() {
        let summary = Stats::new("example.com").report();
        assert_eq!(0, summary.transmitted);
        assert_eq!(None, summary.packet_loss);
        assert_eq!(None, summary.rtt);
        assert_eq!("--- example.com ping statistics ---\n0 packets transmitted, 0 received", summary.to_string());
    }

    #[test]
    fn min_avg_max() {
        let mut stats = stats_with(3, 3);
        for ms in [20, 10, 30] {
            stats.record_rtt(Duration::from_millis(ms));
        }

        let rtt = stats.report().rtt.unwrap();

        assert_eq!(Duration::from_millis(10), rtt.min);
        assert_eq!(Duration::from_millis(20), rtt.avg);
        assert_eq!(Duration::from_millis(30), rtt.max);
    }

    #[test]
    fn full_loss_has_no_rtt_samples() {
        let summary = stats_with(3, 0).report();
        assert_eq!(None, summary.rtt);
        assert_eq!(
            "--- example.com ping statistics ---\n3 packets transmitted, 0 received, 100.0% packet loss",
            summary.to_string()
        );
    }

    #[test]
    fn fmt_with_rtt() {
        let mut stats = stats_with(5, 3);
        for ms in [10, 20, 30] {
            stats.record_rtt(Duration::from_millis(ms));
        }
        assert_eq!(
            "--- example.com ping statistics ---\n\
             5 packets transmitted, 3 received, 40.0% packet loss\n\
             rtt min/avg/max = 10.000/20.000/30.000 ms",
            stats.report().to_string()
        );
    }

    #[test]
    fn avg_of_huge_samples_does_not_overflow() {
        let mut stats = stats_with(2, 2);
        stats.record_rtt(Duration::from_secs(u64::MAX / 2));
        stats.record_rtt(Duration::from_secs(u64::MAX / 2));
        let rtt = stats.report().rtt.unwrap();
        assert_eq!(Duration::from_secs(u64::MAX / 2), rtt.max);
        assert_eq!(Duration::from_nanos(u64::MAX), rtt.avg);
    }
}
