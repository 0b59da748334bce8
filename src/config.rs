use std::time::Duration;

#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PingerConfig {
    /// Replies arriving later than this after their request are discarded.
    pub max_rtt: Duration,
    /// Period of the ticker that starts each cycle.
    pub interval: Duration,
    /// Capacity of the queue between the control loop and the send worker.
    pub channel_size: usize,
}

impl Default for PingerConfig {
    fn default() -> Self {
        PingerConfig { max_rtt: Duration::from_secs(1), interval: Duration::from_secs(1), channel_size: 1 }
    }
}
