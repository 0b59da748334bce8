use crate::details::icmp::SequenceNumber;
use crate::details::records::{PingSendRecord, PingSendRecordReceiver, SendOutcome};
use crate::Stats;
use std::collections::HashMap;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Instant;

/// Collects send completions from the worker on the control loop's thread,
/// which keeps that thread the only writer of [`Stats`].
pub(crate) struct SendLedger {
    ping_send_record_rx: PingSendRecordReceiver,
    send_records: HashMap<SequenceNumber, SendOutcome>,
}

impl SendLedger {
    pub(crate) fn new(ping_send_record_rx: PingSendRecordReceiver) -> Self {
        Self { ping_send_record_rx, send_records: HashMap::new() }
    }

    pub(crate) fn process_send_records(&mut self, stats: &mut Stats) {
        while let Ok(send_record) = self.ping_send_record_rx.try_recv() {
            self.insert(send_record, stats);
        }
    }

    /// Waits until the worker reports on `sequence_number` or `deadline` passes.
    pub(crate) fn wait_for(
        &mut self,
        sequence_number: SequenceNumber,
        deadline: Instant,
        stats: &mut Stats,
    ) -> Option<SendOutcome> {
        self.process_send_records(stats);
        loop {
            if let Some(outcome) = self.send_records.remove(&sequence_number) {
                return Some(outcome);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            match self.ping_send_record_rx.recv_timeout(deadline - now) {
                Ok(send_record) => self.insert(send_record, stats),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    pub(crate) fn take(&mut self, sequence_number: SequenceNumber, stats: &mut Stats) -> Option<SendOutcome> {
        self.process_send_records(stats);
        self.send_records.remove(&sequence_number)
    }

    /// Drops what is left of earlier cycles; those sends are already counted.
    pub(crate) fn forget(&mut self) {
        for (sequence_number, outcome) in self.send_records.drain() {
            if let SendOutcome::Failed(e) = outcome {
                tracing::debug!("late send failure for icmp_seq={sequence_number}: {e}");
            }
        }
    }

    fn insert(&mut self, send_record: PingSendRecord, stats: &mut Stats) {
        let PingSendRecord { sequence_number, outcome } = send_record;
        if let SendOutcome::Sent { .. } = outcome {
            stats.record_send();
        }
        self.send_records.insert(sequence_number, outcome);
    }
}
