use crossbeam_channel::Sender;

use crate::pipeline::frame_result::FrameResult;
use crate::pipeline::result_sink::{ResultSink, SinkError};

/// Forwards results to another thread, e.g. a serving layer that pushes
/// them to clients. Blocks when a bounded consumer falls behind.
pub struct ChannelResultSink {
    tx: Sender<FrameResult>,
}

impl ChannelResultSink {
    pub fn new(tx: Sender<FrameResult>) -> Self {
        Self { tx }
    }
}

impl ResultSink for ChannelResultSink {
    fn emit(&mut self, result: FrameResult) -> Result<(), SinkError> {
        self.tx.send(result).map_err(|_| SinkError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(sequence_number: u64) -> FrameResult {
        FrameResult {
            sequence_number,
            timestamp: 0.0,
            tracks: Vec::new(),
        }
    }

    #[test]
    fn test_forwards_in_order() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut sink = ChannelResultSink::new(tx);
        for seq in 0..3 {
            sink.emit(result(seq)).unwrap();
        }
        drop(sink);
        let seqs: Vec<u64> = rx.iter().map(|r| r.sequence_number).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_dropped_consumer_is_disconnected() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);
        let mut sink = ChannelResultSink::new(tx);
        assert!(matches!(sink.emit(result(0)), Err(SinkError::Disconnected)));
    }
}
