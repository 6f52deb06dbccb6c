use thiserror::Error;

use super::frame_result::FrameResult;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error writing results: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize frame result: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("result consumer disconnected")]
    Disconnected,
}

/// Domain port for handing finished frames to the serving layer.
///
/// Results arrive in strictly increasing sequence order. The core makes no
/// assumption about what happens to them afterwards.
pub trait ResultSink {
    fn emit(&mut self, result: FrameResult) -> Result<(), SinkError>;

    /// Called once after the last result. Default: no-op.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// In-process collection.
impl ResultSink for Vec<FrameResult> {
    fn emit(&mut self, result: FrameResult) -> Result<(), SinkError> {
        self.push(result);
        Ok(())
    }
}

/// Fan out to two sinks; the first failure wins.
impl<A: ResultSink, B: ResultSink> ResultSink for (A, B) {
    fn emit(&mut self, result: FrameResult) -> Result<(), SinkError> {
        self.0.emit(result.clone())?;
        self.1.emit(result)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.0.finish()?;
        self.1.finish()
    }
}

impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn emit(&mut self, result: FrameResult) -> Result<(), SinkError> {
        (**self).emit(result)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        (**self).finish()
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

    struct FailingSink;

    impl ResultSink for FailingSink {
        fn emit(&mut self, _result: FrameResult) -> Result<(), SinkError> {
            Err(SinkError::Disconnected)
        }
    }

    #[test]
    fn test_vec_collects_in_order() {
        let mut sink: Vec<FrameResult> = Vec::new();
        sink.emit(result(0)).unwrap();
        sink.emit(result(1)).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.iter().map(|r| r.sequence_number).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_pair_forwards_to_both() {
        let mut sink = (Vec::new(), Vec::new());
        sink.emit(result(3)).unwrap();
        assert_eq!(sink.0, vec![result(3)]);
        assert_eq!(sink.1, vec![result(3)]);
    }

    #[test]
    fn test_pair_stops_at_first_failure() {
        let mut sink = (FailingSink, Vec::new());
        assert!(matches!(sink.emit(result(0)), Err(SinkError::Disconnected)));
        assert!(sink.1.is_empty());
    }

    #[test]
    fn test_borrowed_sink_can_be_paired() {
        let mut results: Vec<FrameResult> = Vec::new();
        let mut other: Vec<FrameResult> = Vec::new();
        let mut pair = (&mut results, &mut other);
        pair.emit(result(9)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(other.len(), 1);
    }
}
