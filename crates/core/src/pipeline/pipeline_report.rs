use std::fmt;

use serde::Serialize;

/// Counters describing one pipeline run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Frames pulled from the source.
    pub frames_read: u64,
    pub results_emitted: u64,
    /// Invalid frames: no result, tracker not advanced.
    pub frames_skipped: u64,
    /// Frames discarded by the drop policy: no result, tracker not advanced.
    pub frames_dropped: u64,
    pub inference_retries: u64,
    /// Frames whose retry also failed and were treated as empty.
    pub inference_failures: u64,
    pub unique_confirmed_tracks: u64,
    pub peak_concurrent_tracks: usize,
    pub cancelled: bool,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frames read:        {}", self.frames_read)?;
        writeln!(f, "Results emitted:    {}", self.results_emitted)?;
        writeln!(f, "Frames skipped:     {}", self.frames_skipped)?;
        writeln!(f, "Frames dropped:     {}", self.frames_dropped)?;
        writeln!(
            f,
            "Inference retries:  {} ({} failed)",
            self.inference_retries, self.inference_failures
        )?;
        writeln!(f, "Confirmed faces:    {}", self.unique_confirmed_tracks)?;
        write!(f, "Peak on screen:     {}", self.peak_concurrent_tracks)?;
        if self.cancelled {
            write!(f, "\n(cancelled)")?;
        }
        Ok(())
    }
}
