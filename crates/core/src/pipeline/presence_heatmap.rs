use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tracking::domain::track::TrackState;

use super::frame_result::FrameResult;
use super::result_sink::{ResultSink, SinkError};

pub const DEFAULT_CELL_SIZE: f64 = 50.0;

/// One grid cell and how many confirmed-face observations fell into it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub row: i64,
    pub col: i64,
    pub count: u64,
}

/// Serializable summary of a heatmap, cells in `hottest` order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatmapReport {
    pub cell_size: f64,
    pub frames: u64,
    pub observations: u64,
    pub cells: Vec<HeatmapCell>,
}

/// Counts where confirmed faces were seen, bucketed into square cells.
///
/// Only `Confirmed` tracks contribute; tracks coasting through a miss have
/// a predicted position rather than an observed one.
pub struct PresenceHeatmap {
    cell_size: f64,
    counts: HashMap<(i64, i64), u64>,
    frames: u64,
    observations: u64,
}

impl PresenceHeatmap {
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            DEFAULT_CELL_SIZE
        };
        Self {
            cell_size,
            counts: HashMap::new(),
            frames: 0,
            observations: 0,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn record(&mut self, result: &FrameResult) {
        self.frames += 1;
        for track in &result.tracks {
            if track.state != TrackState::Confirmed {
                continue;
            }
            let (cx, cy) = track.bbox.center();
            let cell = (
                (cy / self.cell_size).floor() as i64,
                (cx / self.cell_size).floor() as i64,
            );
            *self.counts.entry(cell).or_insert(0) += 1;
            self.observations += 1;
        }
    }

    /// Count for the cell at (`row`, `col`).
    pub fn count(&self, row: i64, col: i64) -> u64 {
        self.counts.get(&(row, col)).copied().unwrap_or(0)
    }

    /// The `n` busiest cells, by count descending then row and column.
    pub fn hottest(&self, n: usize) -> Vec<HeatmapCell> {
        let mut cells: Vec<HeatmapCell> = self
            .counts
            .iter()
            .map(|(&(row, col), &count)| HeatmapCell { row, col, count })
            .collect();
        cells.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.row.cmp(&b.row))
                .then(a.col.cmp(&b.col))
        });
        cells.truncate(n);
        cells
    }

    pub fn report(&self) -> HeatmapReport {
        HeatmapReport {
            cell_size: self.cell_size,
            frames: self.frames,
            observations: self.observations,
            cells: self.hottest(self.counts.len()),
        }
    }

    /// Writes the report as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), SinkError> {
        let json = serde_json::to_string_pretty(&self.report())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Default for PresenceHeatmap {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl ResultSink for PresenceHeatmap {
    fn emit(&mut self, result: FrameResult) -> Result<(), SinkError> {
        self.record(&result);
        Ok(())
    }
}
