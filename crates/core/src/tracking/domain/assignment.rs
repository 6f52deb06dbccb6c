/// Track-to-detection assignment solvers.
///
/// Both solvers take a dense cost matrix (rows = tracks in ascending id
/// order, columns = detections) where `f64::INFINITY` marks a forbidden
/// pairing, and return one optional column per row.
use thiserror::Error;

use crate::shared::settings::AssociationStrategy;

/// Cost bonus per row index used to break exact ties toward earlier rows.
const TIE_BREAK_EPSILON: f64 = 1e-9;

/// The solver produced an assignment that violates one-to-one matching or
/// uses a forbidden pair. Indicates a defect, never a data condition.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("assignment infeasible: {0}")]
pub struct AssignmentInfeasible(pub String);

#[derive(Clone, Debug, PartialEq)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl CostMatrix {
    /// All pairs start forbidden.
    pub fn forbidden(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![f64::INFINITY; rows * cols],
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let cols = rows.first().map_or(0, Vec::len);
        let mut m = Self::forbidden(rows.len(), cols);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cost) in row.into_iter().enumerate().take(cols) {
                m.set(r, c, cost);
            }
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Non-finite costs are stored as forbidden.
    pub fn set(&mut self, row: usize, col: usize, cost: f64) {
        self.data[row * self.cols + col] = if cost.is_finite() {
            cost
        } else {
            f64::INFINITY
        };
    }

    pub fn is_allowed(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_finite()
    }
}

pub fn solve(costs: &CostMatrix, strategy: AssociationStrategy) -> Vec<Option<usize>> {
    match strategy {
        AssociationStrategy::Optimal => solve_optimal(costs),
        AssociationStrategy::Greedy => solve_greedy(costs),
    }
}

/// Optimal matching over allowed pairs (Jonker–Volgenant via `lapjv`).
///
/// Maximizes the number of matched pairs first, then minimizes their total
/// cost. The matrix is padded to square with free dummy entries; forbidden
/// entries get a penalty larger than any sum of allowed costs, so they are
/// only chosen when a row has nothing better and are then discarded.
pub fn solve_optimal(costs: &CostMatrix) -> Vec<Option<usize>> {
    let (rows, cols) = (costs.rows(), costs.cols());
    if rows == 0 || cols == 0 {
        return vec![None; rows];
    }

    let n = rows.max(cols);
    let max_allowed = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .filter(|&(r, c)| costs.is_allowed(r, c))
        .map(|(r, c)| costs.get(r, c).abs())
        .fold(0.0f64, f64::max);
    let penalty = (max_allowed + 1.0) * (n as f64 + 1.0);

    let mut padded = lapjv::Matrix::<f64>::from_elem((n, n), 0.0);
    for r in 0..rows {
        for c in 0..cols {
            padded[[r, c]] = if costs.is_allowed(r, c) {
                costs.get(r, c) + TIE_BREAK_EPSILON * (r + 1) as f64
            } else {
                penalty
            };
        }
    }

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => row_to_col
            .into_iter()
            .take(rows)
            .enumerate()
            .map(|(r, c)| (c < cols && costs.is_allowed(r, c)).then_some(c))
            .collect(),
        Err(e) => {
            log::warn!("Optimal assignment failed ({e:?}), falling back to greedy");
            solve_greedy(costs)
        }
    }
}

/// Lowest-cost-first greedy pairing. Equal costs go to the earlier row,
/// then the earlier column.
pub fn solve_greedy(costs: &CostMatrix) -> Vec<Option<usize>> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for r in 0..costs.rows() {
        for c in 0..costs.cols() {
            if costs.is_allowed(r, c) {
                pairs.push((r, c, costs.get(r, c)));
            }
        }
    }
    pairs.sort_by(|a, b| a.2.total_cmp(&b.2));

    let mut row_match = vec![None; costs.rows()];
    let mut col_used = vec![false; costs.cols()];
    for (r, c, _) in pairs {
        if row_match[r].is_none() && !col_used[c] {
            row_match[r] = Some(c);
            col_used[c] = true;
        }
    }
    row_match
}

/// Checks that an assignment is one-to-one and only uses allowed pairs.
pub fn verify(
    costs: &CostMatrix,
    assignment: &[Option<usize>],
) -> Result<(), AssignmentInfeasible> {
    if assignment.len() != costs.rows() {
        return Err(AssignmentInfeasible(format!(
            "{} rows assigned for {} tracks",
            assignment.len(),
            costs.rows()
        )));
    }
    let mut col_used = vec![false; costs.cols()];
    for (r, c) in assignment.iter().enumerate() {
        let Some(c) = *c else { continue };
        if c >= costs.cols() {
            return Err(AssignmentInfeasible(format!(
                "track row {r} assigned to missing detection {c}"
            )));
        }
        if !costs.is_allowed(r, c) {
            return Err(AssignmentInfeasible(format!(
                "track row {r} assigned to forbidden detection {c}"
            )));
        }
        if col_used[c] {
            return Err(AssignmentInfeasible(format!(
                "detection {c} claimed by more than one track"
            )));
        }
        col_used[c] = true;
    }
    Ok(())
}
