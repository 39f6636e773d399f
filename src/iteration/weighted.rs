//! Weighted sampling across several groups of sources.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use crate::error::{IterError, IterResult};
use crate::source::SourceRef;
use crate::types::ColumnBatch;

use super::budget::BatchIter;
use super::observability::IterationEvent;
use super::options::IterOptions;

/// Split `total_n` records across groups in proportion to `weights`.
///
/// Each share is rounded to the nearest integer independently (ties to even), so the
/// sub-budgets need not add up to `total_n` exactly.
pub fn sub_budgets(total_n: usize, weights: &[f64]) -> IterResult<Vec<usize>> {
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(IterError::InvalidWeights {
            message: format!("weight {bad} is not a finite non-negative number"),
        });
    }
    let norm: f64 = weights.iter().sum();
    if weights.is_empty() {
        return Ok(Vec::new());
    }
    if norm <= 0.0 {
        return Err(IterError::InvalidWeights {
            message: "weights sum to zero".to_string(),
        });
    }
    if !norm.is_finite() {
        return Err(IterError::InvalidWeights {
            message: "weights sum overflows".to_string(),
        });
    }
    Ok(weights
        .iter()
        .map(|w| (w / norm * total_n as f64).round_ties_even() as usize)
        .collect())
}

struct Group {
    index: usize,
    sources: SourceRef,
    budget: usize,
}

/// Streams batches from several source groups, each capped at its weighted share of a total.
///
/// Groups are visited in weight order. A group whose share rounds to zero is skipped without
/// opening or even listing its sources. Each group locates its own table unless a table path
/// is configured.
pub struct WeightedIter {
    pending: VecDeque<Group>,
    current: Option<(usize, BatchIter)>,
    options: IterOptions,
    requested: usize,
    budgets: Vec<usize>,
    finished: bool,
}

impl WeightedIter {
    /// Plan the sampling. Fails before any I/O if the weights and groups differ in length or
    /// the weights are unusable.
    pub fn new(
        total_n: usize,
        weights: &[f64],
        groups: Vec<SourceRef>,
        options: &IterOptions,
    ) -> IterResult<Self> {
        if weights.len() != groups.len() {
            return Err(IterError::LengthMismatch {
                weights: weights.len(),
                groups: groups.len(),
            });
        }
        let budgets = sub_budgets(total_n, weights)?;
        let diagnostics = &options.diagnostics;
        diagnostics.emit(IterationEvent::WeightedPlan {
            requested: total_n,
            doing: budgets.iter().sum(),
            budgets: budgets.clone(),
        });

        let mut pending = VecDeque::with_capacity(groups.len());
        for (index, (sources, &budget)) in groups.into_iter().zip(&budgets).enumerate() {
            if budget == 0 {
                diagnostics.emit(IterationEvent::GroupSkipped { group: index });
                continue;
            }
            pending.push_back(Group {
                index,
                sources,
                budget,
            });
        }

        Ok(Self {
            pending,
            current: None,
            options: options.clone(),
            requested: total_n,
            budgets,
            finished: false,
        })
    }

    /// Per-group sub-budgets, in group order.
    pub fn budgets(&self) -> &[usize] {
        &self.budgets
    }

    /// The requested total.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Sum of the sub-budgets (what will actually be attempted).
    pub fn planned_total(&self) -> usize {
        self.budgets.iter().sum()
    }

    /// Index of the group currently being read.
    pub fn current_group(&self) -> Option<usize> {
        self.current.as_ref().map(|(index, _)| *index)
    }

    fn advance(&mut self) -> IterResult<Option<ColumnBatch>> {
        loop {
            if let Some((_, iter)) = self.current.as_mut() {
                match iter.next() {
                    Some(batch) => return batch.map(Some),
                    None => self.current = None,
                }
            }
            let Some(group) = self.pending.pop_front() else {
                return Ok(None);
            };
            let paths = group.sources.resolve(self.options.lister.as_ref())?;
            let iter = BatchIter::with_budget(paths, Some(group.budget), &self.options);
            self.current = Some((group.index, iter));
        }
    }
}

impl Iterator for WeightedIter {
    type Item = IterResult<ColumnBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                self.current = None;
                self.pending.clear();
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for WeightedIter {}
