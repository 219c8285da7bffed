//! Federated averaging of admitted gradient updates.
//!
//! Updates are layers of `f32` values. The aggregator buffers the updates
//! of a round and produces their element-wise mean; the operator then
//! publishes the result as a full-training contribution. A round with
//! fewer updates than the configured minimum is not aggregated.

use thiserror::Error;
use tracing::debug;

/// One gradient update, as a list of flattened layers.
pub type GradientUpdate = Vec<Vec<f32>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("no updates to aggregate")]
    Empty,
    #[error("{got} updates buffered, at least {required} required")]
    TooFewUpdates { required: usize, got: usize },
    #[error("update has {got} layers, expected {expected}")]
    LayerCount { expected: usize, got: usize },
    #[error("layer {layer} has {got} values, expected {expected}")]
    LayerShape {
        layer: usize,
        expected: usize,
        got: usize,
    },
}

/// Buffers updates that share one shape and averages them.
#[derive(Clone, Debug)]
pub struct FedAvgAggregator {
    sum: Option<Vec<Vec<f64>>>,
    count: usize,
    min_updates: usize,
}

impl Default for FedAvgAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl FedAvgAggregator {
    /// Aggregates as soon as one update is buffered.
    pub fn new() -> Self {
        Self::with_min_updates(1)
    }

    /// Refuses to aggregate fewer than `min_updates` updates.
    pub fn with_min_updates(min_updates: usize) -> Self {
        Self {
            sum: None,
            count: 0,
            min_updates: min_updates.max(1),
        }
    }

    /// Number of buffered updates.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Adds one update. The first update fixes the expected shape.
    pub fn add(&mut self, update: &[Vec<f32>]) -> Result<(), AggregationError> {
        match &mut self.sum {
            None => {
                self.sum = Some(
                    update
                        .iter()
                        .map(|layer| layer.iter().map(|&v| f64::from(v)).collect())
                        .collect(),
                );
            }
            Some(sum) => {
                if sum.len() != update.len() {
                    return Err(AggregationError::LayerCount {
                        expected: sum.len(),
                        got: update.len(),
                    });
                }
                for (layer, (acc, values)) in sum.iter().zip(update).enumerate() {
                    if acc.len() != values.len() {
                        return Err(AggregationError::LayerShape {
                            layer,
                            expected: acc.len(),
                            got: values.len(),
                        });
                    }
                }
                for (acc, values) in sum.iter_mut().zip(update) {
                    for (a, &v) in acc.iter_mut().zip(values) {
                        *a += f64::from(v);
                    }
                }
            }
        }
        self.count += 1;
        Ok(())
    }

    /// Returns the element-wise mean and clears the buffer.
    ///
    /// Below the minimum the buffer is kept, so more updates can still
    /// be added.
    pub fn aggregate(&mut self) -> Result<GradientUpdate, AggregationError> {
        if self.sum.is_none() {
            return Err(AggregationError::Empty);
        }
        if self.count < self.min_updates {
            return Err(AggregationError::TooFewUpdates {
                required: self.min_updates,
                got: self.count,
            });
        }
        let sum = self.sum.take().ok_or(AggregationError::Empty)?;
        let count = std::mem::take(&mut self.count) as f64;
        debug!(updates = count, layers = sum.len(), "aggregating gradient updates");
        Ok(sum
            .into_iter()
            .map(|layer| layer.into_iter().map(|v| (v / count) as f32).collect())
            .collect())
    }
}
