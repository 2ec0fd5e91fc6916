//! CART regression tree with squared-error splits

use super::{check_training_input, Estimator, FittedModel, ModelFamily, Params};
use crate::error::{Error, Result};
use crate::models::FeatureMatrix;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Depth bound used when none is configured
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Minimum SSE reduction for a split to be kept
const MIN_GAIN: f64 = 1e-12;

/// Decision tree estimator
#[derive(Debug, Clone, Copy)]
pub struct DecisionTreeRegressor {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl DecisionTreeRegressor {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }
}

/// Node of a fitted tree; children are indices into the node arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted regression tree; the root is node 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeModel {
    pub feature_names: Vec<String>,
    pub nodes: Vec<TreeNode>,
}

impl TreeModel {
    /// Children must point forward into the arena, so every walk terminates
    pub(crate) fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::InvalidModel("tree has no nodes".into()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value, .. } if !value.is_finite() => {
                    return Err(Error::InvalidModel(format!(
                        "leaf {index} has non-finite value"
                    )));
                }
                TreeNode::Leaf { .. } => {}
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= self.feature_names.len() {
                        return Err(Error::InvalidModel(format!(
                            "node {index} splits on unknown feature {feature}"
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(Error::InvalidModel(format!(
                            "node {index} has a NaN threshold"
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(Error::InvalidModel(format!(
                                "node {index} has invalid child {child}"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn predict_rows(&self, x: &FeatureMatrix) -> Result<Array1<f64>> {
        x.values()
            .rows()
            .into_iter()
            .map(|row| self.predict_row(row))
            .collect::<Result<Vec<_>>>()
            .map(Array1::from)
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                None => {
                    return Err(Error::InvalidModel(format!("node {index} does not exist")));
                }
                Some(TreeNode::Leaf { value, .. }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).ok_or_else(|| {
                        Error::InvalidModel(format!(
                            "node {index} splits on unknown feature {feature}"
                        ))
                    })?;
                    let next = if *value <= *threshold { *left } else { *right };
                    if next <= index {
                        return Err(Error::InvalidModel(format!(
                            "node {index} has invalid child {next}"
                        )));
                    }
                    index = next;
                }
            }
        }
    }

    /// Number of split levels on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], index: usize) -> usize {
            match &nodes[index] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitChoice {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl Estimator for DecisionTreeRegressor {
    fn family(&self) -> ModelFamily {
        ModelFamily::DecisionTree
    }

    fn params(&self) -> Params {
        Params::from([
            ("criterion".to_string(), "squared_error".to_string()),
            ("max_depth".to_string(), self.max_depth.to_string()),
            ("min_samples_leaf".to_string(), self.min_samples_leaf.to_string()),
            ("min_samples_split".to_string(), self.min_samples_split.to_string()),
        ])
    }

    fn fit(&self, x: &FeatureMatrix, y: &Array1<f64>) -> Result<FittedModel> {
        check_training_input(self.family(), x, y)?;

        let rows: Vec<usize> = (0..x.nrows()).collect();
        let mut nodes = Vec::new();
        self.grow(x.values(), y, &rows, 0, &mut nodes);

        Ok(FittedModel::DecisionTree(TreeModel {
            feature_names: x.names().to_vec(),
            nodes,
        }))
    }
}

impl DecisionTreeRegressor {
    /// Append the subtree for `rows` and return its root index
    fn grow(
        &self,
        xs: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        depth: usize,
        nodes: &mut Vec<TreeNode>,
    ) -> usize {
        let id = nodes.len();
        let mean = rows.iter().map(|&i| y[i]).sum::<f64>() / rows.len() as f64;
        nodes.push(TreeNode::Leaf {
            value: mean,
            samples: rows.len(),
        });

        if depth >= self.max_depth
            || rows.len() < self.min_samples_split.max(2)
            || rows.len() < 2 * self.min_samples_leaf.max(1)
            || is_pure(y, rows)
        {
            return id;
        }

        let Some(split) = self.best_split(xs, y, rows) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&i| xs[[i, split.feature]] <= split.threshold);

        let left = self.grow(xs, y, &left_rows, depth + 1, nodes);
        let right = self.grow(xs, y, &right_rows, depth + 1, nodes);
        nodes[id] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    /// Exhaustive search; earlier features and thresholds win ties
    fn best_split(&self, xs: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> Option<SplitChoice> {
        let n = rows.len();
        let min_leaf = self.min_samples_leaf.max(1);
        let total: f64 = rows.iter().map(|&i| y[i]).sum();
        let parent_score = total * total / n as f64;

        let mut best: Option<SplitChoice> = None;
        let mut order = rows.to_vec();

        for feature in 0..xs.ncols() {
            order.sort_by(|&a, &b| xs[[a, feature]].total_cmp(&xs[[b, feature]]));

            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += y[order[k]];
                let left_n = k + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let here = xs[[order[k], feature]];
                let next = xs[[order[k + 1], feature]];
                if here == next {
                    continue;
                }

                // SSE reduction up to the constant sum of squares
                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / left_n as f64
                    + right_sum * right_sum / right_n as f64
                    - parent_score;

                if gain > best.map_or(MIN_GAIN, |b| b.gain) {
                    let mut threshold = here + (next - here) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some(SplitChoice {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}

fn is_pure(y: &Array1<f64>, rows: &[usize]) -> bool {
    let first = y[rows[0]];
    rows.iter().all(|&i| y[i] == first)
}
