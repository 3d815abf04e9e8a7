//! From-scratch CART regression trees used by the ensemble trainers (§4.8).
//!
//! No pure-Rust gradient-boosting or random-forest crate exists in the
//! retrieved corpus and no native `scikit-learn` binding is available, so
//! the ensembles are built from these trees directly rather than wrapping
//! an external library (decision recorded in DESIGN.md).

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone)]
enum Node {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTreeRegressor {
    root: Option<Node>,
    max_depth: usize,
    min_samples_split: usize,
}

impl DecisionTreeRegressor {
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        Self {
            root: None,
            max_depth,
            min_samples_split,
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) {
        let indices: Vec<usize> = (0..x.len()).collect();
        self.root = Some(self.build(x, y, &indices, 0));
    }

    fn build(&self, x: &[Vec<f64>], y: &[f64], indices: &[usize], depth: usize) -> Node {
        let leaf_value = mean(indices.iter().map(|&i| y[i]));

        if depth >= self.max_depth || indices.len() < self.min_samples_split {
            return Node::Leaf { value: leaf_value };
        }

        match best_split(x, y, indices) {
            None => Node::Leaf { value: leaf_value },
            Some((feature, threshold, left_idx, right_idx)) => {
                if left_idx.is_empty() || right_idx.is_empty() {
                    return Node::Leaf { value: leaf_value };
                }
                let left = self.build(x, y, &left_idx, depth + 1);
                let right = self.build(x, y, &right_idx, depth + 1);
                Node::Split {
                    feature,
                    threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let Some(root) = &self.root else { return 0.0 };
        predict_node(root, row)
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }
}

fn predict_node(node: &Node, row: &[f64]) -> f64 {
    match node {
        Node::Leaf { value } => *value,
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] <= *threshold {
                predict_node(left, row)
            } else {
                predict_node(right, row)
            }
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn variance_sum(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values.iter().copied());
    values.iter().map(|v| (v - m).powi(2)).sum()
}

/// Finds the (feature, threshold) that minimises the sum of in-child
/// variance, scanning midpoints between sorted unique values per feature.
fn best_split(
    x: &[Vec<f64>],
    y: &[f64],
    indices: &[usize],
) -> Option<(usize, f64, Vec<usize>, Vec<usize>)> {
    if indices.len() < 2 {
        return None;
    }
    let n_features = x[indices[0]].len();
    let parent_values: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
    let parent_score = variance_sum(&parent_values);

    let mut best: Option<(usize, f64, Vec<usize>, Vec<usize>, f64)> = None;

    for feature in 0..n_features {
        let mut sorted = indices.to_vec();
        sorted.sort_by(|&a, &b| x[a][feature].partial_cmp(&x[b][feature]).unwrap());

        for window in sorted.windows(2) {
            let (a, b) = (window[0], window[1]);
            if x[a][feature] == x[b][feature] {
                continue;
            }
            let threshold = (x[a][feature] + x[b][feature]) / 2.0;
            let (left, right): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[i][feature] <= threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let left_y: Vec<f64> = left.iter().map(|&i| y[i]).collect();
            let right_y: Vec<f64> = right.iter().map(|&i| y[i]).collect();
            let score = variance_sum(&left_y) + variance_sum(&right_y);

            let improves = match &best {
                None => true,
                Some((_, _, _, _, best_score)) => score < *best_score,
            };
            if improves {
                best = Some((feature, threshold, left, right, score));
            }
        }
    }

    best.filter(|(_, _, _, _, score)| *score < parent_score)
        .map(|(feature, threshold, left, right, _)| (feature, threshold, left, right))
}

/// Bootstrap-aggregated ensemble of `DecisionTreeRegressor`s.
pub struct RandomForestRegressor {
    trees: Vec<DecisionTreeRegressor>,
    n_estimators: usize,
    max_depth: usize,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize, max_depth: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth,
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) {
        let mut rng = rand::rng();
        self.trees = (0..self.n_estimators)
            .map(|_| {
                let n = x.len();
                let sample_idx: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                let sample_x: Vec<Vec<f64>> = sample_idx.iter().map(|&i| x[i].clone()).collect();
                let sample_y: Vec<f64> = sample_idx.iter().map(|&i| y[i]).collect();
                let mut tree = DecisionTreeRegressor::new(self.max_depth, 2);
                tree.fit(&sample_x, &sample_y);
                tree
            })
            .collect();
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        if self.trees.is_empty() {
            return vec![0.0; x.len()];
        }
        x.iter()
            .map(|row| {
                let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
                sum / self.trees.len() as f64
            })
            .collect()
    }
}

/// Boosts shallow trees on residuals with a fixed learning rate. When
/// `quantile` is `Some(alpha)`, each leaf predicts the `alpha`-quantile of
/// the residuals routed to it instead of their mean, approximating
/// pinball-loss trees over the MSE split criterion above (see DESIGN.md).
pub struct GradientBoostingRegressor {
    trees: Vec<DecisionTreeRegressor>,
    learning_rate: f64,
    n_estimators: usize,
    max_depth: usize,
    quantile: Option<f64>,
    init_value: f64,
}

impl GradientBoostingRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64, max_depth: usize, quantile: Option<f64>) -> Self {
        Self {
            trees: Vec::new(),
            learning_rate,
            n_estimators,
            max_depth,
            quantile,
            init_value: 0.0,
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) {
        self.init_value = match self.quantile {
            Some(alpha) => quantile_of(y, alpha),
            None => mean(y.iter().copied()),
        };
        let mut predictions = vec![self.init_value; y.len()];
        self.trees.clear();

        for _ in 0..self.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&predictions).map(|(a, b)| a - b).collect();
            let mut tree = DecisionTreeRegressor::new(self.max_depth, 2);
            tree.fit(x, &residuals);
            let step = tree.predict(x);
            for (p, s) in predictions.iter_mut().zip(&step) {
                *p += self.learning_rate * s;
            }
            self.trees.push(tree);
        }
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        let mut predictions = vec![self.init_value; x.len()];
        for tree in &self.trees {
            let step = tree.predict(x);
            for (p, s) in predictions.iter_mut().zip(&step) {
                *p += self.learning_rate * s;
            }
        }
        predictions
    }
}

fn quantile_of(values: &[f64], alpha: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((sorted.len() - 1) as f64 * alpha).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[allow(dead_code)]
fn shuffle_indices(n: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(&mut rand::rng());
    idx
}
