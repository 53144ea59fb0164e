//! Native reader for XGBoost's JSON model format (`model.save_model("model.json")`).
//!
//! Only the pieces needed for class prediction are read:
//! - `learner.learner_model_param`: `num_class`, `num_feature`, `base_score`.
//! - `learner.objective.name`: `multi:softprob`, `multi:softmax` or `binary:logistic`.
//! - `learner.gradient_booster.model`: `trees` and `tree_info` of a `gbtree` booster.
//! - `learner.feature_names` when the model was fit on a named frame.
//!
//! Numerical splits only; a node goes left when `x < split_condition` and
//! missing values (`NaN`) follow `default_left`.

use std::path::Path;

use serde::Deserialize;

use super::{Classifier, ModelError};

/// How raw tree margins turn into a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// One margin per class; the largest wins.
    Softmax { num_class: usize },
    /// A single margin; class 1 when positive.
    Logistic,
}

impl Objective {
    fn output_groups(self) -> usize {
        match self {
            Objective::Softmax { num_class } => num_class,
            Objective::Logistic => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Leaf(f32),
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, features: &[f32]) -> f32 {
        let mut idx = 0usize;
        loop {
            match self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = features[feature];
                    idx = if value.is_nan() {
                        if default_left { left } else { right }
                    } else if value < threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

/// Gradient-boosted tree ensemble read from an XGBoost JSON artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct XgbModel {
    objective: Objective,
    num_feature: usize,
    base_margin: Vec<f32>,
    feature_names: Option<Vec<String>>,
    trees: Vec<Tree>,
    tree_group: Vec<usize>,
}

impl XgbModel {
    /// Load a model from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes)
    }

    /// Parse and validate a model from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let raw: RawModel = serde_json::from_slice(bytes)?;
        Self::from_raw(raw.learner)
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw margins per output group, base score included.
    pub fn predict_margins(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
        if features.len() != self.num_feature {
            return Err(ModelError::FeatureCount {
                expected: self.num_feature,
                actual: features.len(),
            });
        }
        let mut margins = self.base_margin.clone();
        for (tree, &group) in self.trees.iter().zip(&self.tree_group) {
            margins[group] += tree.predict(features);
        }
        Ok(margins)
    }

    fn from_raw(learner: RawLearner) -> Result<Self, ModelError> {
        let objective = parse_objective(&learner)?;
        let groups = objective.output_groups();
        let num_feature = parse_count("num_feature", &learner.learner_model_param.num_feature)?;
        if num_feature == 0 {
            return Err(ModelError::Malformed("num_feature must be positive".to_string()));
        }
        let base_margin = parse_base_margin(&learner.learner_model_param.base_score, objective)?;

        if learner.gradient_booster.name != "gbtree" {
            return Err(ModelError::Unsupported(format!(
                "booster '{}' (only gbtree is supported)",
                learner.gradient_booster.name
            )));
        }
        let booster = learner
            .gradient_booster
            .model
            .ok_or_else(|| ModelError::Malformed("gbtree booster has no model".to_string()))?;
        if booster.trees.is_empty() {
            return Err(ModelError::Malformed("model contains no trees".to_string()));
        }
        if booster.tree_info.len() != booster.trees.len() {
            return Err(ModelError::Malformed(format!(
                "tree_info has {} entries for {} trees",
                booster.tree_info.len(),
                booster.trees.len()
            )));
        }
        let tree_group = booster
            .tree_info
            .iter()
            .enumerate()
            .map(|(tree_idx, &group)| {
                usize::try_from(group)
                    .ok()
                    .filter(|&group| group < groups)
                    .ok_or_else(|| {
                        ModelError::Malformed(format!(
                            "tree {tree_idx} targets output group {group} of {groups}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let trees = booster
            .trees
            .into_iter()
            .enumerate()
            .map(|(tree_idx, raw)| build_tree(tree_idx, raw, num_feature))
            .collect::<Result<Vec<_>, _>>()?;

        let feature_names = if learner.feature_names.is_empty() {
            None
        } else if learner.feature_names.len() != num_feature {
            return Err(ModelError::Malformed(format!(
                "{} feature names for {num_feature} features",
                learner.feature_names.len()
            )));
        } else {
            Some(learner.feature_names)
        };

        Ok(Self {
            objective,
            num_feature,
            base_margin,
            feature_names,
            trees,
            tree_group,
        })
    }
}

impl Classifier for XgbModel {
    fn num_classes(&self) -> usize {
        match self.objective {
            Objective::Softmax { num_class } => num_class,
            Objective::Logistic => 2,
        }
    }

    fn num_features(&self) -> usize {
        self.num_feature
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_class_index(&self, features: &[f32]) -> Result<usize, ModelError> {
        let margins = self.predict_margins(features)?;
        Ok(match self.objective {
            Objective::Softmax { .. } => argmax(&margins),
            Objective::Logistic => usize::from(margins[0] > 0.0),
        })
    }
}

fn argmax(values: &[f32]) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (idx, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = idx;
        }
    }
    best_idx
}

fn parse_objective(learner: &RawLearner) -> Result<Objective, ModelError> {
    match learner.objective.name.as_str() {
        "multi:softprob" | "multi:softmax" => {
            let num_class = parse_count("num_class", &learner.learner_model_param.num_class)?;
            if num_class < 2 {
                return Err(ModelError::Malformed(format!(
                    "multi-class objective with num_class {num_class}"
                )));
            }
            Ok(Objective::Softmax { num_class })
        }
        "binary:logistic" => Ok(Objective::Logistic),
        other => Err(ModelError::Unsupported(format!("objective '{other}'"))),
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize, ModelError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ModelError::Malformed(format!("{name} is not a count: '{value}'")))
}

/// `base_score` is a scalar (`"5E-1"`) in older artifacts and a bracketed
/// list (`"[5E-1]"`, one entry per output group) in newer ones.
fn parse_base_margin(value: &str, objective: Objective) -> Result<Vec<f32>, ModelError> {
    let groups = objective.output_groups();
    let trimmed = value.trim().trim_start_matches('[').trim_end_matches(']');
    let scores = trimmed
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ModelError::Malformed(format!("base_score is not numeric: '{value}'")))?;
    let scores = match scores.len() {
        1 => vec![scores[0]; groups],
        n if n == groups => scores,
        n => {
            return Err(ModelError::Malformed(format!(
                "base_score has {n} entries for {groups} output groups"
            )));
        }
    };
    match objective {
        Objective::Softmax { .. } => Ok(scores),
        Objective::Logistic => scores
            .into_iter()
            .map(|p| {
                if p > 0.0 && p < 1.0 {
                    Ok((p / (1.0 - p)).ln())
                } else {
                    Err(ModelError::Malformed(format!(
                        "logistic base_score {p} outside (0, 1)"
                    )))
                }
            })
            .collect(),
    }
}

fn build_tree(tree_idx: usize, raw: RawTree, num_feature: usize) -> Result<Tree, ModelError> {
    let n = raw.left_children.len();
    if n == 0 {
        return Err(ModelError::Malformed(format!("tree {tree_idx} has no nodes")));
    }
    if raw.right_children.len() != n
        || raw.split_indices.len() != n
        || raw.split_conditions.len() != n
        || raw.default_left.len() != n
    {
        return Err(ModelError::Malformed(format!(
            "tree {tree_idx} node arrays have inconsistent lengths"
        )));
    }
    if raw.split_type.iter().any(|&kind| kind != 0) {
        return Err(ModelError::Unsupported(format!(
            "categorical splits in tree {tree_idx}"
        )));
    }

    let mut nodes = Vec::with_capacity(n);
    for idx in 0..n {
        let condition = raw.split_conditions[idx];
        if !condition.is_finite() {
            return Err(ModelError::Malformed(format!(
                "tree {tree_idx} node {idx} has a non-finite value"
            )));
        }
        let (left, right) = (raw.left_children[idx], raw.right_children[idx]);
        if left == -1 && right == -1 {
            nodes.push(Node::Leaf(condition));
            continue;
        }
        // Children always carry larger ids, which also rules out cycles.
        let child = |value: i64| {
            usize::try_from(value)
                .ok()
                .filter(|&child| child > idx && child < n)
                .ok_or_else(|| {
                    ModelError::Malformed(format!(
                        "tree {tree_idx} node {idx} has invalid child {value}"
                    ))
                })
        };
        let feature = usize::try_from(raw.split_indices[idx])
            .ok()
            .filter(|&feature| feature < num_feature)
            .ok_or_else(|| {
                ModelError::Malformed(format!(
                    "tree {tree_idx} node {idx} splits on feature {} of {num_feature}",
                    raw.split_indices[idx]
                ))
            })?;
        nodes.push(Node::Split {
            feature,
            threshold: condition,
            left: child(left)?,
            right: child(right)?,
            default_left: raw.default_left[idx].is_set(),
        });
    }
    Ok(Tree { nodes })
}

#[derive(Debug, Deserialize)]
struct RawModel {
    learner: RawLearner,
}

#[derive(Debug, Deserialize)]
struct RawLearner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: RawBooster,
    learner_model_param: RawModelParam,
    objective: RawObjective,
}

#[derive(Debug, Deserialize)]
struct RawBooster {
    name: String,
    #[serde(default)]
    model: Option<RawGbtree>,
}

#[derive(Debug, Deserialize)]
struct RawGbtree {
    trees: Vec<RawTree>,
    tree_info: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct RawModelParam {
    #[serde(default = "default_base_score")]
    base_score: String,
    #[serde(default = "default_num_class")]
    num_class: String,
    num_feature: String,
}

fn default_base_score() -> String {
    "5E-1".to_string()
}

fn default_num_class() -> String {
    "0".to_string()
}

#[derive(Debug, Deserialize)]
struct RawObjective {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<i64>,
}

/// `default_left` is written as `0/1` by current XGBoost and as booleans by some exporters.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(value) => *value,
            Flag::Int(value) => *value != 0,
        }
    }
}
