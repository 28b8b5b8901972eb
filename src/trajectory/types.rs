//! Core trajectory data types produced by the loader.
//!
//! A loaded episode is a [`TrajectoryRecord`]: five parallel sequences holding
//! the current observation, the action taken, the reward, the next observation
//! and the done flag for every step. Observations and actions are nested
//! [`Tree`]s that mirror the task schema.

use serde::Serialize;

use super::tensor::{FieldShape, Tensor};

// ---------------------------------------------------------------------------
// Nested value tree
// ---------------------------------------------------------------------------

/// A nested, ordered mapping of named slots to tensors.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    Leaf(Tensor),
    Group(Vec<(String, Tree)>),
}

impl Tree {
    /// Look up a direct child of a group.
    pub fn get(&self, key: &str) -> Option<&Tree> {
        match self {
            Tree::Group(children) => children.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Tree::Leaf(_) => None,
        }
    }

    /// Look up a nested slot by dotted path, e.g. `"equipped_items.mainhand.type"`.
    pub fn get_path(&self, path: &str) -> Option<&Tree> {
        path.split('.').try_fold(self, |node, key| node.get(key))
    }

    /// The tensor held by a leaf.
    pub fn as_leaf(&self) -> Option<&Tensor> {
        match self {
            Tree::Leaf(t) => Some(t),
            Tree::Group(_) => None,
        }
    }

    /// Direct child keys of a group, in schema order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Tree::Group(children) => children.iter().map(|(k, _)| k.as_str()).collect(),
            Tree::Leaf(_) => Vec::new(),
        }
    }

    /// All leaves in depth-first schema order, keyed by dotted path.
    pub fn leaves(&self) -> Vec<(String, &Tensor)> {
        let mut out = Vec::new();
        self.collect_leaves(String::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: String, out: &mut Vec<(String, &'a Tensor)>) {
        match self {
            Tree::Leaf(t) => out.push((prefix, t)),
            Tree::Group(children) => {
                for (key, child) in children {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    child.collect_leaves(path, out);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Trajectory record
// ---------------------------------------------------------------------------

/// One fully loaded episode.
///
/// All five sequences have the same length (the episode's step count);
/// `next_observation` is `observation` shifted forward by one step.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryRecord {
    pub observation: Tree,
    pub action: Tree,
    pub reward: Vec<f32>,
    pub next_observation: Tree,
    pub done: Vec<bool>,
}

impl TrajectoryRecord {
    /// Number of steps in the episode.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    pub fn total_reward(&self) -> f64 {
        self.reward.iter().map(|&r| r as f64).sum()
    }

    /// A compact, serializable description of the record.
    pub fn summary(&self) -> RecordSummary {
        let shapes = |tree: &Tree| -> Vec<(String, FieldShape)> {
            tree.leaves()
                .into_iter()
                .map(|(path, t)| (path, t.describe()))
                .collect()
        };
        RecordSummary {
            steps: self.len(),
            total_reward: self.total_reward(),
            observation: shapes(&self.observation),
            action: shapes(&self.action),
        }
    }
}

/// Step count, reward and per-leaf shapes of a [`TrajectoryRecord`].
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub steps: usize,
    pub total_reward: f64,
    pub observation: Vec<(String, FieldShape)>,
    pub action: Vec<(String, FieldShape)>,
}
